//! The bcrypt EksBlowfish key derivation.
//!
//! Blowfish itself comes from the `blowfish` crate's bcrypt primitives;
//! this module only runs the expensive key schedule and the final
//! "OrpheanBeholderScryDoubt" encryption.

use blowfish::Blowfish;
use zeroize::Zeroizing;

use crate::error::HashError;

/// Salt length (16 bytes).
pub const SALT_LEN: usize = 16;
/// Raw output length (24 bytes). Hash strings keep only the first 23.
pub const OUTPUT_LEN: usize = 24;
/// Bytes of key material consumed, including the trailing NUL.
pub const MAX_KEY_LEN: usize = 72;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

// "OrpheanBeholderScryDoubt" as big-endian words
const MAGIC: [u32; 6] = [
    0x4f72_7068,
    0x6561_6e42,
    0x6568_6f6c,
    0x6465_7253,
    0x6372_7944,
    0x6f75_6274,
];

/// Derive the raw 24-byte bcrypt output for `secret`.
///
/// `cost` is the base-2 logarithm of the key schedule iteration count.
pub fn bcrypt_raw(
    cost: u32,
    salt: &[u8; SALT_LEN],
    secret: &[u8],
) -> Result<[u8; OUTPUT_LEN], HashError> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(HashError::Backend(format!(
            "bcrypt cost {cost} outside {MIN_COST}..={MAX_COST}"
        )));
    }

    let mut key = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    key.extend_from_slice(secret);
    key.push(0);
    key.truncate(MAX_KEY_LEN);

    let mut state: Blowfish = Blowfish::bc_init_state();
    state.salted_expand_key(salt, &key);
    for _ in 0..(1u64 << cost) {
        state.bc_expand_key(&key);
        state.bc_expand_key(salt);
    }

    let mut ctext = MAGIC;
    for pair in ctext.chunks_exact_mut(2) {
        let mut block = [pair[0], pair[1]];
        for _ in 0..64 {
            block = state.bc_encrypt(block);
        }
        pair.copy_from_slice(&block);
    }

    let mut output = [0u8; OUTPUT_LEN];
    for (chunk, word) in output.chunks_exact_mut(4).zip(ctext.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }

    Ok(output)
}
