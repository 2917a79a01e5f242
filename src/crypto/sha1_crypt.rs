use hmac::{Hmac, Mac, digest::KeyInit};
use sha1::Sha1;

use crate::error::HashError;

type HmacSha1 = Hmac<Sha1>;

pub const DIGEST_LEN: usize = 20;
/// Length of the transposed checksum that gets hash64-encoded.
pub const TRANSPOSED_LEN: usize = 21;

// byte order fed to the hash64 encoder; byte 0 appears twice to pad to 21
const TRANSPOSE: [usize; TRANSPOSED_LEN] = [
    2, 1, 0, 5, 4, 3, 8, 7, 6, 11, 10, 9, 14, 13, 12, 17, 16, 15, 0, 19, 18,
];

/// Salted iterated HMAC-SHA1: starting from `"<salt>$sha1$<rounds>"`,
/// apply `HMAC-SHA1(secret, ·)` exactly `rounds` times.
pub fn sha1_crypt_raw(
    secret: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Result<[u8; DIGEST_LEN], HashError> {
    if rounds == 0 {
        return Err(HashError::Backend("sha1_crypt rounds must be >= 1".into()));
    }

    let prf = <HmacSha1 as KeyInit>::new_from_slice(secret)
        .map_err(|e| HashError::Backend(format!("hmac key rejected: {e}")))?;

    let mut message = salt.to_vec();
    message.extend_from_slice(format!("$sha1${rounds}").as_bytes());

    let mut mac = prf.clone();
    mac.update(&message);
    let mut result = mac.finalize().into_bytes();

    for _ in 1..rounds {
        let mut mac = prf.clone();
        mac.update(&result);
        result = mac.finalize().into_bytes();
    }

    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&result);
    Ok(out)
}

/// [`sha1_crypt_raw`] reordered into the byte layout stored in hash strings.
pub fn sha1_crypt_transposed(
    secret: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Result<[u8; TRANSPOSED_LEN], HashError> {
    let raw = sha1_crypt_raw(secret, salt, rounds)?;
    let mut out = [0u8; TRANSPOSED_LEN];
    for (dst, &src) in out.iter_mut().zip(TRANSPOSE.iter()) {
        *dst = raw[src];
    }
    Ok(out)
}
