//! ASCII encodings used inside hash strings.
//!
//! - [`AB64`]: standard base64 with `.` in place of `+`, unpadded (pbkdf2).
//! - [`BCRYPT64`]: bcrypt's `./A-Za-z0-9` alphabet, unpadded.
//! - [`B64`]: standard base64, unpadded (argon2).
//! - hash64 ([`h64_encode`]): `./0-9A-Za-z`, little-endian bit packing
//!   (sha1_crypt).

use base64::{
    Engine,
    alphabet::{self, Alphabet},
    engine::{GeneralPurpose, general_purpose},
};

use crate::error::HashError;

const AB64_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("invalid adapted base64 alphabet"),
    };

pub const AB64: GeneralPurpose = GeneralPurpose::new(&AB64_ALPHABET, general_purpose::NO_PAD);
pub const BCRYPT64: GeneralPurpose =
    GeneralPurpose::new(&alphabet::BCRYPT, general_purpose::NO_PAD);
pub const B64: GeneralPurpose = general_purpose::STANDARD_NO_PAD;

pub const HASH64_CHARS: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub fn encode(engine: &GeneralPurpose, data: &[u8]) -> String {
    engine.encode(data)
}

/// Decodes `field`, rejecting padding and non-zero trailing bits.
pub fn decode(engine: &GeneralPurpose, scheme: &str, field: &str) -> Result<Vec<u8>, HashError> {
    engine
        .decode(field)
        .map_err(|e| HashError::malformed(scheme, format!("bad base64 field '{field}': {e}")))
}

/// hash64-encodes `data`, three bytes to four characters, least significant
/// six bits first.
pub fn h64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let mut v = 0u32;
        for (i, b) in chunk.iter().enumerate() {
            v |= (*b as u32) << (8 * i);
        }
        let chars = match chunk.len() {
            3 => 4,
            2 => 3,
            _ => 2,
        };
        for i in 0..chars {
            out.push(HASH64_CHARS[((v >> (6 * i)) & 0x3f) as usize] as char);
        }
    }
    out
}

/// Inverse of [`h64_encode`]; only accepts its exact output.
pub fn h64_decode(scheme: &str, field: &str) -> Result<Vec<u8>, HashError> {
    let bytes = field.as_bytes();
    if bytes.len() % 4 == 1 {
        return Err(HashError::malformed(
            scheme,
            format!("hash64 field '{field}' has invalid length"),
        ));
    }

    let mut out = Vec::with_capacity(bytes.len() * 3 / 4);
    for chunk in bytes.chunks(4) {
        let mut v = 0u32;
        for (i, c) in chunk.iter().enumerate() {
            let idx = h64_index(*c).ok_or_else(|| {
                HashError::malformed(scheme, format!("invalid hash64 character '{}'", *c as char))
            })?;
            v |= idx << (6 * i);
        }
        let len = chunk.len() - 1;
        if v >> (8 * len) != 0 {
            return Err(HashError::malformed(
                scheme,
                format!("hash64 field '{field}' has non-zero padding bits"),
            ));
        }
        for i in 0..len {
            out.push((v >> (8 * i)) as u8);
        }
    }
    Ok(out)
}

pub fn is_h64(c: u8) -> bool {
    h64_index(c).is_some()
}

fn h64_index(c: u8) -> Option<u32> {
    match c {
        b'.' => Some(0),
        b'/' => Some(1),
        b'0'..=b'9' => Some((c - b'0') as u32 + 2),
        b'A'..=b'Z' => Some((c - b'A') as u32 + 12),
        b'a'..=b'z' => Some((c - b'a') as u32 + 38),
        _ => None,
    }
}
