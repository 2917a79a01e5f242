//! PBKDF2-HMAC over a selectable digest.
//!
//! Two interchangeable implementations exist. [`Pbkdf2Backend::RustCrypto`]
//! calls the `pbkdf2` crate and is only compiled for the SHA family;
//! [`Pbkdf2Backend::Builtin`] drives the `hmac` crate directly and covers
//! every [`Digest`]. For a digest both support they are bit-identical.

use std::fmt;
use std::str::FromStr;

use hmac::{
    Hmac, Mac,
    digest::{KeyInit, OutputSizeUser},
};
use md4::Md4;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::HashError;

/// Hash function used as the PBKDF2 pseudorandom function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    Sha1,
    Sha256,
    Sha512,
    Md4,
}

impl Digest {
    pub fn name(&self) -> &'static str {
        match self {
            Digest::Sha1 => "sha1",
            Digest::Sha256 => "sha256",
            Digest::Sha512 => "sha512",
            Digest::Md4 => "md4",
        }
    }

    /// Digest output size in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            Digest::Sha1 => 20,
            Digest::Sha256 => 32,
            Digest::Sha512 => 64,
            Digest::Md4 => 16,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Digest {
    type Err = HashError;

    /// Accepts `sha256`, `SHA-256`, `sha_256` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "sha1" => Ok(Digest::Sha1),
            "sha256" => Ok(Digest::Sha256),
            "sha512" => Ok(Digest::Sha512),
            "md4" => Ok(Digest::Md4),
            _ => Err(HashError::UnsupportedDigest(s.to_string())),
        }
    }
}

/// PBKDF2 implementation strategy.
///
/// Chosen once when a registry is built; handlers keep the backend they were
/// constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pbkdf2Backend {
    #[default]
    RustCrypto,
    Builtin,
}

impl Pbkdf2Backend {
    pub const ALL: [Pbkdf2Backend; 2] = [Pbkdf2Backend::RustCrypto, Pbkdf2Backend::Builtin];

    pub fn name(&self) -> &'static str {
        match self {
            Pbkdf2Backend::RustCrypto => "rust-crypto",
            Pbkdf2Backend::Builtin => "builtin",
        }
    }

    pub fn supports(&self, digest: Digest) -> bool {
        match self {
            Pbkdf2Backend::RustCrypto => digest != Digest::Md4,
            Pbkdf2Backend::Builtin => true,
        }
    }

    /// Fill `out` with PBKDF2-HMAC-`digest` of `secret` and `salt`.
    pub fn derive(
        &self,
        digest: Digest,
        secret: &[u8],
        salt: &[u8],
        rounds: u32,
        out: &mut [u8],
    ) -> Result<(), HashError> {
        if rounds == 0 {
            return Err(HashError::Backend("pbkdf2 rounds must be >= 1".into()));
        }
        if out.is_empty() {
            return Err(HashError::Backend("pbkdf2 output length must be >= 1".into()));
        }
        match (self, digest) {
            (Pbkdf2Backend::RustCrypto, Digest::Sha1) => {
                pbkdf2::pbkdf2_hmac::<Sha1>(secret, salt, rounds, out)
            }
            (Pbkdf2Backend::RustCrypto, Digest::Sha256) => {
                pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, rounds, out)
            }
            (Pbkdf2Backend::RustCrypto, Digest::Sha512) => {
                pbkdf2::pbkdf2_hmac::<Sha512>(secret, salt, rounds, out)
            }
            (Pbkdf2Backend::RustCrypto, Digest::Md4) => {
                return Err(HashError::UnsupportedDigest(format!(
                    "{digest} is not available with the {} pbkdf2 backend",
                    self.name()
                )));
            }
            (Pbkdf2Backend::Builtin, Digest::Sha1) => {
                hmac_blocks::<Hmac<Sha1>>(secret, salt, rounds, out)?
            }
            (Pbkdf2Backend::Builtin, Digest::Sha256) => {
                hmac_blocks::<Hmac<Sha256>>(secret, salt, rounds, out)?
            }
            (Pbkdf2Backend::Builtin, Digest::Sha512) => {
                hmac_blocks::<Hmac<Sha512>>(secret, salt, rounds, out)?
            }
            (Pbkdf2Backend::Builtin, Digest::Md4) => {
                hmac_blocks::<Hmac<Md4>>(secret, salt, rounds, out)?
            }
        }

        Ok(())
    }
}

impl fmt::Display for Pbkdf2Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pbkdf2Backend {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust-crypto" | "rustcrypto" | "default" => Ok(Pbkdf2Backend::RustCrypto),
            "builtin" => Ok(Pbkdf2Backend::Builtin),
            other => Err(HashError::Backend(format!("unknown pbkdf2 backend '{other}'"))),
        }
    }
}

/// PBKDF2 with the default backend, returning `len` bytes.
pub fn pbkdf2_hmac(
    digest: Digest,
    secret: &[u8],
    salt: &[u8],
    rounds: u32,
    len: usize,
) -> Result<Vec<u8>, HashError> {
    let mut out = vec![0u8; len];
    Pbkdf2Backend::default().derive(digest, secret, salt, rounds, &mut out)?;
    Ok(out)
}

// T_i = U_1 ^ U_2 ^ ... ^ U_rounds, U_1 = PRF(secret, salt || INT(i))
fn hmac_blocks<M>(secret: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) -> Result<(), HashError>
where
    M: Mac + KeyInit + Clone,
{
    let prf = <M as KeyInit>::new_from_slice(secret)
        .map_err(|e| HashError::Backend(format!("hmac key rejected: {e}")))?;
    let block_len = <M as OutputSizeUser>::output_size();

    for (index, chunk) in out.chunks_mut(block_len).enumerate() {
        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&(index as u32 + 1).to_be_bytes());
        let mut u = mac.finalize().into_bytes();
        let mut block = u.clone();

        for _ in 1..rounds {
            let mut mac = prf.clone();
            mac.update(&u);
            u = mac.finalize().into_bytes();
            block.iter_mut().zip(u.iter()).for_each(|(b, x)| *b ^= x);
        }

        chunk.copy_from_slice(&block[..chunk.len()]);
    }

    Ok(())
}
