use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::HashError;

/// Argon2id costs: memory in KiB, passes, and lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Argon2Params {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), HashError> {
        if self.mem_cost_kib < 8 {
            return Err(HashError::Backend("argon2 memory cost too low".into()));
        }
        if self.time_cost < 1 {
            return Err(HashError::Backend("argon2 time cost must be >= 1".into()));
        }
        if self.parallelism < 1 {
            return Err(HashError::Backend("argon2 parallelism must be >= 1".into()));
        }
        if self.mem_cost_kib < self.parallelism.saturating_mul(8) {
            return Err(HashError::Backend(
                "argon2 memory cost must be at least 8 * parallelism".into(),
            ));
        }
        Ok(())
    }
}

/// Argon2id over `secret` and `salt`, filling `out`.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    kdf: Argon2Params,
    out: &mut [u8],
) -> Result<(), HashError> {
    kdf.validate()?;

    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(out.len()),
    )
    .map_err(|e| HashError::Backend(format!("failed to construct Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password_into(secret, salt, out)
        .map_err(|e| HashError::Backend(format!("argon2 key derivation failed {e}")))
}
