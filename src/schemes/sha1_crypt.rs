use crate::{
    crypto::{random_chars, sha1_crypt_transposed},
    error::HashError,
    format::{self, HASH64_CHARS, alphabet::is_h64},
    handler::{CostParams, Handler, HashRecord},
    scheme::{CostMetric, ParamSpec, SaltSpec, SchemeDescriptor},
};

pub static SHA1_CRYPT: SchemeDescriptor = SchemeDescriptor {
    name: "sha1_crypt",
    ident: "$sha1$",
    cost_metric: CostMetric::Linear,
    params: &[ParamSpec::new("rounds", 1, u32::MAX, 480_000)],
    salt: SaltSpec::new(0, 64, 8),
    checksum_size: 21,
};

/// `$sha1$<rounds>$<salt>$<28 hash64 chars>`
///
/// The salt is stored verbatim and must be hash64 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1CryptHandler;

impl Handler for Sha1CryptHandler {
    fn descriptor(&self) -> &SchemeDescriptor {
        &SHA1_CRYPT
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let name = self.name();
        let rest = format::strip_ident(name, SHA1_CRYPT.ident, hash)?;
        let [rounds, salt, checksum] = format::split_fields::<3>(name, rest)?;

        let rounds = format::parse_decimal(name, rounds)?;
        if !salt.bytes().all(is_h64) {
            return Err(HashError::malformed(name, "salt has non hash64 characters"));
        }
        let checksum = format::h64_decode(name, checksum)?;

        self.parsed(
            CostParams::new().with("rounds", rounds),
            salt.as_bytes().to_vec(),
            checksum,
        )
    }

    fn to_string(&self, record: &HashRecord) -> String {
        format!(
            "{}{}${}${}",
            SHA1_CRYPT.ident,
            record.costs().get("rounds").unwrap_or_default(),
            String::from_utf8_lossy(record.salt()),
            format::h64_encode(record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let rounds = costs.require(self.name(), "rounds")?;
        Ok(sha1_crypt_transposed(secret, salt, rounds)?.to_vec())
    }

    fn generate_salt(&self, size: usize) -> Result<Vec<u8>, HashError> {
        random_chars(HASH64_CHARS, size)
    }

    fn validate_salt(&self, salt: &[u8]) -> Result<(), HashError> {
        let spec = SHA1_CRYPT.salt;
        if salt.len() > spec.max {
            return Err(HashError::InvalidSalt(format!(
                "sha1_crypt: salt length {} exceeds {}",
                salt.len(),
                spec.max
            )));
        }
        if !salt.iter().copied().all(is_h64) {
            return Err(HashError::InvalidSalt(
                "sha1_crypt: salt must use hash64 characters".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HashOptions;

    const VECTORS: [&str; 2] = [
        "$sha1$19703$iVdJqfSE$v4qYKl1zqYThwpjJAoKX6UvlHq/a",
        "$sha1$21773$uV7PTeux$I9oHnvwPZHMO0Nq6/WgyGV/tDJIH",
    ];

    #[test]
    fn verifies_reference_hashes() {
        for hash in VECTORS {
            assert!(Sha1CryptHandler.verify(b"password", hash).unwrap());
            assert!(!Sha1CryptHandler.verify(b"Password", hash).unwrap());
        }
    }

    #[test]
    fn parse_then_render_is_identity() {
        for hash in VECTORS {
            let record = Sha1CryptHandler.from_string(hash).unwrap();
            assert_eq!(Sha1CryptHandler.to_string(&record), hash);
        }
    }

    #[test]
    fn generated_salts_are_hash64() {
        let record = Sha1CryptHandler
            .hash_with(b"pw", &HashOptions::new().rounds(5))
            .unwrap();
        assert_eq!(record.salt().len(), 8);
        assert!(record.salt().iter().all(|c| HASH64_CHARS.contains(c)));
        assert!(Sha1CryptHandler.verify_record(b"pw", &record).unwrap());
    }

    #[test]
    fn rejects_bad_salt_characters() {
        let err = Sha1CryptHandler
            .from_string("$sha1$19703$iVd_qfSE$v4qYKl1zqYThwpjJAoKX6UvlHq/a")
            .unwrap_err();
        assert!(matches!(err, HashError::MalformedHash(_)));

        let err = Sha1CryptHandler
            .hash_with(b"pw", &HashOptions::new().rounds(5).salt("a$b"))
            .unwrap_err();
        assert!(matches!(err, HashError::InvalidSalt(_)));
    }
}
