use crate::{
    crypto::{Digest, Pbkdf2Backend},
    error::HashError,
    format::{self, AB64},
    handler::{CostParams, Handler, HashRecord},
    scheme::{CostMetric, ParamSpec, SaltSpec, SchemeDescriptor},
};

const ROUNDS_MAX: u32 = u32::MAX;
const SALT: SaltSpec = SaltSpec::new(0, 1024, 16);

pub static PBKDF2_SHA1: SchemeDescriptor = SchemeDescriptor {
    name: "pbkdf2_sha1",
    ident: "$pbkdf2$",
    cost_metric: CostMetric::Linear,
    params: &[ParamSpec::new("rounds", 1, ROUNDS_MAX, 131_000)],
    salt: SALT,
    checksum_size: 20,
};

pub static PBKDF2_SHA256: SchemeDescriptor = SchemeDescriptor {
    name: "pbkdf2_sha256",
    ident: "$pbkdf2-sha256$",
    cost_metric: CostMetric::Linear,
    params: &[ParamSpec::new("rounds", 1, ROUNDS_MAX, 29_000)],
    salt: SALT,
    checksum_size: 32,
};

pub static PBKDF2_SHA512: SchemeDescriptor = SchemeDescriptor {
    name: "pbkdf2_sha512",
    ident: "$pbkdf2-sha512$",
    cost_metric: CostMetric::Linear,
    params: &[ParamSpec::new("rounds", 1, ROUNDS_MAX, 25_000)],
    salt: SALT,
    checksum_size: 64,
};

/// `$pbkdf2-<digest>$<rounds>$<ab64 salt>$<ab64 checksum>`
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Handler {
    descriptor: &'static SchemeDescriptor,
    digest: Digest,
    backend: Pbkdf2Backend,
}

impl Pbkdf2Handler {
    pub fn sha1(backend: Pbkdf2Backend) -> Self {
        Self {
            descriptor: &PBKDF2_SHA1,
            digest: Digest::Sha1,
            backend,
        }
    }

    pub fn sha256(backend: Pbkdf2Backend) -> Self {
        Self {
            descriptor: &PBKDF2_SHA256,
            digest: Digest::Sha256,
            backend,
        }
    }

    pub fn sha512(backend: Pbkdf2Backend) -> Self {
        Self {
            descriptor: &PBKDF2_SHA512,
            digest: Digest::Sha512,
            backend,
        }
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn backend(&self) -> Pbkdf2Backend {
        self.backend
    }
}

impl Handler for Pbkdf2Handler {
    fn descriptor(&self) -> &SchemeDescriptor {
        self.descriptor
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let name = self.name();
        let rest = format::strip_ident(name, self.descriptor.ident, hash)?;
        let [rounds, salt, checksum] = format::split_fields::<3>(name, rest)?;

        let rounds = format::parse_decimal(name, rounds)?;
        let salt = format::decode(&AB64, name, salt)?;
        let checksum = format::decode(&AB64, name, checksum)?;

        self.parsed(CostParams::new().with("rounds", rounds), salt, checksum)
    }

    fn to_string(&self, record: &HashRecord) -> String {
        format!(
            "{}{}${}${}",
            self.descriptor.ident,
            record.costs().get("rounds").unwrap_or_default(),
            format::encode(&AB64, record.salt()),
            format::encode(&AB64, record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let rounds = costs.require(self.name(), "rounds")?;
        let mut out = vec![0u8; self.descriptor.checksum_size];
        self.backend
            .derive(self.digest, secret, salt, rounds, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HashOptions;

    const SHA256_HASH: &str =
        "$pbkdf2-sha256$1212$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ";
    const SHA1_HASH: &str = "$pbkdf2$1000$AQIDBAUGBwg$7RtaQ9OoZQTdE8nadga9NV0lmTw";
    const SHA512_HASH: &str = "$pbkdf2-sha512$1000$AQIDBAUGBwg$c6Gh4TNDseUODO7PUclk/0VOa/Kr3EdGuNPmKb0EW.dD9UIQ1m8LbY5rF/KEE6DGQsewJP9VCAS8WTXyQLh2eQ";

    #[test]
    fn verifies_reference_hashes_on_every_backend() {
        for backend in Pbkdf2Backend::ALL {
            let cases = [
                (Pbkdf2Handler::sha1(backend), SHA1_HASH),
                (Pbkdf2Handler::sha256(backend), SHA256_HASH),
                (Pbkdf2Handler::sha512(backend), SHA512_HASH),
            ];
            for (handler, hash) in cases {
                assert!(handler.verify(b"password", hash).unwrap(), "{backend} {hash}");
                assert!(!handler.verify(b"wrong", hash).unwrap());
            }
        }
    }

    #[test]
    fn parse_then_render_is_identity() {
        let handler = Pbkdf2Handler::sha256(Pbkdf2Backend::default());
        let record = handler.from_string(SHA256_HASH).unwrap();
        assert_eq!(record.costs().get("rounds"), Some(1212));
        assert_eq!(record.salt().len(), 16);
        assert_eq!(handler.to_string(&record), SHA256_HASH);
    }

    #[test]
    fn fixed_salt_reproduces_reference_hash() {
        let handler = Pbkdf2Handler::sha1(Pbkdf2Backend::default());
        let opts = HashOptions::new()
            .rounds(1000)
            .salt([1u8, 2, 3, 4, 5, 6, 7, 8]);
        let record = handler.hash_with(b"password", &opts).unwrap();
        assert_eq!(handler.to_string(&record), SHA1_HASH);
    }

    #[test]
    fn rejects_malformed_strings() {
        let handler = Pbkdf2Handler::sha256(Pbkdf2Backend::default());
        let bad = [
            "$pbkdf2-sha256$1212$4vjV83LKPjQzk31VI4E0Vw",
            "$pbkdf2-sha256$01212$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ",
            "$pbkdf2-sha256$0$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ",
            "$pbkdf2-sha256$1212$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg",
            "$pbkdf2-sha256$1212$4vjV83LKPjQzk31VI4E0V+$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ",
            "$pbkdf2$1212$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ",
        ];
        for hash in bad {
            assert!(
                matches!(handler.from_string(hash), Err(HashError::MalformedHash(_))),
                "{hash}"
            );
        }
    }

    #[test]
    fn empty_salt_is_allowed() {
        let handler = Pbkdf2Handler::sha256(Pbkdf2Backend::default());
        let record = handler
            .hash_with(b"pw", &HashOptions::new().rounds(10).salt_size(0))
            .unwrap();
        assert!(record.salt().is_empty());
        let hash = handler.to_string(&record);
        assert!(hash.starts_with("$pbkdf2-sha256$10$$"));
        assert!(handler.verify(b"pw", &hash).unwrap());
    }

    #[test]
    fn rounds_out_of_range_is_invalid_cost() {
        let handler = Pbkdf2Handler::sha256(Pbkdf2Backend::default());
        let err = handler
            .hash_with(b"pw", &HashOptions::new().rounds(0))
            .unwrap_err();
        assert!(matches!(err, HashError::InvalidCost { .. }));
    }
}
