use crate::{
    crypto::{Argon2Params, derive_key},
    error::HashError,
    format::{self, B64},
    handler::{CostParams, Handler, HashRecord, check_declared_costs},
    scheme::{CostMetric, ParamSpec, SaltSpec, SchemeDescriptor},
};

const VERSION: u32 = 19;

/// 4 GiB. Stored hashes above this are refused rather than allocated.
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

pub static ARGON2: SchemeDescriptor = SchemeDescriptor {
    name: "argon2",
    ident: "$argon2id$",
    cost_metric: CostMetric::Linear,
    params: &[
        ParamSpec::new("rounds", 1, u32::MAX, 3),
        ParamSpec::new("memory_cost", 8, MAX_MEMORY_KIB, 65_536),
        ParamSpec::new("parallelism", 1, 255, 1),
    ],
    salt: SaltSpec::new(8, 1024, 16),
    checksum_size: 32,
};

/// `$argon2id$v=19$m=<kib>,t=<rounds>,p=<lanes>$<b64 salt>$<b64 checksum>`
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Handler;

impl Argon2Handler {
    fn params(&self, costs: &CostParams) -> Result<Argon2Params, HashError> {
        let name = self.name();
        Argon2Params::new(
            costs.require(name, "memory_cost")?,
            costs.require(name, "rounds")?,
            costs.require(name, "parallelism")?,
        )
    }
}

impl Handler for Argon2Handler {
    fn descriptor(&self) -> &SchemeDescriptor {
        &ARGON2
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let name = self.name();
        let rest = format::strip_ident(name, ARGON2.ident, hash)?;
        let [version, params, salt, checksum] = format::split_fields::<4>(name, rest)?;

        let version = format::parse_assignment(name, "v", version)?;
        if version != VERSION {
            return Err(HashError::malformed(
                name,
                format!("unsupported version {version}"),
            ));
        }

        let [m, t, p] = <[&str; 3]>::try_from(params.split(',').collect::<Vec<_>>())
            .map_err(|_| HashError::malformed(name, format!("bad parameter list '{params}'")))?;
        let costs = CostParams::new()
            .with("rounds", format::parse_assignment(name, "t", t)?)
            .with("memory_cost", format::parse_assignment(name, "m", m)?)
            .with("parallelism", format::parse_assignment(name, "p", p)?);

        let salt = format::decode(&B64, name, salt)?;
        let checksum = format::decode(&B64, name, checksum)?;

        self.parsed(costs, salt, checksum)
    }

    fn to_string(&self, record: &HashRecord) -> String {
        let costs = record.costs();
        format!(
            "{}v={VERSION}$m={},t={},p={}${}${}",
            ARGON2.ident,
            costs.get("memory_cost").unwrap_or_default(),
            costs.get("rounds").unwrap_or_default(),
            costs.get("parallelism").unwrap_or_default(),
            format::encode(&B64, record.salt()),
            format::encode(&B64, record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let params = self.params(costs)?;
        let mut out = vec![0u8; ARGON2.checksum_size];
        derive_key(secret, salt, params, &mut out)?;
        Ok(out)
    }

    fn validate_costs(&self, costs: &CostParams) -> Result<(), HashError> {
        check_declared_costs(&ARGON2, costs)?;

        // each lane needs at least 8 KiB
        let memory = costs.require(self.name(), "memory_cost")?;
        let lanes = costs.require(self.name(), "parallelism")?;
        let floor = 8 * lanes;
        if memory < floor {
            return Err(HashError::InvalidCost {
                scheme: self.name().to_string(),
                param: "memory_cost".into(),
                value: memory.into(),
                min: floor,
                max: MAX_MEMORY_KIB,
            });
        }
        Ok(())
    }
}
