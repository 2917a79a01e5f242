use crate::{
    crypto::bcrypt::{self as raw, MAX_COST, MIN_COST, SALT_LEN},
    error::HashError,
    format::{self, BCRYPT64},
    handler::{CostParams, Handler, HashRecord},
    scheme::{CostMetric, ParamSpec, SaltSpec, SchemeDescriptor},
};

const SALT_CHARS: usize = 22;
const CHECKSUM_CHARS: usize = 31;

pub static BCRYPT: SchemeDescriptor = SchemeDescriptor {
    name: "bcrypt",
    ident: "$2b$",
    cost_metric: CostMetric::Log2,
    params: &[ParamSpec::new("rounds", MIN_COST, MAX_COST, 12)],
    salt: SaltSpec::fixed(SALT_LEN),
    checksum_size: 23,
};

/// `$2b$<two digit cost>$<22 char salt><31 char checksum>`
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptHandler;

impl Handler for BcryptHandler {
    fn descriptor(&self) -> &SchemeDescriptor {
        &BCRYPT
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let name = self.name();
        let rest = format::strip_ident(name, BCRYPT.ident, hash)?;
        let [cost, data] = format::split_fields::<2>(name, rest)?;

        if cost.len() != 2 || !cost.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HashError::malformed(
                name,
                format!("cost '{cost}' is not two digits"),
            ));
        }
        let cost: u32 = cost
            .parse()
            .map_err(|_| HashError::malformed(name, "unreadable cost"))?;

        if data.len() != SALT_CHARS + CHECKSUM_CHARS || !data.is_ascii() {
            return Err(HashError::malformed(
                name,
                format!(
                    "expected {} salt and checksum characters",
                    SALT_CHARS + CHECKSUM_CHARS
                ),
            ));
        }
        let (salt, checksum) = data.split_at(SALT_CHARS);
        let salt = format::decode(&BCRYPT64, name, salt)?;
        let checksum = format::decode(&BCRYPT64, name, checksum)?;

        self.parsed(CostParams::new().with("rounds", cost), salt, checksum)
    }

    fn to_string(&self, record: &HashRecord) -> String {
        format!(
            "{}{:02}${}{}",
            BCRYPT.ident,
            record.costs().get("rounds").unwrap_or_default(),
            format::encode(&BCRYPT64, record.salt()),
            format::encode(&BCRYPT64, record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let cost = costs.require(self.name(), "rounds")?;
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| {
            HashError::InvalidSalt(format!("bcrypt salt must be {SALT_LEN} bytes"))
        })?;
        let output = raw::bcrypt_raw(cost, salt, secret)?;
        Ok(output[..BCRYPT.checksum_size].to_vec())
    }
}
