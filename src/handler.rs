//! The per-scheme handler contract.
//!
//! A handler parses and renders one hash format and derives its checksum.
//! Hashing with generated salts, cost validation and constant-time
//! verification are provided on top of those three operations, so a new
//! scheme only has to describe its format.

use std::fmt;

use crate::{
    crypto::{constant_time_eq, random_bytes},
    error::HashError,
    scheme::{ParamSpec, SchemeDescriptor},
};

/// Named cost values in the order the scheme declares them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostParams(Vec<(&'static str, u32)>);

impl CostParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each spec's default value.
    pub fn from_specs(specs: &[ParamSpec]) -> Self {
        Self(specs.iter().map(|p| (p.name, p.default)).collect())
    }

    /// Sets `name`, replacing any previous value.
    pub fn with(mut self, name: &'static str, value: u32) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: u32) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn require(&self, scheme: &str, name: &str) -> Result<u32, HashError> {
        self.get(name).ok_or_else(|| {
            HashError::InvalidSetting(format!("{scheme}: missing cost parameter '{name}'"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values of `specs`, in their order. Names not in `specs` are dropped.
    fn ordered(&self, specs: &[ParamSpec]) -> Self {
        Self(
            specs
                .iter()
                .filter_map(|p| self.get(p.name).map(|v| (p.name, v)))
                .collect(),
        )
    }
}

impl fmt::Display for CostParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// The parsed form of a hash string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    scheme: &'static str,
    costs: CostParams,
    salt: Vec<u8>,
    checksum: Vec<u8>,
}

impl HashRecord {
    pub(crate) fn new(
        scheme: &'static str,
        costs: CostParams,
        salt: Vec<u8>,
        checksum: Vec<u8>,
    ) -> Self {
        Self {
            scheme,
            costs,
            salt,
            checksum,
        }
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    pub fn costs(&self) -> &CostParams {
        &self.costs
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn checksum(&self) -> &[u8] {
        &self.checksum
    }
}

/// Per-call overrides for [`Handler::hash_with`].
#[derive(Debug, Clone, Default)]
pub struct HashOptions {
    costs: Vec<(String, u32)>,
    salt_size: Option<usize>,
    salt: Option<Vec<u8>>,
    clamp: bool,
}

impl HashOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cost(mut self, name: impl Into<String>, value: u32) -> Self {
        self.costs.push((name.into(), value));
        self
    }

    /// Shorthand for the primary cost parameter.
    pub fn rounds(self, value: u32) -> Self {
        self.cost("rounds", value)
    }

    pub fn salt_size(mut self, size: usize) -> Self {
        self.salt_size = Some(size);
        self
    }

    /// Use a fixed salt instead of a random one.
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Pull out-of-range costs into bounds instead of failing.
    pub fn clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }
}

pub trait Handler: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &SchemeDescriptor;

    /// Parses a hash string of this scheme.
    ///
    /// Implementations should build the record through [`Handler::parsed`]
    /// so out-of-range values are reported as malformed.
    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError>;

    /// Renders a record in canonical form.
    fn to_string(&self, record: &HashRecord) -> String;

    /// Runs the scheme's key derivation.
    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError>;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    fn identify(&self, hash: &str) -> bool {
        hash.starts_with(self.descriptor().ident)
    }

    fn generate_salt(&self, size: usize) -> Result<Vec<u8>, HashError> {
        random_bytes(size)
    }

    fn validate_salt(&self, salt: &[u8]) -> Result<(), HashError> {
        let spec = self.descriptor().salt;
        if salt.len() < spec.min || salt.len() > spec.max {
            return Err(HashError::InvalidSalt(format!(
                "{}: salt length {} outside {}..={}",
                self.name(),
                salt.len(),
                spec.min,
                spec.max
            )));
        }
        Ok(())
    }

    fn validate_costs(&self, costs: &CostParams) -> Result<(), HashError> {
        check_declared_costs(self.descriptor(), costs)
    }

    /// Builds a validated record with costs in declaration order.
    fn record(
        &self,
        costs: CostParams,
        salt: Vec<u8>,
        checksum: Vec<u8>,
    ) -> Result<HashRecord, HashError> {
        self.validate_costs(&costs)?;
        let costs = costs.ordered(self.descriptor().params);
        self.validate_salt(&salt)?;
        let expected = self.descriptor().checksum_size;
        if checksum.len() != expected {
            return Err(HashError::malformed(
                self.name(),
                format!("checksum is {} bytes, expected {expected}", checksum.len()),
            ));
        }
        Ok(HashRecord::new(self.name(), costs, salt, checksum))
    }

    /// [`Handler::record`] for values read out of a hash string.
    fn parsed(
        &self,
        costs: CostParams,
        salt: Vec<u8>,
        checksum: Vec<u8>,
    ) -> Result<HashRecord, HashError> {
        self.record(costs, salt, checksum).map_err(|e| match e {
            HashError::InvalidCost { .. } | HashError::InvalidSalt(_) => {
                HashError::malformed(self.name(), e)
            }
            other => other,
        })
    }

    fn hash(&self, secret: &[u8]) -> Result<HashRecord, HashError> {
        self.hash_with(secret, &HashOptions::default())
    }

    fn hash_with(&self, secret: &[u8], opts: &HashOptions) -> Result<HashRecord, HashError> {
        self.hash_within(secret, opts, self.descriptor().params)
    }

    /// Hashes with costs bounded by `limits`, whose defaults are used for
    /// anything `opts` leaves unset.
    fn hash_within(
        &self,
        secret: &[u8],
        opts: &HashOptions,
        limits: &[ParamSpec],
    ) -> Result<HashRecord, HashError> {
        let mut costs = CostParams::from_specs(limits);
        for (name, value) in &opts.costs {
            let spec = limits.iter().find(|p| p.name == name).ok_or_else(|| {
                HashError::InvalidSetting(format!(
                    "{}: unknown cost parameter '{name}'",
                    self.name()
                ))
            })?;
            let value = if spec.contains(*value) {
                *value
            } else if opts.clamp {
                spec.clamp(*value)
            } else {
                return Err(HashError::InvalidCost {
                    scheme: self.name().to_string(),
                    param: spec.name.to_string(),
                    value: (*value).into(),
                    min: spec.min,
                    max: spec.max,
                });
            };
            costs.set(spec.name, value);
        }
        self.validate_costs(&costs)?;

        let salt = match &opts.salt {
            Some(salt) => salt.clone(),
            None => {
                let size = opts.salt_size.unwrap_or(self.descriptor().salt.default);
                self.generate_salt(size)?
            }
        };
        self.validate_salt(&salt)?;

        let checksum = self.derive_checksum(secret, &salt, &costs)?;
        self.record(costs, salt, checksum)
    }

    fn verify(&self, secret: &[u8], hash: &str) -> Result<bool, HashError> {
        let record = self.from_string(hash)?;
        self.verify_record(secret, &record)
    }

    fn verify_record(&self, secret: &[u8], record: &HashRecord) -> Result<bool, HashError> {
        let checksum = self.derive_checksum(secret, record.salt(), record.costs())?;
        Ok(constant_time_eq(&checksum, record.checksum()))
    }
}

/// Checks every parameter `descriptor` declares is present and within
/// bounds, and that nothing undeclared is set.
pub fn check_declared_costs(
    descriptor: &SchemeDescriptor,
    costs: &CostParams,
) -> Result<(), HashError> {
    let scheme = descriptor.name;
    if let Some((name, _)) = costs.iter().find(|(n, _)| descriptor.param(n).is_none()) {
        return Err(HashError::InvalidSetting(format!(
            "{scheme}: unknown cost parameter '{name}'"
        )));
    }
    for spec in descriptor.params {
        let value = costs.require(scheme, spec.name)?;
        if !spec.contains(value) {
            return Err(HashError::InvalidCost {
                scheme: scheme.to_string(),
                param: spec.name.to_string(),
                value: value.into(),
                min: spec.min,
                max: spec.max,
            });
        }
    }
    Ok(())
}
