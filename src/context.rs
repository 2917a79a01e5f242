//! A validated policy bound to a registry: the entry point for hashing,
//! verifying and migrating stored hashes.

use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

use tracing::{debug, warn};

use crate::{
    error::HashError,
    handler::{CostParams, Handler, HashOptions, HashRecord},
    policy::Policy,
    registry::Registry,
    scheme::ParamSpec,
};

const DUMMY_SECRET: &[u8] = b"too many secrets";

#[derive(Debug, Clone)]
struct ActiveScheme {
    handler: Arc<dyn Handler>,
    limits: Vec<ParamSpec>,
    defaults: CostParams,
    deprecated: bool,
}

#[derive(Debug)]
pub struct Context {
    policy: Arc<Policy>,
    registry: Arc<Registry>,
    schemes: Vec<ActiveScheme>,
    default_index: usize,
    dummy: OnceLock<String>,
}

impl Context {
    /// A context over the built-in registry.
    pub fn new(policy: Policy) -> Result<Self, HashError> {
        Self::with_registry(policy, Registry::builtin()?)
    }

    /// [`Context::new`] with [`Policy::default`].
    pub fn builtin() -> Result<Self, HashError> {
        Self::new(Policy::default())
    }

    /// Validates `policy` against `registry`.
    ///
    /// # Errors
    ///
    /// - `UnknownScheme` if the policy names an unregistered scheme.
    /// - `InvalidCost` if an override lies outside the scheme's bounds or
    ///   its own `min..=max`.
    /// - `InvalidSetting` for anything else inconsistent: an empty scheme
    ///   list, duplicates, a default that is missing or deprecated, or
    ///   entries that refer to schemes or parameters not in use.
    pub fn with_registry(policy: Policy, registry: Arc<Registry>) -> Result<Self, HashError> {
        if policy.schemes.is_empty() {
            return Err(HashError::InvalidSetting("policy lists no schemes".into()));
        }

        let mut seen = HashSet::new();
        for name in &policy.schemes {
            if !seen.insert(name.as_str()) {
                return Err(HashError::InvalidSetting(format!(
                    "scheme '{name}' listed twice"
                )));
            }
        }
        for name in &policy.deprecated {
            if !seen.contains(name.as_str()) {
                return Err(HashError::InvalidSetting(format!(
                    "deprecated scheme '{name}' is not in the scheme list"
                )));
            }
        }
        for name in policy.overrides.keys() {
            if !seen.contains(name.as_str()) {
                return Err(HashError::InvalidSetting(format!(
                    "cost overrides for '{name}', which is not in the scheme list"
                )));
            }
        }

        let default = policy
            .default_scheme()
            .ok_or_else(|| HashError::InvalidSetting("policy has no default scheme".into()))?;
        let default_index = policy
            .schemes
            .iter()
            .position(|s| s == default)
            .ok_or_else(|| {
                HashError::InvalidSetting(format!(
                    "default scheme '{default}' is not in the scheme list"
                ))
            })?;
        if policy.is_deprecated(default) {
            return Err(HashError::InvalidSetting(format!(
                "default scheme '{default}' is deprecated"
            )));
        }

        let schemes = policy
            .schemes
            .iter()
            .map(|name| {
                let handler = registry.resolve(name)?;
                let limits = resolve_limits(handler.as_ref(), &policy)?;
                let defaults = CostParams::from_specs(&limits);
                handler.validate_costs(&defaults)?;
                Ok::<_, HashError>(ActiveScheme {
                    deprecated: policy.is_deprecated(name),
                    handler,
                    limits,
                    defaults,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            schemes = ?policy.schemes,
            default = default,
            "hash context ready"
        );

        Ok(Self {
            policy: Arc::new(policy),
            registry,
            schemes,
            default_index,
            dummy: OnceLock::new(),
        })
    }

    /// A new context with `policy` over the same registry.
    pub fn copy_with(&self, policy: Policy) -> Result<Self, HashError> {
        Self::with_registry(policy, Arc::clone(&self.registry))
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn default_scheme(&self) -> &'static str {
        self.schemes[self.default_index].handler.name()
    }

    /// Enabled scheme names in policy order.
    pub fn schemes(&self) -> Vec<&'static str> {
        self.schemes.iter().map(|s| s.handler.name()).collect()
    }

    pub fn handler(&self, scheme: &str) -> Result<Arc<dyn Handler>, HashError> {
        Ok(Arc::clone(&self.active(scheme)?.handler))
    }

    /// Cost bounds for `scheme` after policy overrides.
    pub fn limits(&self, scheme: &str) -> Result<&[ParamSpec], HashError> {
        Ok(&self.active(scheme)?.limits)
    }

    pub fn hash(&self, secret: impl AsRef<[u8]>) -> Result<String, HashError> {
        self.hash_with(secret, None, &HashOptions::default())
    }

    /// Hashes with `scheme` (the default when `None`) and per-call options,
    /// bounded by the policy.
    pub fn hash_with(
        &self,
        secret: impl AsRef<[u8]>,
        scheme: Option<&str>,
        opts: &HashOptions,
    ) -> Result<String, HashError> {
        let active = match scheme {
            Some(name) => self.active(name)?,
            None => &self.schemes[self.default_index],
        };
        let record = active
            .handler
            .hash_within(secret.as_ref(), opts, &active.limits)?;
        Ok(active.handler.to_string(&record))
    }

    /// Name of the enabled scheme that produced `hash`.
    pub fn identify(&self, hash: &str) -> Result<&'static str, HashError> {
        Ok(self.active_for(hash)?.1.handler.name())
    }

    pub fn verify(&self, secret: impl AsRef<[u8]>, hash: &str) -> Result<bool, HashError> {
        let (_, active) = self.active_for(hash)?;
        let record = self.parse(active, hash)?;
        active.handler.verify_record(secret.as_ref(), &record)
    }

    /// Verifies `hash` and, when it is correct but outdated, returns a
    /// replacement made under the current policy.
    pub fn verify_and_update(
        &self,
        secret: impl AsRef<[u8]>,
        hash: &str,
    ) -> Result<(bool, Option<String>), HashError> {
        let secret = secret.as_ref();
        let (index, active) = self.active_for(hash)?;
        let record = self.parse(active, hash)?;
        if !active.handler.verify_record(secret, &record)? {
            return Ok((false, None));
        }
        if !self.outdated(index, active, &record) {
            return Ok((true, None));
        }

        let replacement = self.hash(secret)?;
        debug!(
            from = active.handler.name(),
            to = self.default_scheme(),
            "rehashed outdated hash"
        );
        Ok((true, Some(replacement)))
    }

    /// Whether `hash` should be replaced. Only parses; never derives.
    pub fn needs_update(&self, hash: &str) -> Result<bool, HashError> {
        let (index, active) = self.active_for(hash)?;
        let record = self.parse(active, hash)?;
        Ok(self.outdated(index, active, &record))
    }

    /// Spends as long as verifying a real default-scheme hash, then reports
    /// failure. Call when the account being checked does not exist.
    pub fn dummy_verify(&self) -> Result<bool, HashError> {
        let hash = match self.dummy.get() {
            Some(hash) => hash,
            None => {
                let hash = self.hash(DUMMY_SECRET)?;
                self.dummy.get_or_init(|| hash)
            }
        };
        self.verify(DUMMY_SECRET, hash)?;
        Ok(false)
    }

    fn active(&self, scheme: &str) -> Result<&ActiveScheme, HashError> {
        self.schemes
            .iter()
            .find(|s| s.handler.name() == scheme)
            .ok_or_else(|| HashError::UnknownScheme(scheme.to_string()))
    }

    fn active_for(&self, hash: &str) -> Result<(usize, &ActiveScheme), HashError> {
        if let Some(found) = self
            .schemes
            .iter()
            .enumerate()
            .find(|(_, s)| s.handler.identify(hash))
        {
            return Ok(found);
        }
        // Registered but disabled schemes get their name in the error.
        let handler = self.registry.resolve_from_hash(hash)?;
        Err(HashError::UnknownScheme(handler.name().to_string()))
    }

    fn parse(&self, active: &ActiveScheme, hash: &str) -> Result<HashRecord, HashError> {
        active.handler.from_string(hash).inspect_err(|e| {
            warn!(scheme = active.handler.name(), error = %e, "stored hash is malformed");
        })
    }

    fn outdated(&self, index: usize, active: &ActiveScheme, record: &HashRecord) -> bool {
        active.deprecated || index != self.default_index || *record.costs() != active.defaults
    }
}

fn resolve_limits(handler: &dyn Handler, policy: &Policy) -> Result<Vec<ParamSpec>, HashError> {
    let descriptor = handler.descriptor();
    let overrides = policy.overrides_for(descriptor.name);

    if let Some(overrides) = overrides {
        if let Some(param) = overrides.keys().find(|p| descriptor.param(p).is_none()) {
            return Err(HashError::InvalidSetting(format!(
                "{}: unknown cost parameter '{param}'",
                descriptor.name
            )));
        }
    }

    descriptor
        .params
        .iter()
        .map(|spec| {
            let Some(bounds) = overrides.and_then(|o| o.get(spec.name)) else {
                return Ok(*spec);
            };
            let invalid = |value: u32, min: u32, max: u32| HashError::InvalidCost {
                scheme: descriptor.name.to_string(),
                param: spec.name.to_string(),
                value: value.into(),
                min,
                max,
            };

            let min = bounds.min.unwrap_or(spec.min);
            let max = bounds.max.unwrap_or(spec.max);
            if !spec.contains(min) {
                return Err(invalid(min, spec.min, spec.max));
            }
            if !spec.contains(max) || max < min {
                return Err(invalid(max, min, spec.max));
            }

            let default = match bounds.default {
                Some(value) if (min..=max).contains(&value) => value,
                Some(value) => return Err(invalid(value, min, max)),
                None => spec.default.clamp(min, max),
            };
            Ok(ParamSpec::new(spec.name, min, max, default))
        })
        .collect()
}
