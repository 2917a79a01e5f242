//! Which schemes a context accepts, which one it hashes with, and what it
//! considers outdated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::HashError;

/// Policy bounds for one cost parameter. Unset fields fall back to the
/// scheme's own bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
}

impl CostBounds {
    pub fn new(min: Option<u32>, max: Option<u32>, default: Option<u32>) -> Self {
        Self { min, max, default }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Accepted schemes, in preference order.
    pub schemes: Vec<String>,
    /// Scheme new hashes use; the first entry of `schemes` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Schemes still verified but flagged for rehash.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub deprecated: BTreeSet<String>,
    /// scheme -> parameter -> bounds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, BTreeMap<String, CostBounds>>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new([
            "pbkdf2_sha256",
            "pbkdf2_sha512",
            "bcrypt",
            "argon2",
            "pbkdf2_sha1",
            "sha1_crypt",
        ])
        .with_default("pbkdf2_sha256")
        .with_deprecated(["pbkdf2_sha1", "sha1_crypt"])
    }
}

impl Policy {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
            default: None,
            deprecated: BTreeSet::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, HashError> {
        serde_json::from_str(text)
            .map_err(|e| HashError::InvalidSetting(format!("policy is not valid: {e}")))
    }

    pub fn to_json(&self) -> Result<String, HashError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| HashError::InvalidSetting(format!("policy cannot be serialized: {e}")))
    }

    pub fn with_default(mut self, scheme: impl Into<String>) -> Self {
        self.default = Some(scheme.into());
        self
    }

    /// Replaces the deprecated set.
    pub fn with_deprecated<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deprecated = schemes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cost(
        mut self,
        scheme: impl Into<String>,
        param: impl Into<String>,
        bounds: CostBounds,
    ) -> Self {
        self.overrides
            .entry(scheme.into())
            .or_default()
            .insert(param.into(), bounds);
        self
    }

    /// Sets only the default of a parameter, keeping any bounds.
    pub fn with_default_cost(
        mut self,
        scheme: impl Into<String>,
        param: impl Into<String>,
        value: u32,
    ) -> Self {
        self.overrides
            .entry(scheme.into())
            .or_default()
            .entry(param.into())
            .or_default()
            .default = Some(value);
        self
    }

    /// The scheme new hashes use.
    pub fn default_scheme(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.schemes.first().map(String::as_str))
    }

    pub fn is_deprecated(&self, scheme: &str) -> bool {
        self.deprecated.contains(scheme)
    }

    pub fn overrides_for(&self, scheme: &str) -> Option<&BTreeMap<String, CostBounds>> {
        self.overrides.get(scheme)
    }
}
