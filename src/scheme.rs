//! Static description of a hash scheme: identifier, cost parameters, salt
//! and checksum sizes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a cost value maps onto work performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMetric {
    /// work ∝ rounds
    Linear,
    /// work ∝ 2^rounds
    Log2,
}

impl CostMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CostMetric::Linear => "linear",
            CostMetric::Log2 => "log2",
        }
    }

    /// Relative work performed for a cost value.
    pub fn work(&self, cost: f64) -> f64 {
        match self {
            CostMetric::Linear => cost,
            CostMetric::Log2 => cost.exp2(),
        }
    }

    /// Cost value that performs `work`.
    pub fn inverse(&self, work: f64) -> f64 {
        match self {
            CostMetric::Linear => work,
            CostMetric::Log2 => work.log2(),
        }
    }
}

impl fmt::Display for CostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named cost parameter with inclusive bounds and a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: u32, max: u32, default: u32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn clamp(&self, value: u32) -> u32 {
        value.clamp(self.min, self.max)
    }
}

/// Salt length bounds in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaltSpec {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl SaltSpec {
    pub const fn new(min: usize, max: usize, default: usize) -> Self {
        Self { min, max, default }
    }

    pub const fn fixed(len: usize) -> Self {
        Self::new(len, len, len)
    }
}

/// Everything about a scheme that does not need code: its name, the prefix
/// that identifies its hash strings, and the bounds of its settings.
///
/// The first entry of `params` is the primary cost ("rounds") that
/// `cost_metric` describes and calibration tunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeDescriptor {
    pub name: &'static str,
    pub ident: &'static str,
    pub cost_metric: CostMetric,
    pub params: &'static [ParamSpec],
    pub salt: SaltSpec,
    pub checksum_size: usize,
}

impl SchemeDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The primary cost parameter.
    pub fn rounds(&self) -> Option<&ParamSpec> {
        self.params.first()
    }

    /// Whether `ident` equals, prefixes, or is prefixed by this scheme's
    /// identifier. Such pairs could not be told apart by prefix lookup.
    pub fn ident_overlaps(&self, ident: &str) -> bool {
        self.ident.starts_with(ident) || ident.starts_with(self.ident)
    }
}
