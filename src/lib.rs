//! Password hashing with pluggable schemes, policy driven migration and
//! constant-time verification.
//!
//! ```no_run
//! use hashnest::Context;
//!
//! let ctx = Context::builtin()?;
//! let stored = ctx.hash("hunter2")?;
//! let (ok, replacement) = ctx.verify_and_update("hunter2", &stored)?;
//! assert!(ok && replacement.is_none());
//! # Ok::<(), hashnest::HashError>(())
//! ```

pub mod calibrate;
pub mod config;
pub mod context;
pub mod crypto;
mod error;
pub mod format;
pub mod handler;
pub mod policy;
pub mod registry;
pub mod scheme;
pub mod schemes;

pub use crate::calibrate::{CalibrateOptions, Calibration, Recommendation, choose_rounds};
pub use crate::config::{Settings, default_config_path};
pub use crate::context::Context;
pub use crate::crypto::{Digest, Pbkdf2Backend, constant_time_eq};
pub use crate::error::HashError;
pub use crate::handler::{CostParams, Handler, HashOptions, HashRecord};
pub use crate::policy::{CostBounds, Policy};
pub use crate::registry::Registry;
pub use crate::scheme::{CostMetric, ParamSpec, SaltSpec, SchemeDescriptor};
