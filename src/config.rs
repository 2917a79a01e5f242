use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{context::Context, crypto::Pbkdf2Backend, policy::Policy, registry::Registry};

pub const BACKEND_ENV: &str = "HASHNEST_PBKDF2_BACKEND";

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub pbkdf2_backend: Pbkdf2Backend,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Loads `path` if given, else the default location if a file exists
    /// there, else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Ok(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("failed to write config {}", path.display()))
    }

    pub fn with_backend_override(mut self, backend: Option<&str>) -> Result<Self> {
        if let Some(name) = backend.filter(|b| !b.is_empty()) {
            self.pbkdf2_backend = name
                .parse()
                .with_context(|| format!("invalid {BACKEND_ENV} value"))?;
        }
        Ok(self)
    }

    /// Applies `HASHNEST_PBKDF2_BACKEND` if set.
    pub fn with_env_overrides(self) -> Result<Self> {
        let backend = std::env::var(BACKEND_ENV).ok();
        self.with_backend_override(backend.as_deref())
    }

    pub fn registry(&self) -> Result<Arc<Registry>> {
        if self.pbkdf2_backend == Pbkdf2Backend::default() {
            return Ok(Registry::builtin()?);
        }
        Ok(Arc::new(Registry::with_builtins(self.pbkdf2_backend)?))
    }

    pub fn context(&self) -> Result<Context> {
        let registry = self.registry()?;
        Context::with_registry(self.policy.clone(), registry).context("invalid hashing policy")
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "hashnest").context("could not determine platform directories")?;

    Ok(project_dirs.config_dir().join("config.json"))
}
