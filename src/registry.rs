//! Name and identifier lookup for hash schemes.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::{crypto::Pbkdf2Backend, error::HashError, handler::Handler, schemes};

/// A set of handlers with unique names and non-overlapping identifiers.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in scheme.
    pub fn with_builtins(backend: Pbkdf2Backend) -> Result<Self, HashError> {
        let mut registry = Self::new();
        for handler in schemes::builtin_handlers(backend) {
            registry.register_arc(handler)?;
        }
        Ok(registry)
    }

    /// Shared built-in registry on the default PBKDF2 backend.
    pub fn builtin() -> Result<Arc<Registry>, HashError> {
        static BUILTIN: OnceLock<Arc<Registry>> = OnceLock::new();
        if let Some(registry) = BUILTIN.get() {
            return Ok(Arc::clone(registry));
        }
        let registry = Arc::new(Self::with_builtins(Pbkdf2Backend::default())?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| registry)))
    }

    pub fn register<H: Handler + 'static>(&mut self, handler: H) -> Result<(), HashError> {
        self.register_arc(Arc::new(handler))
    }

    /// Adds `handler`.
    ///
    /// # Errors
    ///
    /// `DuplicateIdentifier` if its name is taken or its identifier equals,
    /// or is a prefix of, one already registered.
    pub fn register_arc(&mut self, handler: Arc<dyn Handler>) -> Result<(), HashError> {
        let descriptor = handler.descriptor();
        if descriptor.ident.is_empty() {
            return Err(HashError::InvalidSetting(format!(
                "scheme '{}' has an empty identifier",
                descriptor.name
            )));
        }
        for existing in &self.handlers {
            let other = existing.descriptor();
            if other.name == descriptor.name {
                return Err(HashError::DuplicateIdentifier(descriptor.name.to_string()));
            }
            if other.ident_overlaps(descriptor.ident) {
                return Err(HashError::DuplicateIdentifier(descriptor.ident.to_string()));
            }
        }

        debug!(
            scheme = descriptor.name,
            ident = descriptor.ident,
            "registered hash scheme"
        );
        self.handlers.push(handler);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Handler>, HashError> {
        self.handlers
            .iter()
            .find(|h| h.name() == name)
            .cloned()
            .ok_or_else(|| HashError::UnknownScheme(name.to_string()))
    }

    /// The handler whose identifier prefixes `hash`.
    pub fn resolve_from_hash(&self, hash: &str) -> Result<Arc<dyn Handler>, HashError> {
        self.handlers
            .iter()
            .find(|h| h.identify(hash))
            .cloned()
            .ok_or_else(|| HashError::UnknownScheme(describe(hash)))
    }

    pub fn schemes(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

// Hash strings are sensitive; errors only show the identifier-like prefix.
fn describe(hash: &str) -> String {
    let prefix: String = match hash.strip_prefix('$') {
        Some(rest) => match rest.find('$') {
            Some(end) => hash[..end + 2].to_string(),
            None => "$...".to_string(),
        },
        None => hash.chars().take(4).collect(),
    };
    format!("unrecognised identifier '{prefix}'")
}
