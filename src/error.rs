use std::fmt;

/// Errors raised while hashing, parsing or verifying passwords.
///
/// `verify` reports a wrong secret as `Ok(false)`. Every variant here means
/// something is structurally wrong (a corrupt stored hash, a bad policy, an
/// unusable backend) and should be surfaced to operators, not treated as a
/// failed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    MalformedHash(String),
    UnknownScheme(String),
    UnsupportedDigest(String),
    InvalidCost {
        scheme: String,
        param: String,
        value: u64,
        min: u32,
        max: u32,
    },
    InvalidSalt(String),
    DuplicateIdentifier(String),
    InvalidSetting(String),
    Backend(String),
}

impl HashError {
    pub(crate) fn malformed(scheme: &str, reason: impl fmt::Display) -> Self {
        HashError::MalformedHash(format!("{scheme}: {reason}"))
    }
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::MalformedHash(msg) => write!(f, "malformed hash: {msg}"),
            HashError::UnknownScheme(s) => write!(f, "unknown or disabled scheme: {s}"),
            HashError::UnsupportedDigest(d) => write!(f, "unsupported digest '{d}'"),
            HashError::InvalidCost {
                scheme,
                param,
                value,
                min,
                max,
            } => write!(
                f,
                "{scheme}: {param}={value} outside allowed range {min}..={max}"
            ),
            HashError::InvalidSalt(msg) => write!(f, "invalid salt: {msg}"),
            HashError::DuplicateIdentifier(id) => {
                write!(f, "identifier '{id}' collides with a registered scheme")
            }
            HashError::InvalidSetting(msg) => write!(f, "invalid setting: {msg}"),
            HashError::Backend(msg) => write!(f, "key derivation failed: {msg}"),
        }
    }
}

impl std::error::Error for HashError {}
