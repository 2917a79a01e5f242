//! Built-in hash schemes.

use std::sync::Arc;

use crate::{crypto::Pbkdf2Backend, handler::Handler};

pub mod argon2;
pub mod bcrypt;
pub mod pbkdf2;
pub mod sha1_crypt;

pub use argon2::{ARGON2, Argon2Handler};
pub use bcrypt::{BCRYPT, BcryptHandler};
pub use pbkdf2::{PBKDF2_SHA1, PBKDF2_SHA256, PBKDF2_SHA512, Pbkdf2Handler};
pub use sha1_crypt::{SHA1_CRYPT, Sha1CryptHandler};

/// One handler per built-in scheme, PBKDF2 variants bound to `backend`.
pub fn builtin_handlers(backend: Pbkdf2Backend) -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(Pbkdf2Handler::sha1(backend)),
        Arc::new(Pbkdf2Handler::sha256(backend)),
        Arc::new(Pbkdf2Handler::sha512(backend)),
        Arc::new(Sha1CryptHandler),
        Arc::new(BcryptHandler),
        Arc::new(Argon2Handler),
    ]
}
