//! Key-derivation primitives backing the hash schemes.
//!
//! Every function here is pure computation over secret, salt and cost. None
//! of them compare derived material; verification goes through
//! [`compare::constant_time_eq`].

pub mod bcrypt;
pub mod compare;
pub mod kdf;
pub mod pbkdf;
pub mod random;
pub mod sha1_crypt;

pub use bcrypt::bcrypt_raw;
pub use compare::constant_time_eq;
pub use kdf::{Argon2Params, derive_key};
pub use pbkdf::{Digest, Pbkdf2Backend, pbkdf2_hmac};
pub use random::{random_bytes, random_chars};
pub use sha1_crypt::{sha1_crypt_raw, sha1_crypt_transposed};
