//! Hash string formatting helpers.
//!
//! Parsers here are strict: anything that would not re-render to the exact
//! same text is rejected as [`HashError::MalformedHash`].

use crate::error::HashError;

pub mod alphabet;

pub use alphabet::{AB64, B64, BCRYPT64, HASH64_CHARS, decode, encode, h64_decode, h64_encode};

/// Strips the scheme identifier from `hash`.
///
/// # Errors
///
/// Returns `MalformedHash` if `hash` does not start with `ident`.
pub fn strip_ident<'a>(scheme: &str, ident: &str, hash: &'a str) -> Result<&'a str, HashError> {
    hash.strip_prefix(ident)
        .ok_or_else(|| HashError::malformed(scheme, format!("expected identifier '{ident}'")))
}

/// Splits `rest` on `$` into exactly `N` fields.
pub fn split_fields<'a, const N: usize>(
    scheme: &str,
    rest: &'a str,
) -> Result<[&'a str; N], HashError> {
    let fields: Vec<&str> = rest.split('$').collect();
    <[&str; N]>::try_from(fields).map_err(|fields| {
        HashError::malformed(
            scheme,
            format!("expected {N} '$'-separated fields, found {}", fields.len()),
        )
    })
}

/// Parses a canonical decimal integer: ASCII digits only, no sign, no
/// leading zeros.
pub fn parse_decimal(scheme: &str, field: &str) -> Result<u32, HashError> {
    let digits = !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit());
    if !digits {
        return Err(HashError::malformed(
            scheme,
            format!("'{field}' is not a decimal number"),
        ));
    }
    if field.len() > 1 && field.starts_with('0') {
        return Err(HashError::malformed(
            scheme,
            format!("'{field}' has leading zeros"),
        ));
    }
    field
        .parse::<u32>()
        .map_err(|_| HashError::malformed(scheme, format!("'{field}' is out of range")))
}

/// Parses a `key=value` pair with a canonical decimal value.
pub fn parse_assignment(scheme: &str, key: &str, field: &str) -> Result<u32, HashError> {
    let value = field
        .strip_prefix(key)
        .and_then(|v| v.strip_prefix('='))
        .ok_or_else(|| HashError::malformed(scheme, format!("expected '{key}=' in '{field}'")))?;
    parse_decimal(scheme, value)
}
