use subtle::ConstantTimeEq;

/// Compare two byte strings without leaking where they first differ.
///
/// Lengths are not secret: slices of different length compare unequal
/// immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
