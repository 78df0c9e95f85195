//! Timing-safe comparisons for secrets

/// Constant-time byte comparison to prevent timing attacks
///
/// Only the length is allowed to short-circuit.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
