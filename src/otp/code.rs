//! Code generation and comparison.

use rand::{Rng, rngs::OsRng};
use subtle::ConstantTimeEq;

/// Draw a numeric code of `length` digits from the OS CSPRNG.
///
/// Each digit is uniform over `0..=9` and leading zeros are kept, so the
/// code space is exactly `10^length`.
#[must_use]
pub fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Whether `candidate` has the shape of a code: exactly `length` ASCII digits.
#[must_use]
pub fn is_well_formed(candidate: &str, length: usize) -> bool {
    candidate.len() == length && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// Exact match in constant time with respect to the code contents.
#[must_use]
pub fn codes_match(stored: &str, candidate: &str) -> bool {
    stored.len() == candidate.len() && bool::from(stored.as_bytes().ct_eq(candidate.as_bytes()))
}
