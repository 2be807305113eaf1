//! OS-seeded random helpers used by the password and OTP generators.

use rand::rngs::OsRng;
use rand::Rng;

/// Character pools that generated strings draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomSource {
    Number,
    AlphaLower,
    AlphaUpper,
}

impl RandomSource {
    pub fn chars(self) -> &'static str {
        match self {
            RandomSource::Number => "0123456789",
            RandomSource::AlphaLower => "abcdefghijklmnopqrstuvwxyz",
            // Kept as issued: existing access passwords were generated from this pool.
            RandomSource::AlphaUpper => "ABCDEFGHIJKLMNOPQRSTUXWXYZ",
        }
    }
}

/// Uniform integer in `min..=max`. Returns `min` when the range is empty.
pub fn random_int(min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    OsRng.gen_range(min..=max)
}

/// Builds a random string of `length` chars from the concatenated `sources`,
/// with the first occurrence of each `prohibited` char removed from the pool.
pub fn random_string(length: usize, sources: &[RandomSource], prohibited: &str) -> String {
    let mut pool: String = sources.iter().map(|s| s.chars()).collect();
    for c in prohibited.chars() {
        if let Some(pos) = pool.find(c) {
            pool.remove(pos);
        }
    }

    let pool: Vec<char> = pool.chars().collect();
    if pool.is_empty() {
        return String::new();
    }

    (0..length)
        .map(|_| pool[random_int(0, pool.len() as i64 - 1) as usize])
        .collect()
}

/// Numeric one-time code.
pub fn otp_code(length: usize) -> String {
    random_string(length, &[RandomSource::Number], "")
}

/// Eight-char access password without look-alike characters.
pub fn new_access_password() -> String {
    random_string(
        8,
        &[
            RandomSource::Number,
            RandomSource::AlphaUpper,
            RandomSource::AlphaLower,
        ],
        "01IOlo",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_int_stays_in_inclusive_range() {
        for _ in 0..1000 {
            let v = random_int(3, 7);
            assert!((3..=7).contains(&v));
        }
        assert_eq!(random_int(5, 5), 5);
        assert_eq!(random_int(9, 2), 9);
    }

    #[test]
    fn access_password_avoids_ambiguous_chars() {
        for _ in 0..200 {
            let p = new_access_password();
            assert_eq!(p.chars().count(), 8);
            assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(!p.contains(['0', '1', 'I', 'O', 'l', 'o']));
        }
    }

    #[test]
    fn otp_is_numeric() {
        let otp = otp_code(6);
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn empty_pool_yields_empty_string() {
        assert_eq!(random_string(4, &[RandomSource::Number], "0123456789"), "");
    }
}
