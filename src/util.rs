//! Random fixtures for tests and load generation.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::Currency;

/// Random integer in `min..=max`
pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random lowercase string of length `n`
pub fn random_string(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .take(n)
        .collect()
}

pub fn random_owner() -> String {
    random_string(12)
}

pub fn random_money() -> i64 {
    random_int(0, 1000)
}

pub fn random_currency() -> Currency {
    *Currency::ALL
        .choose(&mut rand::thread_rng())
        .unwrap_or(&Currency::Usd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_int_in_range() {
        for _ in 0..100 {
            let n = random_int(5, 10);
            assert!((5..=10).contains(&n));
        }
    }

    #[test]
    fn test_random_string_shape() {
        let s = random_string(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_lowercase()));
    }
}
