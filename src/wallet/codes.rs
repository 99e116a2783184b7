//! Confirmation codes
//!
//! Codes are numeric strings of a configured width. Only the SHA-256 hex
//! digest is persisted; the plaintext leaves the process through the
//! notifier (and optionally the API response).

use rand::Rng;
use sha2::{Digest, Sha256};

/// Random zero-padded numeric code of `digits` length
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, digits: u32) -> String {
    let upper = 10u64.pow(digits);
    let value = rng.gen_range(0..upper);
    format!("{:0width$}", value, width = digits as usize)
}

pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_code_width_and_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_code(&mut rng, 6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_is_stable_and_trims() {
        assert_eq!(hash_code("123456"), hash_code(" 123456 "));
        assert_ne!(hash_code("123456"), hash_code("123457"));
        assert_eq!(hash_code("123456").len(), 64);
    }
}
