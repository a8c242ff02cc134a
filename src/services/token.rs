//! Random tokens
//!
//! Password reset tokens and CSRF secrets are 32 bytes from the OS RNG,
//! hex encoded. Session ids are UUID v4.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::Duration;
use data_encoding::HEXLOWER;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// How long a password reset link stays valid
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

const TOKEN_BYTES: usize = 32;

pub fn reset_token_ttl() -> Duration {
    Duration::hours(RESET_TOKEN_TTL_HOURS)
}

/// 64 lowercase hex characters
pub fn generate_reset_token() -> String {
    random_hex()
}

pub fn generate_csrf_token() -> String {
    random_hex()
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn random_hex() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// Compare two secrets in constant time. Only the length may leak.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_reset_token_format() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..100).map(|_| generate_reset_token()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        assert_eq!(id.len(), 32);
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_reset_token_ttl_is_one_hour() {
        assert_eq!(reset_token_ttl(), Duration::minutes(60));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_constant_time_eq_matches_eq(a in "[a-f0-9]{0,8}", b in "[a-f0-9]{0,8}") {
            prop_assert_eq!(constant_time_eq(&a, &b), a == b);
        }
    }
}
