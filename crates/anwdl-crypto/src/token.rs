//! URL-safe random token generation shared by the credential store and the
//! access-token store.

use base64::Engine;
use rand::RngCore;

/// Generates a cryptographically random, URL-safe, unpadded base64 token
/// from `raw_len` bytes of entropy.
#[must_use]
pub fn generate_url_safe_token(raw_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; raw_len];
    rng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anwdl_common::constants::{ACCESS_TOKEN_RAW_LEN, SESSION_TOKEN_RAW_LEN};

    #[test]
    fn session_token_has_expected_length_class() {
        let token = generate_url_safe_token(SESSION_TOKEN_RAW_LEN);
        assert!(token.len() >= 255);
    }

    #[test]
    fn access_token_has_expected_length() {
        let token = generate_url_safe_token(ACCESS_TOKEN_RAW_LEN);
        assert_eq!(token.len(), 124);
    }

    #[test]
    fn tokens_are_not_repeated() {
        let a = generate_url_safe_token(32);
        let b = generate_url_safe_token(32);
        assert_ne!(a, b);
    }
}
