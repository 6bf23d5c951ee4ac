//! Symmetric encryption used once the handshake has exchanged a session key.
//!
//! The original protocol used AES-CBC with manual padding; this port uses
//! AES-256-GCM instead so every encrypted frame is also authenticated. The
//! 16-byte IV exchanged during the handshake is kept at its original size for
//! wire compatibility with the key-exchange shape, but only its first 12
//! bytes are used as the GCM nonce (GCM nonces are 96 bits).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use anwdl_common::constants::{AES_IV_LEN, AES_KEY_LEN};

use crate::error::{CryptoError, Result};

/// Generates a fresh random AES-256 key and IV, sized per the wire protocol.
#[must_use]
pub fn generate_key_iv() -> (Vec<u8>, Vec<u8>) {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    let mut key = vec![0u8; AES_KEY_LEN];
    let mut iv = vec![0u8; AES_IV_LEN];
    rng.fill_bytes(&mut key);
    rng.fill_bytes(&mut iv);
    (key, iv)
}

/// A bound AES-256-GCM key+nonce pair, ready to encrypt/decrypt frames.
pub struct AesWrapper {
    cipher: Aes256Gcm,
    nonce: [u8; 12],
}

impl AesWrapper {
    /// Builds a wrapper from a 32-byte key and 16-byte IV.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        if key.len() != AES_KEY_LEN {
            return Err(CryptoError::Aes(format!(
                "key must be {AES_KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        if iv.len() != AES_IV_LEN {
            return Err(CryptoError::Aes(format!(
                "iv must be {AES_IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&iv[..12]);
        Ok(Self { cipher, nonce })
    }

    /// Encrypts and authenticates `plaintext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|e| CryptoError::Aes(e.to_string()))
    }

    /// Decrypts and verifies `ciphertext`, failing if the tag does not match.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < 16 {
            return Err(CryptoError::CiphertextTooShort);
        }
        self.cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map_err(|e| CryptoError::Aes(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let (key, iv) = generate_key_iv();
        let wrapper = AesWrapper::new(&key, &iv).expect("construct");
        let plaintext = b"{\"verb\":\"STAT\"}";
        let ciphertext = wrapper.encrypt(plaintext).expect("encrypt");
        assert_ne!(ciphertext, plaintext);
        let decrypted = wrapper.decrypt(&ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_wrong_key_size() {
        let err = AesWrapper::new(&[0u8; 10], &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::Aes(_)));
    }

    #[test]
    fn detects_tampered_ciphertext() {
        let (key, iv) = generate_key_iv();
        let wrapper = AesWrapper::new(&key, &iv).expect("construct");
        let mut ciphertext = wrapper.encrypt(b"payload").expect("encrypt");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(wrapper.decrypt(&ciphertext).is_err());
    }
}
