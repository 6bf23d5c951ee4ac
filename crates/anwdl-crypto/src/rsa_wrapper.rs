//! RSA keypair generation and asymmetric encrypt/decrypt, used during the
//! binary protocol's initial key exchange.

use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::{CryptoError, Result};

/// An RSA keypair plus a cached PKCS#1 PEM encoding of its public half.
pub struct RsaWrapper {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl RsaWrapper {
    /// Generates a fresh RSA keypair at the given modulus size, in bits.
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Returns this key's public half as a PKCS#1 DER-encoded byte string,
    /// the wire shape exchanged over the binary protocol.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.public_key
            .to_pkcs1_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::CryptoMaterial(e.to_string()))
    }

    /// Parses a peer's PKCS#1 DER-encoded public key received over the wire.
    pub fn peer_public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
        RsaPublicKey::from_pkcs1_der(der).map_err(|e| CryptoError::CryptoMaterial(e.to_string()))
    }

    /// Encodes the private key as a PKCS#1 PEM document, for persisting the
    /// server's identity across restarts.
    pub fn to_private_pem(&self) -> Result<String> {
        self.private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::CryptoMaterial(e.to_string()))
    }

    /// Reconstructs a keypair from a previously-persisted PKCS#1 PEM private key.
    pub fn from_private_pem(pem: &str) -> Result<Self> {
        let private_key =
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| CryptoError::CryptoMaterial(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Encodes the public key as a PKCS#1 PEM document.
    pub fn to_public_pem(&self) -> Result<String> {
        self.public_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CryptoError::CryptoMaterial(e.to_string()))
    }

    /// Maximum plaintext size, in bytes, this key can encrypt with PKCS#1 v1.5
    /// padding in a single call.
    #[must_use]
    pub fn max_encryptable_len(&self) -> usize {
        self.private_key.size() - 11
    }

    /// Encrypts `plaintext` for the given peer public key.
    pub fn encrypt_for(peer: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let max = peer.size() - 11;
        if plaintext.len() > max {
            return Err(CryptoError::PayloadTooLarge {
                actual: plaintext.len(),
                max,
            });
        }
        let mut rng = rand::thread_rng();
        peer.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CryptoError::Rsa(e.to_string()))
    }

    /// Decrypts a ciphertext produced for this key's public half.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::Rsa(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_plaintext() {
        let wrapper = RsaWrapper::generate(2048).expect("keygen");
        let der = wrapper.public_key_der().expect("der encode");
        let peer_pub = RsaWrapper::peer_public_key_from_der(&der).expect("der decode");

        let plaintext = b"session secret";
        let ciphertext = RsaWrapper::encrypt_for(&peer_pub, plaintext).expect("encrypt");
        let decrypted = wrapper.decrypt(&ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn private_pem_round_trips() {
        let wrapper = RsaWrapper::generate(2048).expect("keygen");
        let pem = wrapper.to_private_pem().expect("encode pem");
        let reloaded = RsaWrapper::from_private_pem(&pem).expect("decode pem");
        assert_eq!(
            wrapper.public_key_der().expect("der"),
            reloaded.public_key_der().expect("der")
        );
    }

    #[test]
    fn rejects_oversized_plaintext() {
        let wrapper = RsaWrapper::generate(2048).expect("keygen");
        let der = wrapper.public_key_der().expect("der encode");
        let peer_pub = RsaWrapper::peer_public_key_from_der(&der).expect("der decode");

        let oversized = vec![0u8; 4096];
        let err = RsaWrapper::encrypt_for(&peer_pub, &oversized).unwrap_err();
        assert!(matches!(err, CryptoError::PayloadTooLarge { .. }));
    }
}
