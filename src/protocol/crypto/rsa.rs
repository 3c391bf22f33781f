//! RSA key wrapping for the pairing handshake

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use super::CryptoError;

/// RSA modulus size generated for test key pairs (bits)
const TEST_MODULUS_BITS: usize = 1024;

/// Public key presented by the integrating POS during pairing
///
/// Arrives as base64-encoded DER (SubjectPublicKeyInfo). The raw DER bytes
/// are kept alongside the parsed key because the pairing code is a digest
/// of exactly those bytes.
pub struct PeerPublicKey {
    der: Vec<u8>,
    inner: RsaPublicKey,
}

impl PeerPublicKey {
    /// Decode from the base64 DER text carried in the request document
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidPublicKey` if the text is not valid
    /// base64 or the DER does not describe an RSA public key.
    pub fn from_base64_der(b64: &str) -> Result<Self, CryptoError> {
        let der = BASE64
            .decode(b64.trim())
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let inner =
            RsaPublicKey::from_public_key_der(&der).map_err(|_| CryptoError::InvalidPublicKey)?;

        Ok(Self { der, inner })
    }

    /// Raw DER bytes as presented by the peer
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Encrypt with PKCS#1 v1.5 padding
    ///
    /// Used to wrap the entry code and the fresh session key for the peer.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if the plaintext exceeds the
    /// modulus capacity.
    pub fn encrypt_pkcs1(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use rand::rngs::OsRng;

        self.inner
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

/// RSA private key held by the integrating POS
///
/// The simulator never holds one; this exists so tests can drive the full
/// handshake and unwrap what the simulator sends back.
pub struct PosPrivateKey {
    inner: RsaPrivateKey,
}

impl PosPrivateKey {
    /// Generate a fresh key pair
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngError` if key generation fails.
    pub fn generate() -> Result<Self, CryptoError> {
        use rand::rngs::OsRng;

        let inner = RsaPrivateKey::new(&mut OsRng, TEST_MODULUS_BITS)
            .map_err(|_| CryptoError::RngError)?;

        Ok(Self { inner })
    }

    /// Public half as the base64 DER text a POS would present
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidPublicKey` if DER encoding fails.
    pub fn public_key_base64_der(&self) -> Result<String, CryptoError> {
        let der = self
            .inner
            .to_public_key()
            .to_public_key_der()
            .map_err(|_| CryptoError::InvalidPublicKey)?;

        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Unwrap a PKCS#1 v1.5 ciphertext
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on a padding or key mismatch.
    pub fn decrypt_pkcs1(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.inner
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}
