use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use aes::{Aes128, Aes256};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use super::{CryptoError, lengths};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-CBC cipher for the encrypted transaction payload
///
/// Key length selects the variant: 16 bytes runs AES-128, 32 bytes AES-256.
/// Padding is PKCS7; ciphertext crosses the wire as base64 text. The IV is
/// supplied per message by the peer (or fixed all-zero in the legacy
/// envelope variant).
pub struct AesCbcCipher {
    key: Vec<u8>,
}

impl AesCbcCipher {
    /// Create cipher with a 16- or 32-byte key
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` for any other key size.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            lengths::AES_128_KEY | lengths::AES_256_KEY => Ok(Self { key: key.to_vec() }),
            actual => Err(CryptoError::InvalidKeyLength {
                expected: lengths::AES_128_KEY,
                actual,
            }),
        }
    }

    /// Encrypt, returning base64 ciphertext
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if the IV is not one block long.
    pub fn encrypt_base64(&self, plaintext: &[u8], iv: &[u8]) -> Result<String, CryptoError> {
        let iv = check_iv(iv)?;

        let ciphertext = if self.key.len() == lengths::AES_128_KEY {
            Aes128CbcEnc::new_from_slices(&self.key, iv)
                .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        } else {
            Aes256CbcEnc::new_from_slices(&self.key, iv)
                .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        };

        Ok(BASE64.encode(ciphertext))
    }

    /// Decrypt base64 ciphertext
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on bad base64, a short
    /// ciphertext, or a padding failure. Callers map this to the
    /// protocol-level bad-XML document rather than propagating a fault.
    pub fn decrypt_base64(&self, cipher_b64: &str, iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv = check_iv(iv)?;
        let ciphertext = BASE64
            .decode(cipher_b64.trim())
            .map_err(|e| CryptoError::DecryptionFailed(format!("invalid base64: {e}")))?;

        let plaintext = if self.key.len() == lengths::AES_128_KEY {
            Aes128CbcDec::new_from_slices(&self.key, iv)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        } else {
            Aes256CbcDec::new_from_slices(&self.key, iv)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        };

        plaintext.map_err(|_| CryptoError::DecryptionFailed("bad padding".to_string()))
    }
}

fn check_iv(iv: &[u8]) -> Result<&[u8], CryptoError> {
    if iv.len() == lengths::AES_CBC_IV {
        Ok(iv)
    } else {
        Err(CryptoError::InvalidIvLength {
            expected: lengths::AES_CBC_IV,
            actual: iv.len(),
        })
    }
}
