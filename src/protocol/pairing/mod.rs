//! Encrypted-channel pairing handshake
//!
//! The POS presents an RSA public key; the simulator derives a short
//! human-verifiable code from it and asks the interactive actor to confirm.
//! On a match it generates a fresh symmetric session key and hands it back
//! wrapped under the peer's key.

mod credentials;
mod storage;

pub use self::credentials::PairingCredentials;
pub use self::storage::{CredentialStore, FileStore, MemoryStore, StorageError};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use super::crypto::{CryptoError, PeerPublicKey, lengths};

/// Pairing codes are 4 uppercase hex characters
pub const PAIRING_CODE_LEN: usize = 4;

/// Derive the pairing code for a presented public key
///
/// The code is the first two bytes of `SHA1(key_der)` rendered as uppercase
/// hex. Deterministic: the same key always yields the same code, which is
/// what lets a human compare it against the POS display.
#[must_use]
pub fn pairing_code(key_der: &[u8]) -> String {
    let digest = Sha1::digest(key_der);
    format!("{:02X}{:02X}", digest[0], digest[1])
}

/// Key material produced by a confirmed handshake
pub struct PairingOutcome {
    /// Fresh 128-bit session key, to be persisted as `mac_key`
    pub session_key: Vec<u8>,
    /// Session key wrapped under the peer's public key, base64
    pub terminal_key_b64: String,
    /// Entry code wrapped under the peer's public key, base64
    pub entry_code_b64: String,
}

/// Complete a confirmed handshake
///
/// Generates the session key and independently wraps the entry code and the
/// key with PKCS#1 v1.5 under the peer's public key.
///
/// # Errors
///
/// Returns `CryptoError` if RSA encryption fails.
pub fn complete_pairing(
    peer: &PeerPublicKey,
    entry_code: &str,
) -> Result<PairingOutcome, CryptoError> {
    use rand::RngCore;

    let mut session_key = vec![0u8; lengths::SESSION_KEY];
    rand::thread_rng().fill_bytes(&mut session_key);

    let entry_code_enc = peer.encrypt_pkcs1(entry_code.as_bytes())?;
    let terminal_key_enc = peer.encrypt_pkcs1(&session_key)?;

    Ok(PairingOutcome {
        session_key,
        terminal_key_b64: BASE64.encode(terminal_key_enc),
        entry_code_b64: BASE64.encode(entry_code_enc),
    })
}
