use std::io;
use thiserror::Error;

use crate::actor::BridgeError;
use crate::protocol::crypto::CryptoError;
use crate::protocol::envelope::EnvelopeError;
use crate::protocol::pairing::StorageError;

/// Errors that can occur while running the simulator
#[derive(Debug, Error)]
pub enum PedError {
    /// Inbound document could not be parsed
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Payload decryption or key wrapping failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The interactive actor channel failed the exchange
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Pairing credentials could not be persisted
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// Listener is already running
    #[error("simulator already running")]
    AlreadyRunning,
}

impl PedError {
    /// Check if this error must be answered with the fixed bad-XML document
    ///
    /// Every fault that reaches the transport boundary is answered this way;
    /// the connection stays open either way.
    #[must_use]
    pub fn is_protocol_fault(&self) -> bool {
        matches!(
            self,
            Self::Envelope(_) | Self::Crypto(_) | Self::Bridge(_) | Self::Storage(_)
        )
    }
}

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, PedError>;
