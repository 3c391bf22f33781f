//! Cryptographic primitives for the pairing handshake and payload envelope

mod aes;
mod error;
mod rsa;

pub use self::aes::AesCbcCipher;
pub use self::error::CryptoError;
pub use self::rsa::{PeerPublicKey, PosPrivateKey};

/// Length of various cryptographic values
pub mod lengths {
    /// AES-128 key length
    pub const AES_128_KEY: usize = 16;
    /// AES-256 key length
    pub const AES_256_KEY: usize = 32;
    /// AES-CBC IV length (one block)
    pub const AES_CBC_IV: usize = 16;
    /// Session key generated during pairing (128 bits)
    pub const SESSION_KEY: usize = 16;
}
