//! # pedsim
//!
//! A pure Rust simulator for XML-over-TCP payment entry devices (PED),
//! built for integration testing POS software without hardware on the
//! bench.
//!
//! ## Features
//!
//! - Vendor-exact `<TRANSACTION>`/`<RESPONSE>` protocol on two TCP ports
//! - Device/session state machine with busy/cancel/approval gating
//! - Pairing handshake: SHA-1 derived code, RSA-wrapped session key
//! - AES-CBC encrypted payload envelope once paired
//! - Human decisions bridged to an interactive actor, correlated by ID
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pedsim::{ActorLink, MemoryStore, PedConfig, PedSimulator};
//!
//! # async fn example() -> pedsim::Result<()> {
//! // The embedder owns the actor transport: drain `frames`, answer via
//! // `actor.resolve(id, answer)`.
//! let (actor, _frames) = ActorLink::new(32);
//! actor.connect();
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut simulator = PedSimulator::new(PedConfig::default(), store, actor);
//! simulator.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **High-level**: [`PedSimulator`] - both listeners over one device
//! - **Mid-level**: [`Dispatcher`] / [`SecondaryCommands`] - command handling
//! - **Low-level**: Protocol modules - envelope codec, crypto, pairing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Correlation bridge to the interactive actor
pub mod actor;
/// The emulated device: dispatch, state machine, listeners
pub mod device;
/// Error types
pub mod error;
/// Wire-protocol building blocks
pub mod protocol;
/// Shared device state
pub mod state;

// Re-exports
pub use actor::{ActorLink, ActorRequest, BridgeError};
pub use device::{
    Dispatcher, IvPolicy, PedConfig, PedEvent, PedSimulator, SecondaryCommands, SimulatorState,
};
pub use error::{PedError, Result};
pub use protocol::crypto::{AesCbcCipher, CryptoError, PeerPublicKey, PosPrivateKey};
pub use protocol::envelope::{Document, EnvelopeError, ResponseBuilder};
pub use protocol::pairing::{
    CredentialStore, FileStore, MemoryStore, PairingCredentials, StorageError, pairing_code,
};
pub use state::{DeviceState, StateHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        ActorLink, ActorRequest, CredentialStore, FileStore, MemoryStore, PedConfig, PedError,
        PedEvent, PedSimulator, Result, StateHandle,
    };
}
