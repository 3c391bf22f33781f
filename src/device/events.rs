//! Simulator events for embedding applications

use std::net::SocketAddr;

/// Events emitted by the simulator
#[derive(Debug, Clone)]
pub enum PedEvent {
    /// Both listeners are accepting connections
    Started {
        /// Bound primary address
        primary: SocketAddr,
        /// Bound secondary address
        secondary: SocketAddr,
    },

    /// Simulator stopped
    Stopped,

    /// Client connected to a listener
    ClientConnected {
        /// Client address
        address: SocketAddr,
    },

    /// Client disconnected
    ClientDisconnected {
        /// Client address
        address: SocketAddr,
    },

    /// A command was dispatched
    CommandHandled {
        /// Function-type of the command (empty for secondary traffic)
        function_type: String,
        /// Command name
        command: String,
    },

    /// POS session opened
    SessionOpened,

    /// POS session closed
    SessionClosed,

    /// Pairing handshake succeeded
    PairingSucceeded,

    /// Pairing handshake was rejected or failed
    PairingFailed,
}
