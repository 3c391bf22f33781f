//! The emulated payment-entry device
//!
//! This module contains the command dispatcher, the secondary status
//! handler, and the TCP server that wires them to the two listener ports.

pub mod config;
pub mod dispatcher;
pub mod documents;
pub mod events;
pub mod parameters;
pub mod payment;
pub mod secondary;
pub mod server;

pub use config::{IvPolicy, PedConfig};
pub use dispatcher::Dispatcher;
pub use events::PedEvent;
pub use secondary::SecondaryCommands;
pub use server::{PedSimulator, SimulatorState};

#[cfg(test)]
mod dispatcher_tests;
