//! Simulator configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Where the IV for the encrypted envelope comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvPolicy {
    /// Use the hex IV carried in each `ETRANSACTION`
    #[default]
    PeerSupplied,
    /// Legacy peers omit the IV and assume all-zero
    FixedZero,
}

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct PedConfig {
    /// Bind address for both listeners
    pub bind_addr: IpAddr,

    /// Primary protocol port (0 = auto-assign)
    pub primary_port: u16,

    /// Secondary status port (0 = auto-assign)
    pub secondary_port: u16,

    /// Version string answered to DEVICE/VERSION
    pub version_info: String,

    /// Label persisted and returned on successful pairing
    pub mac_label: String,

    /// Entry-code plaintext wrapped into the pairing response
    pub entry_code: String,

    /// IV handling for the encrypted envelope
    pub iv_policy: IvPolicy,

    /// Window to wait for an actor answer (None = wait indefinitely,
    /// matching the reference device)
    pub actor_timeout: Option<Duration>,
}

impl Default for PedConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            primary_port: 5015,
            secondary_port: 5016,
            version_info: "RDI Simulator.  Better than the real thing".to_string(),
            mac_label: "PED_SIM".to_string(),
            entry_code: String::new(),
            iv_policy: IvPolicy::PeerSupplied,
            actor_timeout: None,
        }
    }
}

impl PedConfig {
    /// Set the primary port
    #[must_use]
    pub fn primary_port(mut self, port: u16) -> Self {
        self.primary_port = port;
        self
    }

    /// Set the secondary port
    #[must_use]
    pub fn secondary_port(mut self, port: u16) -> Self {
        self.secondary_port = port;
        self
    }

    /// Set the IV policy
    #[must_use]
    pub fn iv_policy(mut self, policy: IvPolicy) -> Self {
        self.iv_policy = policy;
        self
    }

    /// Set the actor answer timeout
    #[must_use]
    pub fn actor_timeout(mut self, timeout: Duration) -> Self {
        self.actor_timeout = Some(timeout);
        self
    }
}
