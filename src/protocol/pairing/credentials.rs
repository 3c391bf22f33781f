/// Pairing credentials shared with the integrating POS
///
/// An empty `mac_key` means unpaired. Populated by a successful handshake,
/// cleared by UNREGISTER; every writer persists through a
/// [`CredentialStore`](super::CredentialStore) before acknowledging success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingCredentials {
    /// Symmetric session key (16 bytes once paired)
    pub mac_key: Vec<u8>,
    /// Session label returned in the pairing response
    pub mac_label: String,
    /// Last-issued pairing challenge code
    pub pairing_code: String,
}

impl PairingCredentials {
    /// Whether a session key is present
    #[must_use]
    pub fn is_paired(&self) -> bool {
        !self.mac_key.is_empty()
    }

    /// Reset to the unpaired state
    pub fn clear(&mut self) {
        self.mac_key.clear();
        self.mac_label.clear();
        self.pairing_code.clear();
    }
}
