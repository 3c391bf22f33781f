//! Shared device/session state
//!
//! One `DeviceState` exists per simulator instance. It is never reached
//! through an ambient global: every dispatcher gets a [`StateHandle`]
//! injected at construction, and all mutation goes through it.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Card presented on the simulated terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCard {
    /// PAN (masked where rendered)
    pub number: String,
    /// Card scheme rendered as PAYMENT_MEDIA
    pub scheme: String,
    /// Expiry month (1-12)
    pub exp_month: u8,
    /// Expiry year (four digits)
    pub exp_year: u16,
}

impl Default for ActiveCard {
    fn default() -> Self {
        Self {
            number: "4111111111111111".to_string(),
            scheme: "VISA".to_string(),
            exp_month: 1,
            exp_year: 2030,
        }
    }
}

impl ActiveCard {
    /// PAN with everything but the last four digits masked
    #[must_use]
    pub fn masked_number(&self) -> String {
        let tail_at = self.number.len().saturating_sub(4);
        let (head, tail) = self.number.split_at(tail_at);
        format!("{}{tail}", "*".repeat(head.len()))
    }
}

/// Gift-card account mutated by the GIFT command family
#[derive(Debug, Clone, PartialEq)]
pub struct GiftCardAccount {
    /// Masked account number rendered in gift documents
    pub number: String,
    /// Current balance
    pub balance: f64,
}

impl Default for GiftCardAccount {
    fn default() -> Self {
        Self {
            number: "************0011".to_string(),
            balance: 0.0,
        }
    }
}

/// How the last payment was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    /// Credit/debit card
    #[default]
    CreditCard,
    /// Gift card
    GiftCard,
}

/// The most recent approved payment, read back by VOID
#[derive(Debug, Clone, PartialEq)]
pub struct LastPaymentRecord {
    /// Approved amount as it appeared on the wire
    pub amount: String,
    /// Transaction date, `yyyy.mm.dd`
    pub date: String,
    /// Settlement method
    pub method: PaymentMethod,
}

impl Default for LastPaymentRecord {
    fn default() -> Self {
        Self {
            amount: "42.50".to_string(),
            date: "2025.09.13".to_string(),
            method: PaymentMethod::CreditCard,
        }
    }
}

/// Mutable device state shared by every command handler
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// A POS session is open (SESSION/START .. SESSION/FINISH)
    pub session_open: bool,
    /// Device is busy; gates all PAYMENT commands
    pub device_busy: bool,
    /// Payments are approved rather than declined
    pub approval_mode: bool,
    /// Customer pressed cancel on the device
    pub user_cancel: bool,
    /// Device reports itself connected
    pub connected: bool,
    /// A software update is staged (secondary ANY_UPDATES)
    pub update_available: bool,
    /// Update progress state, 0..=6 (secondary UPDATE_STATUS)
    pub update_status: u8,
    /// A card swipe is pending
    pub card_swiped: bool,
    /// Last dispatched (function-type, command) pair
    pub last_command: String,
    /// Commands handled since startup
    pub counter: u64,
    /// Card on the terminal
    pub active_card: ActiveCard,
    /// Gift-card account
    pub gift_card: GiftCardAccount,
    /// Last approved payment
    pub last_payment: LastPaymentRecord,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            session_open: false,
            device_busy: false,
            // The real terminal boots approving; REBOOT restores this
            approval_mode: true,
            user_cancel: false,
            connected: false,
            update_available: false,
            update_status: 0,
            card_swiped: false,
            last_command: String::new(),
            counter: 0,
            active_card: ActiveCard::default(),
            gift_card: GiftCardAccount::default(),
            last_payment: LastPaymentRecord::default(),
        }
    }
}

/// Owned handle to the shared device state
///
/// Cheap to clone; every clone refers to the same record. The lock is held
/// only for the synchronous portion of a command and released before any
/// suspension on the actor bridge.
#[derive(Clone, Default)]
pub struct StateHandle {
    inner: Arc<RwLock<DeviceState>>,
}

impl StateHandle {
    /// Create a handle over a fresh default state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current state
    pub async fn get(&self) -> DeviceState {
        self.inner.read().await.clone()
    }

    /// Mutate the state under the write lock, returning the closure's value
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut DeviceState) -> R,
    {
        let mut state = self.inner.write().await;
        f(&mut state)
    }

    /// Record a dispatched command
    pub async fn note_command(&self, function_type: &str, command: &str) {
        self.update(|s| {
            s.last_command = format!("{function_type}/{command}");
            s.counter += 1;
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_flags() {
        let state = StateHandle::new().get().await;
        assert!(!state.session_open);
        assert!(!state.device_busy);
        assert!(state.approval_mode);
        assert!(!state.user_cancel);
        assert_eq!(state.counter, 0);
    }

    #[tokio::test]
    async fn test_update_returns_closure_value() {
        let handle = StateHandle::new();
        let was_open = handle
            .update(|s| {
                let prev = s.session_open;
                s.session_open = true;
                prev
            })
            .await;

        assert!(!was_open);
        assert!(handle.get().await.session_open);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = StateHandle::new();
        let b = a.clone();

        a.update(|s| s.gift_card.balance = 25.0).await;
        assert!((b.get().await.gift_card.balance - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_masked_number() {
        assert_eq!(ActiveCard::default().masked_number(), "************1111");

        let short = ActiveCard {
            number: "123".to_string(),
            ..Default::default()
        };
        assert_eq!(short.masked_number(), "123");
    }

    #[tokio::test]
    async fn test_note_command_tracks_counter() {
        let handle = StateHandle::new();
        handle.note_command("DEVICE", "VERSION").await;
        handle.note_command("SESSION", "START").await;

        let state = handle.get().await;
        assert_eq!(state.counter, 2);
        assert_eq!(state.last_command, "SESSION/START");
    }
}
