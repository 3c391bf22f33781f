//! Correlation bridge to the interactive actor
//!
//! Commands that need a human decision (confirm a payment, enter a pairing
//! code) send a JSON frame out on this bridge and suspend until a reply
//! carrying the same correlation ID arrives on the inbound path. The
//! pending-exchange table has exactly one owner: this module. A parked
//! continuation is referenced from nowhere else and is consumed by the
//! first matching answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, oneshot};

/// Bridge failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Actor channel was not open, or closed while waiting
    #[error("actor channel disconnected")]
    Disconnected,

    /// No answer arrived within the configured window
    #[error("actor answer timed out")]
    TimedOut,

    /// Answer arrived but did not carry the expected fields
    #[error("malformed actor answer: {0}")]
    BadAnswer(String),
}

/// Outbound request frames
///
/// Serialized as `{"type": ..., ...}`; `send_and_wait` adds the `id` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRequest {
    /// Show a pairing code and ask for the operator's 4-character entry
    Pair {
        /// Prompt text carrying the code
        message: String,
    },
    /// Ask for payment confirmation; answers with card token/expiry/amount
    Payment {
        /// Requested amount as it appeared on the wire
        data: String,
    },
    /// A POS session opened
    StartSession,
    /// Free-form display line (lane closed etc.)
    Message {
        /// Text to display
        message: String,
    },
    /// Pairing completed
    PairSuccess {
        /// Status text
        message: String,
    },
    /// Pairing rejected
    PairFailure {
        /// Status text
        message: String,
    },
}

impl ActorRequest {
    fn to_frame(&self) -> Value {
        match self {
            Self::Pair { message } => json!({"type": "pair", "message": message}),
            Self::Payment { data } => json!({"type": "payment", "data": data}),
            Self::StartSession => json!({"type": "start_session"}),
            Self::Message { message } => json!({"type": "message", "message": message}),
            Self::PairSuccess { message } => json!({"type": "pair_success", "message": message}),
            Self::PairFailure { message } => json!({"type": "pair_failure", "message": message}),
        }
    }
}

/// Handle to the actor channel
///
/// The transport that actually carries frames (a websocket, a test task) is
/// the embedder's concern: it drains the receiver returned by [`new`],
/// feeds replies back through [`resolve`], and flips the connected flag as
/// its link comes and goes.
///
/// [`new`]: ActorLink::new
/// [`resolve`]: ActorLink::resolve
pub struct ActorLink {
    outbound: mpsc::Sender<Value>,
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    connected: AtomicBool,
}

impl ActorLink {
    /// Create a link and the outbound frame stream for the transport
    #[must_use]
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(buffer);
        let link = Arc::new(Self {
            outbound: tx,
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
        });
        (link, rx)
    }

    /// Mark the transport as attached
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Whether the transport is currently attached
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Mark the transport as detached and fail every parked exchange
    ///
    /// Waiters resolve with [`BridgeError::Disconnected`]; none retry.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }

    /// Fire-and-forget notification; dropped when no transport is attached
    pub async fn notify(&self, request: ActorRequest) {
        if !self.is_connected() {
            tracing::debug!(?request, "actor notification dropped, channel closed");
            return;
        }
        if self.outbound.send(request.to_frame()).await.is_err() {
            tracing::debug!("actor notification dropped, outbound stream gone");
        }
    }

    /// Send a request and suspend until the matching answer arrives
    ///
    /// Suspends only the calling command; other connections keep being
    /// serviced. Answers correlate strictly by ID, never by arrival order.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` immediately if no transport is attached (no
    /// entry is registered), or once the channel drops a parked exchange.
    /// Returns `TimedOut` when a timeout is configured and expires.
    pub async fn send_and_wait(
        &self,
        request: ActorRequest,
        timeout: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::Disconnected);
        }

        let id = next_correlation_id();
        let mut frame = request.to_frame();
        frame["id"] = json!(id);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.outbound.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::Disconnected);
        }

        let answer = match timeout {
            Some(window) => match tokio::time::timeout(window, rx).await {
                Ok(result) => result,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    return Err(BridgeError::TimedOut);
                }
            },
            None => rx.await,
        };

        answer.map_err(|_| BridgeError::Disconnected)
    }

    /// Deliver an inbound answer; returns whether an exchange was waiting
    ///
    /// The entry is consumed: a second answer with the same ID finds
    /// nothing.
    pub async fn resolve(&self, id: &str, answer: Value) -> bool {
        let Some(tx) = self.pending.lock().await.remove(id) else {
            tracing::warn!(id, "actor answer matched no pending exchange");
            return false;
        };
        tx.send(answer).is_ok()
    }

    /// Number of exchanges currently parked
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Correlation IDs are unique, not unpredictable
fn next_correlation_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("msg-{millis}-{:08x}", rand::random::<u32>())
}
