//! Primary command dispatcher
//!
//! Routes each request by its (function-type, command) pair, enforces the
//! state-machine preconditions, and renders protocol-exact response
//! documents. Handlers never let a failure escape as anything but a
//! well-formed document; the only faults that propagate are a malformed or
//! undecryptable envelope and a failed actor exchange, both of which the
//! transport boundary answers with the fixed bad-XML document.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use super::config::{IvPolicy, PedConfig};
use super::documents;
use super::events::PedEvent;
use super::parameters::ParameterTable;
use super::payment;
use crate::actor::{ActorLink, ActorRequest, BridgeError};
use crate::error::Result;
use crate::protocol::crypto::{AesCbcCipher, PeerPublicKey, lengths};
use crate::protocol::envelope::{Document, EnvelopeError, ResponseBuilder, parse};
use crate::protocol::pairing::{self, CredentialStore, PairingCredentials};
use crate::state::{LastPaymentRecord, PaymentMethod, StateHandle};

/// Key used for the encrypted envelope before any pairing has happened
const UNPAIRED_FALLBACK_KEY: [u8; lengths::AES_128_KEY] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
];

/// Primary command processor
///
/// One instance serves every connection on the primary port. All
/// dependencies are injected: the shared state handle, the pairing
/// credentials with their store, and the actor bridge.
pub struct Dispatcher {
    config: PedConfig,
    state: StateHandle,
    credentials: Arc<RwLock<PairingCredentials>>,
    store: Arc<dyn CredentialStore>,
    actor: Arc<ActorLink>,
    parameters: ParameterTable,
    event_tx: broadcast::Sender<PedEvent>,
}

impl Dispatcher {
    /// Create a dispatcher over the given collaborators
    #[must_use]
    pub fn new(
        config: PedConfig,
        state: StateHandle,
        credentials: Arc<RwLock<PairingCredentials>>,
        store: Arc<dyn CredentialStore>,
        actor: Arc<ActorLink>,
        event_tx: broadcast::Sender<PedEvent>,
    ) -> Self {
        Self {
            config,
            state,
            credentials,
            store,
            actor,
            parameters: ParameterTable::new(),
            event_tx,
        }
    }

    /// Handle one parsed request document, returning the rendered response
    ///
    /// # Errors
    ///
    /// Returns `PedError` only for faults the transport boundary answers
    /// with the fixed bad-XML document: a failed actor exchange, a failed
    /// credential save, or a broken payment answer. Everything else —
    /// including an undecryptable encrypted envelope — comes back as
    /// `Ok(document)`.
    pub async fn handle(&self, request: &Document) -> Result<String> {
        // Encrypted envelope: decrypt, then dispatch the inner document.
        let opened;
        let request = if request.root() == "ETRANSACTION" {
            match self.open_envelope(request).await {
                Ok(inner) => {
                    opened = inner;
                    &opened
                }
                Err(e) => {
                    tracing::warn!(error = %e, "encrypted envelope rejected");
                    return Ok(documents::bad_xml());
                }
            }
        } else {
            request
        };

        // Secondary integration path sends a bare lane-close request.
        if request.root() == "REQUEST" && request.get("COMMAND") == Some("LANE_CLOSE") {
            return Ok(documents::lane_closed());
        }

        let function_type = request.get("FUNCTION_TYPE").unwrap_or("").to_string();
        let command = request.get("COMMAND").unwrap_or("").to_string();

        tracing::debug!(%function_type, %command, "dispatching");
        self.state.note_command(&function_type, &command).await;
        let _ = self.event_tx.send(PedEvent::CommandHandled {
            function_type: function_type.clone(),
            command: command.clone(),
        });

        // Security commands are recognized regardless of function-type.
        match command.as_str() {
            "REGISTER_ENCRYPTION" => return self.register_encryption(request).await,
            "UNREGISTER" => return self.unregister().await,
            _ => {}
        }

        match function_type.as_str() {
            "DEVICE" => Ok(self.handle_device(&command, request)),
            "SESSION" => Ok(self.handle_session(&command).await),
            "PAYMENT" => self.handle_payment(&command, request).await,
            "ADMIN" => Ok(self.handle_admin(&command, request).await),
            "SAF" => Ok(Self::handle_saf(&command)),
            "SECURITY" => Ok(self.handle_security(&command).await),
            _ => Ok(documents::unknown_command()),
        }
    }

    async fn open_envelope(&self, envelope: &Document) -> Result<Document> {
        let payload = envelope
            .get("PAYLOAD")
            .ok_or_else(|| EnvelopeError::Malformed("ETRANSACTION without PAYLOAD".to_string()))?;

        let iv = match self.config.iv_policy {
            IvPolicy::FixedZero => vec![0u8; lengths::AES_CBC_IV],
            IvPolicy::PeerSupplied => {
                let iv_hex = envelope.get("IV").unwrap_or("");
                hex::decode(iv_hex)
                    .map_err(|_| EnvelopeError::Malformed("IV is not hex".to_string()))?
            }
        };

        let key = {
            let creds = self.credentials.read().await;
            if creds.is_paired() {
                creds.mac_key.clone()
            } else {
                UNPAIRED_FALLBACK_KEY.to_vec()
            }
        };

        let cipher = AesCbcCipher::new(&key)?;
        let plaintext = cipher.decrypt_base64(payload, &iv)?;
        Ok(parse(&plaintext)?)
    }

    fn handle_device(&self, command: &str, request: &Document) -> String {
        match command {
            "VERSION" => ResponseBuilder::new()
                .standard("Version Information Captured", "OK", "-1", "SUCCESS")
                .field("COUNTER", "12101")
                .field("VERSION_INFO", &self.config.version_info)
                .render(),
            "GET_PARM" => {
                let param = self.parameters.resolve(request.get("PARAM").unwrap_or(""));
                ResponseBuilder::new()
                    .field("TERMINATION_STATUS", "SUCCESS")
                    .field("COUNTER", "1")
                    .field("RESULT_CODE", "-1")
                    .field("RESULT", "OK")
                    .field("PARAM", param)
                    .render()
            }
            _ => documents::unknown_command(),
        }
    }

    async fn handle_session(&self, command: &str) -> String {
        match command {
            "START" => {
                self.actor.notify(ActorRequest::StartSession).await;
                let was_open = self
                    .state
                    .update(|s| {
                        let prev = s.session_open;
                        s.session_open = true;
                        prev
                    })
                    .await;

                if was_open {
                    documents::session_in_progress()
                } else {
                    let _ = self.event_tx.send(PedEvent::SessionOpened);
                    documents::session_started()
                }
            }
            "FINISH" => {
                let was_open = self
                    .state
                    .update(|s| {
                        let prev = s.session_open;
                        s.session_open = false;
                        prev
                    })
                    .await;

                if was_open {
                    let _ = self.event_tx.send(PedEvent::SessionClosed);
                    documents::session_finished()
                } else {
                    documents::no_session()
                }
            }
            _ => documents::unknown_command(),
        }
    }

    async fn handle_admin(&self, command: &str, request: &Document) -> String {
        match command {
            "SETTIME" => {
                let time = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
                ResponseBuilder::new()
                    .standard("SUCCESS", "OK", "-1", "SUCCESS")
                    .field("COUNTER", "12099")
                    .field("TIME", time)
                    .render()
            }
            "LANE_CLOSED" => {
                let text = request.get("DISPLAY_TEXT").unwrap_or("").to_string();
                self.actor
                    .notify(ActorRequest::Message { message: text })
                    .await;
                documents::lane_closed()
            }
            "APPLYUPDATES" => documents::no_updates_to_apply(),
            "GET_COUNTER" => documents::counter_retrieved(),
            _ => documents::unknown_command(),
        }
    }

    fn handle_saf(command: &str) -> String {
        match command {
            "QUERY" => documents::saf_query(),
            _ => documents::unknown_command(),
        }
    }

    async fn handle_security(&self, command: &str) -> String {
        match command {
            "TEST_MAC" => {
                if self.state.get().await.session_open {
                    documents::test_mac_session_in_progress()
                } else {
                    documents::test_mac_match()
                }
            }
            _ => documents::unknown_command(),
        }
    }

    async fn register_encryption(&self, request: &Document) -> Result<String> {
        let key_b64 = request
            .get("PUBLIC_KEY")
            .or_else(|| request.get("KEY"))
            .unwrap_or("");
        if key_b64.is_empty() {
            return Ok(documents::no_public_key());
        }

        let Ok(peer) = PeerPublicKey::from_base64_der(key_b64) else {
            return Ok(documents::bad_public_key());
        };

        let code = pairing::pairing_code(peer.der());
        tracing::info!(%code, "pairing requested, waiting for operator");

        let answer = self
            .actor
            .send_and_wait(
                ActorRequest::Pair {
                    message: format!("PED Pairing Required. Code for POS: {code}"),
                },
                self.config.actor_timeout,
            )
            .await?;

        let entered: String = answer
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or("")
            .chars()
            .take(pairing::PAIRING_CODE_LEN)
            .collect();

        if entered != code {
            tracing::info!("pairing rejected by operator");
            self.actor
                .notify(ActorRequest::PairFailure {
                    message: "PED Pairing Failed".to_string(),
                })
                .await;
            let _ = self.event_tx.send(PedEvent::PairingFailed);
            return Ok(documents::pairing_rejected());
        }

        let outcome = pairing::complete_pairing(&peer, &self.config.entry_code)?;

        {
            let mut creds = self.credentials.write().await;
            creds.mac_key = outcome.session_key.clone();
            creds.mac_label = self.config.mac_label.clone();
            creds.pairing_code = code;
            // Persist before acknowledging: a paired POS must survive restart.
            self.store.save(&creds).await?;
        }

        self.actor
            .notify(ActorRequest::PairSuccess {
                message: "PED Paired Successfully".to_string(),
            })
            .await;
        let _ = self.event_tx.send(PedEvent::PairingSucceeded);

        Ok(documents::registered(
            &outcome.terminal_key_b64,
            &self.config.mac_label,
            &outcome.entry_code_b64,
        ))
    }

    async fn unregister(&self) -> Result<String> {
        let mut creds = self.credentials.write().await;
        creds.clear();
        self.store.save(&creds).await?;

        Ok(documents::unregistered())
    }

    async fn handle_payment(&self, command: &str, request: &Document) -> Result<String> {
        // Every payment command is gated on the busy flag.
        if self.state.get().await.device_busy {
            return Ok(documents::device_busy());
        }

        match command {
            "CAPTURE" | "CREDIT" => self.handle_capture(request).await,
            "GIFT" => Ok(self.handle_gift_purchase().await),
            "ACTIVATE" | "ADD_VALUE" | "BALANCE" | "GIFT_CLOSE" => {
                Ok(self.handle_gift_account(command, request).await)
            }
            "VOID" => Ok(self.handle_void().await),
            _ => Ok(documents::unknown_command()),
        }
    }

    async fn handle_capture(&self, request: &Document) -> Result<String> {
        let amount = request.get("TRANS_AMOUNT").unwrap_or("").to_string();

        // Remaining preconditions are checked before the actor is asked:
        // a declined or cancelled exchange must not prompt the operator.
        {
            let state = self.state.get().await;
            if state.user_cancel {
                return Ok(documents::cancelled_by_customer());
            }
            if !state.approval_mode {
                return Ok(documents::decline());
            }
        }

        let answer = self
            .actor
            .send_and_wait(
                ActorRequest::Payment {
                    data: amount.clone(),
                },
                self.config.actor_timeout,
            )
            .await?;
        let answer = payment::PaymentAnswer::from_reply(&answer)
            .map_err(|e| BridgeError::BadAnswer(e.to_string()))?;

        let (date, time) = payment::wall_clock();
        let card = self
            .state
            .update(|s| {
                s.last_payment = LastPaymentRecord {
                    amount: amount.clone(),
                    date: date.clone(),
                    method: PaymentMethod::CreditCard,
                };
                s.active_card.clone()
            })
            .await;

        Ok(payment::capture_approved(&answer, &card, &date, &time))
    }

    async fn handle_gift_purchase(&self) -> String {
        let (date, _) = payment::wall_clock();

        enum Outcome {
            Insufficient,
            Approved(f64),
        }

        let outcome = self
            .state
            .update(|s| {
                if s.gift_card.balance < payment::GIFT_PURCHASE_AMOUNT {
                    Outcome::Insufficient
                } else {
                    s.gift_card.balance -= payment::GIFT_PURCHASE_AMOUNT;
                    s.last_payment = LastPaymentRecord {
                        amount: format!("{:.2}", payment::GIFT_PURCHASE_AMOUNT),
                        date: date.clone(),
                        method: PaymentMethod::GiftCard,
                    };
                    Outcome::Approved(s.gift_card.balance)
                }
            })
            .await;

        match outcome {
            Outcome::Insufficient => documents::gift_insufficient_funds(),
            Outcome::Approved(balance) => payment::gift_purchase_approved(balance),
        }
    }

    async fn handle_gift_account(&self, command: &str, request: &Document) -> String {
        let amount = request
            .get("TRANS_AMOUNT")
            .and_then(|a| a.parse::<f64>().ok())
            .filter(|a| *a > 0.0)
            .unwrap_or(0.0);

        let (balance, account) = self
            .state
            .update(|s| {
                match command {
                    "ACTIVATE" => s.gift_card.balance = amount,
                    "ADD_VALUE" => s.gift_card.balance += amount,
                    _ => {}
                }
                (s.gift_card.balance, s.gift_card.number.clone())
            })
            .await;

        let (date, time) = payment::wall_clock();
        payment::gift_account_doc(command, amount, balance, &account, &date, &time)
    }

    async fn handle_void(&self) -> String {
        let state = self.state.get().await;
        let (date, time) = payment::wall_clock();
        payment::void_approved(&state.last_payment, &state.active_card, &date, &time)
    }
}
