//! Dispatcher tests: state-machine preconditions, pairing, envelopes

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast, mpsc};

use super::config::PedConfig;
use super::dispatcher::Dispatcher;
use crate::actor::ActorLink;
use crate::error::PedError;
use crate::protocol::crypto::{AesCbcCipher, PosPrivateKey};
use crate::protocol::envelope::{Document, parse};
use crate::protocol::pairing::{CredentialStore, MemoryStore, PairingCredentials};
use crate::state::StateHandle;

struct Harness {
    dispatcher: Dispatcher,
    state: StateHandle,
    actor: Arc<ActorLink>,
    actor_rx: mpsc::Receiver<Value>,
    credentials: Arc<RwLock<PairingCredentials>>,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    harness_with_config(PedConfig::default())
}

fn harness_with_config(config: PedConfig) -> Harness {
    let state = StateHandle::new();
    let credentials = Arc::new(RwLock::new(PairingCredentials::default()));
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn CredentialStore> = store.clone();
    let (actor, actor_rx) = ActorLink::new(16);
    let (event_tx, _) = broadcast::channel(16);

    let dispatcher = Dispatcher::new(
        config,
        state.clone(),
        credentials.clone(),
        dyn_store,
        actor.clone(),
        event_tx,
    );

    Harness {
        dispatcher,
        state,
        actor,
        actor_rx,
        credentials,
        store,
    }
}

fn doc(xml: &str) -> Document {
    parse(xml.as_bytes()).unwrap()
}

fn transaction(function_type: &str, command: &str) -> Document {
    doc(&format!(
        "<TRANSACTION><FUNCTION_TYPE>{function_type}</FUNCTION_TYPE>\
         <COMMAND>{command}</COMMAND></TRANSACTION>"
    ))
}

/// Answer every outbound frame: pairing frames get the code from the
/// prompt (optionally mangled), payment frames get a fixed card.
fn script_actor(link: &Arc<ActorLink>, mut rx: mpsc::Receiver<Value>, mangle_code: bool) {
    link.connect();
    let link = link.clone();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Some(id) = frame["id"].as_str().map(str::to_string) else {
                continue; // fire-and-forget notification
            };
            let answer = match frame["type"].as_str() {
                Some("pair") => {
                    let message = frame["message"].as_str().unwrap_or("");
                    let code = message.rsplit(' ').next().unwrap_or("").to_string();
                    // Mangled entry is non-hex so it can never match a real code
                    let entered = if mangle_code { "ZZZZ".to_string() } else { code };
                    json!({"id": id, "data": entered})
                }
                Some("payment") => json!({
                    "id": id,
                    "data": {
                        "cardNumber": "tok_4111",
                        "expiry": "12/30",
                        "value": frame["data"].as_str().unwrap_or("0.00"),
                    }
                }),
                _ => continue,
            };
            link.resolve(&id, answer).await;
        }
    });
}

#[tokio::test]
async fn test_device_version() {
    let h = harness();
    let response = h
        .dispatcher
        .handle(&transaction("DEVICE", "VERSION"))
        .await
        .unwrap();

    assert!(response.contains("<RESPONSE_TEXT>Version Information Captured</RESPONSE_TEXT>"));
    assert!(response.contains("<RESULT>OK</RESULT>"));
    assert!(response.contains("RDI Simulator"));
}

#[tokio::test]
async fn test_device_get_parm_echoes_known_keys() {
    let h = harness();
    let request = doc(
        "<TRANSACTION><FUNCTION_TYPE>DEVICE</FUNCTION_TYPE><COMMAND>GET_PARM</COMMAND>\
         <PARAM>transactionfloorlimit|bogus|dayslimit</PARAM></TRANSACTION>",
    );
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<PARAM>transactionfloorlimit=30|dayslimit=1</PARAM>"));
}

#[tokio::test]
async fn test_session_round_trip() {
    let h = harness();

    let started = h
        .dispatcher
        .handle(&transaction("SESSION", "START"))
        .await
        .unwrap();
    assert!(started.contains("<RESPONSE_TEXT>Session Started</RESPONSE_TEXT>"));
    assert!(h.state.get().await.session_open);

    let finished = h
        .dispatcher
        .handle(&transaction("SESSION", "FINISH"))
        .await
        .unwrap();
    assert!(finished.contains("<RESPONSE_TEXT>Session Finished</RESPONSE_TEXT>"));
    assert!(!h.state.get().await.session_open);
}

#[tokio::test]
async fn test_double_start_is_busy_not_second_session() {
    let h = harness();

    h.dispatcher
        .handle(&transaction("SESSION", "START"))
        .await
        .unwrap();
    let second = h
        .dispatcher
        .handle(&transaction("SESSION", "START"))
        .await
        .unwrap();

    assert!(second.contains("<RESULT_CODE>59003</RESULT_CODE>"));
    assert!(second.contains("<RESULT>BUSY</RESULT>"));
    assert!(h.state.get().await.session_open);
}

#[tokio::test]
async fn test_finish_without_session() {
    let h = harness();
    let response = h
        .dispatcher
        .handle(&transaction("SESSION", "FINISH"))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>59004</RESULT_CODE>"));
    assert!(response.contains("<RESULT>FAILED</RESULT>"));
}

#[tokio::test]
async fn test_capture_while_busy_skips_actor() {
    let mut h = harness();
    h.actor.connect();
    h.state.update(|s| s.device_busy = true).await;

    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "CAPTURE"))
        .await
        .unwrap();

    assert!(response.contains("<RESULT_CODE>59002</RESULT_CODE>"));
    // No confirmation request may have gone out.
    assert!(h.actor_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_capture_cancelled_and_declined() {
    let h = harness();
    h.state.update(|s| s.user_cancel = true).await;
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "CAPTURE"))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>59001</RESULT_CODE>"));

    h.state
        .update(|s| {
            s.user_cancel = false;
            s.approval_mode = false;
        })
        .await;
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "CREDIT"))
        .await
        .unwrap();
    assert!(response.contains("<HOST_RESPCODE>116</HOST_RESPCODE>"));
}

#[tokio::test]
async fn test_capture_approved_via_actor() {
    let h = harness();
    script_actor(&h.actor, h.actor_rx, false);

    let request = doc(
        "<TRANSACTION><FUNCTION_TYPE>PAYMENT</FUNCTION_TYPE><COMMAND>CAPTURE</COMMAND>\
         <TRANS_AMOUNT>25.00</TRANS_AMOUNT></TRANSACTION>",
    );
    let response = h.dispatcher.handle(&request).await.unwrap();

    assert!(response.contains("<RESULT>APPROVED</RESULT>"));
    assert!(response.contains("<CARD_TOKEN>tok_4111</CARD_TOKEN>"));
    assert!(response.contains("<APPROVED_AMOUNT>25.00</APPROVED_AMOUNT>"));
    assert!(response.contains("<CARD_EXP_MONTH>12</CARD_EXP_MONTH>"));

    let last = h.state.get().await.last_payment;
    assert_eq!(last.amount, "25.00");
}

#[tokio::test]
async fn test_capture_fails_when_actor_disconnected() {
    let h = harness();
    // Actor never connected: the exchange must fail, not hang.
    let err = h
        .dispatcher
        .handle(&transaction("PAYMENT", "CAPTURE"))
        .await
        .unwrap_err();
    assert!(matches!(err, PedError::Bridge(_)));
}

#[tokio::test]
async fn test_gift_lifecycle() {
    let h = harness();

    // Empty card declines a purchase
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "GIFT"))
        .await
        .unwrap();
    assert!(response.contains("<RESPONSE_TEXT>INSUFFICIENT FUNDS</RESPONSE_TEXT>"));
    assert!(response.contains("<RESULT_CODE>100</RESULT_CODE>"));

    // Activate with 50.00
    let request = doc(
        "<TRANSACTION><FUNCTION_TYPE>PAYMENT</FUNCTION_TYPE><COMMAND>ACTIVATE</COMMAND>\
         <TRANS_AMOUNT>50.00</TRANS_AMOUNT></TRANSACTION>",
    );
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<AVAILABLE_BALANCE>50.00</AVAILABLE_BALANCE>"));

    // Purchase deducts the fixed amount
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "GIFT"))
        .await
        .unwrap();
    assert!(response.contains("<GIFT_BALANCE>40.00</GIFT_BALANCE>"));

    // Balance reads without mutating
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "BALANCE"))
        .await
        .unwrap();
    assert!(response.contains("<AVAILABLE_BALANCE>40.00</AVAILABLE_BALANCE>"));

    // Void reverses the gift purchase
    let response = h
        .dispatcher
        .handle(&transaction("PAYMENT", "VOID"))
        .await
        .unwrap();
    assert!(response.contains("<PAYMENT_TYPE>GIFT</PAYMENT_TYPE>"));
    assert!(response.contains("<RESULT>VOIDED</RESULT>"));
}

#[tokio::test]
async fn test_add_value_accumulates() {
    let h = harness();
    let request = doc(
        "<TRANSACTION><FUNCTION_TYPE>PAYMENT</FUNCTION_TYPE><COMMAND>ADD_VALUE</COMMAND>\
         <TRANS_AMOUNT>15.50</TRANS_AMOUNT></TRANSACTION>",
    );
    h.dispatcher.handle(&request).await.unwrap();
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<AVAILABLE_BALANCE>31.00</AVAILABLE_BALANCE>"));
}

#[tokio::test]
async fn test_unknown_function_type_and_command() {
    let h = harness();
    let response = h
        .dispatcher
        .handle(&transaction("NONSENSE", "NOPE"))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>0</RESULT_CODE>"));
    assert!(response.contains("Unknown Command or error"));

    let response = h
        .dispatcher
        .handle(&transaction("ADMIN", "NOT_A_THING"))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>0</RESULT_CODE>"));
}

#[tokio::test]
async fn test_security_test_mac_depends_on_session() {
    let h = harness();

    let response = h
        .dispatcher
        .handle(&transaction("SECURITY", "TEST_MAC"))
        .await
        .unwrap();
    assert!(response.contains("<RESPONSE_TEXT>Match</RESPONSE_TEXT>"));

    h.state.update(|s| s.session_open = true).await;
    let response = h
        .dispatcher
        .handle(&transaction("SECURITY", "TEST_MAC"))
        .await
        .unwrap();
    assert!(response.contains("<RESPONSE_TEXT>Session in progress</RESPONSE_TEXT>"));
    assert!(response.contains("<RESULT_CODE>59003</RESULT_CODE>"));
}

#[tokio::test]
async fn test_lane_close_alias() {
    let h = harness();
    let request = doc("<REQUEST><COMMAND>LANE_CLOSE</COMMAND></REQUEST>");
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<RESPONSE_TEXT>Lane Closed</RESPONSE_TEXT>"));
    assert!(response.contains("<COUNTER>12104</COUNTER>"));
}

#[tokio::test]
async fn test_admin_documents() {
    let h = harness();

    let response = h
        .dispatcher
        .handle(&transaction("ADMIN", "SETTIME"))
        .await
        .unwrap();
    assert!(response.contains("<COUNTER>12099</COUNTER>"));
    assert!(response.contains("<TIME>"));

    let response = h
        .dispatcher
        .handle(&transaction("ADMIN", "APPLYUPDATES"))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>59052</RESULT_CODE>"));

    let response = h
        .dispatcher
        .handle(&transaction("ADMIN", "GET_COUNTER"))
        .await
        .unwrap();
    assert!(response.contains("<TRANSACTION_COUNTER>12345</TRANSACTION_COUNTER>"));
    assert!(response.contains("<BATCH_NUMBER>67</BATCH_NUMBER>"));

    let response = h
        .dispatcher
        .handle(&transaction("SAF", "QUERY"))
        .await
        .unwrap();
    assert!(response.contains("<RECORD_COUNT>0</RECORD_COUNT>"));
}

#[tokio::test]
async fn test_lane_closed_pushes_display_text() {
    let mut h = harness();
    h.actor.connect();

    let request = doc(
        "<TRANSACTION><FUNCTION_TYPE>ADMIN</FUNCTION_TYPE><COMMAND>LANE_CLOSED</COMMAND>\
         <DISPLAY_TEXT>Closed for cleaning</DISPLAY_TEXT></TRANSACTION>",
    );
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<RESPONSE_TEXT>Lane Closed</RESPONSE_TEXT>"));

    let frame = h.actor_rx.try_recv().unwrap();
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["message"], "Closed for cleaning");
}

#[tokio::test]
async fn test_pairing_success_changes_persisted_key() {
    let h = harness();
    script_actor(&h.actor, h.actor_rx, false);

    let pos = PosPrivateKey::generate().unwrap();
    let request = doc(&format!(
        "<TRANSACTION><COMMAND>REGISTER_ENCRYPTION</COMMAND><KEY>{}</KEY></TRANSACTION>",
        pos.public_key_base64_der().unwrap()
    ));

    let before = h.credentials.read().await.clone();
    assert!(!before.is_paired());

    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<RESPONSE_TEXT>REGISTERED</RESPONSE_TEXT>"));
    assert!(response.contains("<MAC_LABEL>PED_SIM</MAC_LABEL>"));

    let after = h.credentials.read().await.clone();
    assert!(after.is_paired());
    assert_eq!(after.mac_key.len(), 16);
    assert_ne!(after.mac_key, before.mac_key);

    // Persisted synchronously before the response was rendered
    assert_eq!(h.store.load().await.unwrap(), after);

    // The wrapped TERMINAL_KEY unwraps to the stored key on the POS side
    let terminal_key = response
        .split("<TERMINAL_KEY>")
        .nth(1)
        .and_then(|s| s.split("</TERMINAL_KEY>").next())
        .unwrap();
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    let wrapped = STANDARD.decode(terminal_key).unwrap();
    assert_eq!(pos.decrypt_pkcs1(&wrapped).unwrap(), after.mac_key);
}

#[tokio::test]
async fn test_pairing_repeats_same_code() {
    // The derived code is a pure function of the key: run two handshakes
    // with the same key and observe identical prompts.
    let pos = PosPrivateKey::generate().unwrap();
    let request_xml = format!(
        "<TRANSACTION><COMMAND>REGISTER_ENCRYPTION</COMMAND><KEY>{}</KEY></TRANSACTION>",
        pos.public_key_base64_der().unwrap()
    );

    let mut codes = Vec::new();
    for _ in 0..2 {
        let mut h = harness();
        h.actor.connect();
        let request = doc(&request_xml);

        let dispatcher = h.dispatcher;
        let handle = tokio::spawn(async move { dispatcher.handle(&request).await });
        let frame = h.actor_rx.recv().await.unwrap();
        let message = frame["message"].as_str().unwrap().to_string();
        codes.push(message.rsplit(' ').next().unwrap().to_string());

        // Abort the exchange; only the prompt matters here.
        h.actor.disconnect().await;
        let _ = handle.await.unwrap();
    }

    assert_eq!(codes[0], codes[1]);
    assert_eq!(codes[0].len(), 4);
}

#[tokio::test]
async fn test_pairing_mismatch_leaves_credentials_untouched() {
    let h = harness();
    script_actor(&h.actor, h.actor_rx, true);

    let pos = PosPrivateKey::generate().unwrap();
    let request = doc(&format!(
        "<TRANSACTION><COMMAND>REGISTER_ENCRYPTION</COMMAND><KEY>{}</KEY></TRANSACTION>",
        pos.public_key_base64_der().unwrap()
    ));

    let response = h.dispatcher.handle(&request).await.unwrap();
    assert_eq!(response, "<RESPONSE><RESULT>BAD XML</RESULT></RESPONSE>");
    assert!(!h.credentials.read().await.is_paired());
    assert_eq!(
        h.store.load().await.unwrap(),
        PairingCredentials::default()
    );
}

#[tokio::test]
async fn test_pairing_rejects_missing_and_garbage_keys() {
    let h = harness();

    let response = h
        .dispatcher
        .handle(&doc(
            "<TRANSACTION><COMMAND>REGISTER_ENCRYPTION</COMMAND></TRANSACTION>",
        ))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>59012</RESULT_CODE>"));

    let response = h
        .dispatcher
        .handle(&doc(
            "<TRANSACTION><COMMAND>REGISTER_ENCRYPTION</COMMAND>\
             <KEY>aGVsbG8gd29ybGQ=</KEY></TRANSACTION>",
        ))
        .await
        .unwrap();
    assert!(response.contains("<RESULT_CODE>59013</RESULT_CODE>"));
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let h = harness();
    {
        let mut creds = h.credentials.write().await;
        creds.mac_key = vec![7; 16];
        creds.mac_label = "PED_SIM".to_string();
        creds.pairing_code = "AB12".to_string();
    }

    let request = doc("<TRANSACTION><COMMAND>UNREGISTER</COMMAND></TRANSACTION>");
    let first = h.dispatcher.handle(&request).await.unwrap();
    assert!(first.contains("<RESPONSE_TEXT>UNREGISTERED</RESPONSE_TEXT>"));
    assert!(!h.credentials.read().await.is_paired());

    let second = h.dispatcher.handle(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        h.store.load().await.unwrap(),
        PairingCredentials::default()
    );
}

#[tokio::test]
async fn test_encrypted_envelope_round_trip() {
    let h = harness();
    let key = vec![0x42u8; 16];
    h.credentials.write().await.mac_key = key.clone();

    let iv = [0x24u8; 16];
    let cipher = AesCbcCipher::new(&key).unwrap();
    let payload = cipher
        .encrypt_base64(
            b"<TRANSACTION><FUNCTION_TYPE>DEVICE</FUNCTION_TYPE>\
              <COMMAND>VERSION</COMMAND></TRANSACTION>",
            &iv,
        )
        .unwrap();

    let request = doc(&format!(
        "<ETRANSACTION><PAYLOAD>{payload}</PAYLOAD><IV>{}</IV></ETRANSACTION>",
        hex::encode(iv)
    ));
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("Version Information Captured"));
}

#[tokio::test]
async fn test_encrypted_envelope_bad_key_is_bad_xml() {
    let h = harness();
    h.credentials.write().await.mac_key = vec![0x42u8; 16];

    let iv = [0u8; 16];
    let wrong = AesCbcCipher::new(&[9u8; 16]).unwrap();
    let payload = wrong.encrypt_base64(b"<TRANSACTION/>", &iv).unwrap();

    let request = doc(&format!(
        "<ETRANSACTION><PAYLOAD>{payload}</PAYLOAD><IV>{}</IV></ETRANSACTION>",
        hex::encode(iv)
    ));
    let response = h.dispatcher.handle(&request).await.unwrap();
    assert!(response.contains("<RESULT_CODE>-2</RESULT_CODE>"));
    assert!(response.contains("<RESULT>BAD XML</RESULT>"));
}
