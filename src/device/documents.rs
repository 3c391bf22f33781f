//! Protocol-exact response documents
//!
//! Result codes, counters, and field order are vendor-fixed; integration
//! suites on the POS side compare against these byte-for-byte.

use crate::protocol::envelope::ResponseBuilder;

/// Answer for any fault that reaches the transport boundary
#[must_use]
pub fn xml_format_incorrect() -> String {
    ResponseBuilder::new()
        .field("TERMINATION_STATUS", "FAILURE")
        .field("RESULT_CODE", "-2")
        .field("RESULT", "XML Format Incorrect")
        .field("RESPONSE_TEXT", "")
        .render()
}

/// Undecryptable or unparsable inner payload
#[must_use]
pub fn bad_xml() -> String {
    ResponseBuilder::new()
        .field("TERMINATION_STATUS", "FAILURE")
        .field("RESULT_CODE", "-2")
        .field("RESULT", "BAD XML")
        .field("RESPONSE_TEXT", "")
        .render()
}

/// Generic pairing rejection (vendor parity: reuses the bad-XML shape)
#[must_use]
pub fn pairing_rejected() -> String {
    ResponseBuilder::new().field("RESULT", "BAD XML").render()
}

/// Unrecognized (function-type, command) pair
#[must_use]
pub fn unknown_command() -> String {
    ResponseBuilder::new()
        .field("TERMINATION_STATUS", "FAILURE")
        .field("RESULT_CODE", "0")
        .field("RESULT", "Unknown Command or error")
        .field("RESPONSE_TEXT", "")
        .render()
}

/// PAYMENT command while the device is busy
#[must_use]
pub fn device_busy() -> String {
    ResponseBuilder::new()
        .standard("DEVICE IS BUSY", "BUSY", "59002", "FAILURE")
        .field("COUNTER", "13169")
        .render()
}

/// Customer pressed cancel on the device
#[must_use]
pub fn cancelled_by_customer() -> String {
    ResponseBuilder::new()
        .standard("Cancelled by CUSTOMER", "CANCELLED", "59001", "FAILURE")
        .field("COUNTER", "1024")
        .render()
}

/// Host decline while approval mode is off
#[must_use]
pub fn decline() -> String {
    ResponseBuilder::new()
        .standard("DECLINE", "Error", "6", "SUCCESS")
        .field("HOST_RESPCODE", "116")
        .field("COUNTER", "5643")
        .render()
}

/// REGISTER_ENCRYPTION without a key
#[must_use]
pub fn no_public_key() -> String {
    ResponseBuilder::new()
        .standard("NO PUBLIC KEY", "ERROR", "59012", "FAILURE")
        .field("COUNTER", "10002")
        .render()
}

/// REGISTER_ENCRYPTION with an undecodable key
#[must_use]
pub fn bad_public_key() -> String {
    ResponseBuilder::new()
        .standard("BAD PUBLIC KEY", "ERROR", "59013", "FAILURE")
        .field("COUNTER", "10002")
        .render()
}

/// Successful pairing, carrying both wrapped secrets
#[must_use]
pub fn registered(terminal_key_b64: &str, mac_label: &str, entry_code_b64: &str) -> String {
    ResponseBuilder::new()
        .standard("REGISTERED", "OK", "-1", "SUCCESS")
        .field("TERMINAL_KEY", terminal_key_b64)
        .field("MAC_LABEL", mac_label)
        .field("ENTRY_CODE", entry_code_b64)
        .render()
}

/// UNREGISTER acknowledgement (same document whether or not paired)
#[must_use]
pub fn unregistered() -> String {
    ResponseBuilder::new()
        .standard("UNREGISTERED", "OK", "-1", "SUCCESS")
        .field("COUNTER", "10003")
        .render()
}

/// SESSION/START opened a session
#[must_use]
pub fn session_started() -> String {
    ResponseBuilder::new()
        .standard("Session Started", "OK", "-1", "SUCCESS")
        .field("COUNTER", "13239")
        .render()
}

/// SESSION/START while a session is already open
#[must_use]
pub fn session_in_progress() -> String {
    ResponseBuilder::new()
        .standard("SESSION in progress", "BUSY", "59003", "FAILURE")
        .field("COUNTER", "13240")
        .render()
}

/// SESSION/FINISH closed the session
#[must_use]
pub fn session_finished() -> String {
    ResponseBuilder::new()
        .standard("Session Finished", "OK", "-1", "SUCCESS")
        .field("COUNTER", "13241")
        .render()
}

/// SESSION/FINISH with no session open
#[must_use]
pub fn no_session() -> String {
    ResponseBuilder::new()
        .standard("No Session", "FAILED", "59004", "FAILURE")
        .field("COUNTER", "13241")
        .render()
}

/// Lane-closed acknowledgement (ADMIN and bare-request alias)
#[must_use]
pub fn lane_closed() -> String {
    ResponseBuilder::new()
        .standard("Lane Closed", "OK", "-1", "SUCCESS")
        .field("COUNTER", "12104")
        .render()
}

/// ADMIN/APPLYUPDATES: the terminal never has updates staged
#[must_use]
pub fn no_updates_to_apply() -> String {
    ResponseBuilder::new()
        .standard(
            "No Updates Available on Terminal to Apply",
            "ERROR",
            "59052",
            "FAILURE",
        )
        .field("COUNTER", "1")
        .render()
}

/// ADMIN/GET_COUNTER fixed counters
#[must_use]
pub fn counter_retrieved() -> String {
    ResponseBuilder::new()
        .standard("Counter Retrieved", "OK", "-1", "SUCCESS")
        .field("COUNTER", "12100")
        .field("TRANSACTION_COUNTER", "12345")
        .field("BATCH_NUMBER", "67")
        .render()
}

/// SAF/QUERY: store-and-forward is stubbed empty
#[must_use]
pub fn saf_query() -> String {
    ResponseBuilder::new()
        .standard("0 SAF RECORDS FOUND", "OK", "-1", "SUCCESS")
        .field("COUNTER", "1971")
        .field("RECORD_COUNT", "0")
        .field("TOTAL_AMOUNT", "0.00")
        .field("RECORDS", "")
        .render()
}

/// SECURITY/TEST_MAC outside a session
#[must_use]
pub fn test_mac_match() -> String {
    ResponseBuilder::new()
        .standard("Match", "OK", "-1", "SUCCESS")
        .field("COUNTER", "13154")
        .render()
}

/// SECURITY/TEST_MAC while a session is open
#[must_use]
pub fn test_mac_session_in_progress() -> String {
    ResponseBuilder::new()
        .standard("Session in progress", "OK", "59003", "SUCCESS")
        .field("COUNTER", "13154")
        .render()
}

/// Gift purchase against a balance below the purchase amount
#[must_use]
pub fn gift_insufficient_funds() -> String {
    ResponseBuilder::new()
        .standard("INSUFFICIENT FUNDS", "DECLINED", "100", "FAILURE")
        .render()
}
