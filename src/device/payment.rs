//! Payment response documents
//!
//! Pure builders: the dispatcher runs the state machine and the actor
//! exchange, these render the approved documents with the vendor's fixed
//! merchant/terminal fields.

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::envelope::ResponseBuilder;
use crate::state::{ActiveCard, LastPaymentRecord, PaymentMethod};

/// Fixed price of a gift purchase on the simulated terminal
pub const GIFT_PURCHASE_AMOUNT: f64 = 10.0;

/// Fields the interactive actor supplies when confirming a payment
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentAnswer {
    /// Card token echoed as CARD_TOKEN
    #[serde(rename = "cardNumber")]
    pub card_number: String,
    /// Expiry as `MM/YY`
    pub expiry: String,
    /// Approved amount
    pub value: String,
}

impl PaymentAnswer {
    /// Extract the answer payload from a bridge reply frame
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the `data` field is missing
    /// or malformed.
    pub fn from_reply(reply: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(reply.get("data").cloned().unwrap_or(Value::Null))
    }

    fn expiry_parts(&self) -> (&str, &str) {
        self.expiry.split_once('/').unwrap_or((self.expiry.as_str(), ""))
    }
}

/// Current wall clock as the wire renders it: (`yyyy.mm.dd`, `hh:mm:ss`)
#[must_use]
pub fn wall_clock() -> (String, String) {
    let now = chrono::Local::now();
    (
        now.format("%Y.%m.%d").to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

/// Approved CAPTURE/CREDIT document
#[must_use]
pub fn capture_approved(answer: &PaymentAnswer, card: &ActiveCard, date: &str, time: &str) -> String {
    let (exp_month, exp_year) = answer.expiry_parts();

    ResponseBuilder::new()
        .standard("APPROVED", "APPROVED", "5", "SUCCESS")
        .field("HOST_RESPCODE", "000")
        .field("COUNTER", "12052")
        .field("TRANS_SEQ_NUM", "000108")
        .field("INTRN_SEQ_NUM", "000108")
        .field("AUTH_CODE", "OK9841")
        .field("TROUTD", "000108")
        .field("CTROUTD", "74")
        .field("PAYMENT_TYPE", "CREDIT")
        .field("CARD_TOKEN", &answer.card_number)
        .field("MERCHID", "9165")
        .field("TERMID", "06")
        .field("LANE", "01")
        .field("TRANS_DATE", date)
        .field("TRANS_TIME", time)
        .field("APPROVED_AMOUNT", &answer.value)
        .field("PAYMENT_MEDIA", &card.scheme)
        .field("ACCT_NUM", card.masked_number())
        .field("CARD_EXP_MONTH", exp_month)
        .field("CARD_EXP_YEAR", exp_year)
        .field("CARD_ENTRY_MODE", "Swiped")
        .field("PINLESSDEBIT", "C")
        .render()
}

/// Approved gift purchase, carrying the remaining balance
#[must_use]
pub fn gift_purchase_approved(balance: f64) -> String {
    ResponseBuilder::new()
        .standard("GIFT APPROVED", "APPROVED", "5", "SUCCESS")
        .field("GIFT_BALANCE", format!("{balance:.2}"))
        .render()
}

/// Gift account documents for ACTIVATE / ADD_VALUE / BALANCE / GIFT_CLOSE
///
/// The commands share one shape; counter and sequence fields are fixed per
/// command, amounts vary with the account.
#[must_use]
pub fn gift_account_doc(
    command: &str,
    amount: f64,
    balance: f64,
    account: &str,
    date: &str,
    time: &str,
) -> String {
    let (counter, seq, auth, ctroutd) = match command {
        "ACTIVATE" => ("13671", "000478", "000500", "297"),
        "ADD_VALUE" => ("13709", "000486", "010500", "303"),
        "BALANCE" => ("13685", "000483", "000500", "300"),
        _ => ("13769", "000497", "000000", "314"), // GIFT_CLOSE
    };

    let (approved, available) = match command {
        "ACTIVATE" | "ADD_VALUE" => (format!("{amount:.2}"), format!("{balance:.2}")),
        "BALANCE" => ("0.00".to_string(), format!("{balance:.2}")),
        _ => ("0.00".to_string(), "0.00".to_string()),
    };

    ResponseBuilder::new()
        .standard("APPROVED", "APPROVED", "5", "SUCCESS")
        .field("HOST_RESPCODE", "000")
        .field("COUNTER", counter)
        .field("TRANS_SEQ_NUM", seq)
        .field("INTRN_SEQ_NUM", seq)
        .field("AUTH_CODE", auth)
        .field("TROUTD", seq)
        .field("CTROUTD", ctroutd)
        .field("PAYMENT_TYPE", "GIFT")
        .field("MERCHID", "9165")
        .field("TERMID", "06")
        .field("LANE", "01")
        .field("TRANS_DATE", date)
        .field("TRANS_TIME", time)
        .field("APPROVED_AMOUNT", approved)
        .field("AVAILABLE_BALANCE", available)
        .field("PAYMENT_MEDIA", "GIFT")
        .field("ACCT_NUM", account)
        .field("CARDHOLDER", "*********")
        .field("EMBOSSED_ACCT_NUM", "****************")
        .field("CARD_EXP_MONTH", "01")
        .field("CARD_EXP_YEAR", "00")
        .field("CARD_ENTRY_MODE", "Swiped")
        .render()
}

/// VOID document reversing the last recorded payment
#[must_use]
pub fn void_approved(last: &LastPaymentRecord, card: &ActiveCard, date: &str, time: &str) -> String {
    let payment_type = match last.method {
        PaymentMethod::CreditCard => "CREDIT",
        PaymentMethod::GiftCard => "GIFT",
    };

    ResponseBuilder::new()
        .standard("APPROVED", "VOIDED", "7", "SUCCESS")
        .field("HOST_RESPCODE", "000")
        .field("COUNTER", "13796")
        .field("TRANS_SEQ_NUM", "000504")
        .field("INTRN_SEQ_NUM", "000504")
        .field("AUTH_CODE", "000500")
        .field("TROUTD", "000504")
        .field("CTROUTD", "319")
        .field("PAYMENT_TYPE", payment_type)
        .field("BANK_USERDATA", "011/00/04/PPayCL/")
        .field("MERCHID", "9165")
        .field("TERMID", "06")
        .field("LANE", "01")
        .field("TRANS_DATE", date)
        .field("TRANS_TIME", time)
        .field("APPROVED_AMOUNT", &last.amount)
        .field("EMBOSSED_ACCT_NUM", card.masked_number())
        .render()
}
