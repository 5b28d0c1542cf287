//! Asynchronous payment notifications.

use std::collections::BTreeMap;

use crate::crypto::{verify_signature, SIGN_FIELD};
use crate::error::WechatError;
use crate::types::Params;
use crate::xml;

use super::WechatPay;

/// Notification fields carried as integers (amounts in fen, counts).
pub const NOTIFICATION_AMOUNT_FIELDS: [&str; 5] = [
    "total_fee",
    "settlement_total_fee",
    "cash_fee",
    "coupon_fee",
    "coupon_count",
];

/// A decoded payment result notification.
///
/// A signature mismatch is reported through
/// [`is_signature_valid`](Self::is_signature_valid), not as an error: the
/// caller decides whether to reject the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    fields: BTreeMap<String, String>,
    amounts: BTreeMap<String, i64>,
    sign: Option<String>,
    signature_valid: bool,
}

impl PaymentNotification {
    /// Raw string fields, `sign` excluded.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// One of [`NOTIFICATION_AMOUNT_FIELDS`] as an integer.
    pub fn amount(&self, key: &str) -> Option<i64> {
        self.amounts.get(key).copied()
    }

    pub fn total_fee(&self) -> Option<i64> {
        self.amount("total_fee")
    }

    pub fn cash_fee(&self) -> Option<i64> {
        self.amount("cash_fee")
    }

    pub fn out_trade_no(&self) -> Option<&str> {
        self.get("out_trade_no")
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.get("transaction_id")
    }

    pub fn sign(&self) -> Option<&str> {
        self.sign.as_deref()
    }

    pub fn is_signature_valid(&self) -> bool {
        self.signature_valid
    }

    /// Both `return_code` and `result_code` are `SUCCESS`.
    pub fn is_success(&self) -> bool {
        self.get("return_code") == Some("SUCCESS") && self.get("result_code") == Some("SUCCESS")
    }
}

impl WechatPay {
    /// Decodes and verifies a payment result notification.
    ///
    /// The signature is checked with the active signing key (the sandbox
    /// key in sandbox mode).
    ///
    /// # Errors
    /// - `WechatError::Notification` for an empty or malformed document, or
    ///   a non-integer amount field
    /// - errors from fetching the sandbox key
    pub async fn parse_payment_notification(
        &self,
        body: &[u8],
    ) -> Result<PaymentNotification, WechatError> {
        let key = self.signing_key().await?;
        parse_notification(body, &key)
    }
}

pub(crate) fn parse_notification(body: &[u8], key: &str) -> Result<PaymentNotification, WechatError> {
    let mut fields = xml::decode(body);
    if fields.is_empty() {
        return Err(WechatError::Notification(
            "empty or malformed document".to_string(),
        ));
    }

    let signature_valid = verify_signature(&fields, key);
    let sign = fields.remove(SIGN_FIELD);
    if !signature_valid {
        log::warn!(
            "payment notification signature mismatch for out_trade_no {:?}",
            fields.get("out_trade_no")
        );
    }

    let mut amounts = BTreeMap::new();
    for name in NOTIFICATION_AMOUNT_FIELDS {
        if let Some(value) = fields.get(name) {
            let amount = value.trim().parse::<i64>().map_err(|_| {
                WechatError::Notification(format!("{name} is not an integer: {value:?}"))
            })?;
            amounts.insert(name.to_string(), amount);
        }
    }

    Ok(PaymentNotification {
        fields,
        amounts,
        sign,
        signature_valid,
    })
}

/// The XML acknowledgement a notification handler answers with.
///
/// `msg` is omitted when empty.
pub fn notification_reply(success: bool, msg: &str) -> String {
    let params = Params::new()
        .with("return_code", if success { "SUCCESS" } else { "FAIL" })
        .with("return_msg", msg);
    xml::encode(&params)
}
