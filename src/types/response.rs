//! Provider response envelopes.
//!
//! Both channels wrap every answer in an envelope that carries the
//! application-level outcome independently of the HTTP status:
//!
//! - message channel: a JSON object with `errcode` / `errmsg`
//! - payment channel: an XML document with `return_code` / `result_code`

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{codes, WechatError};

/// Reported for an `errcode` the provider sent in a form that is not an integer.
pub const UNPARSEABLE_ERRCODE: i64 = -1;

/// A normalized JSON response from the message channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope(Value);

impl Envelope {
    /// Wraps a decoded response, hoisting `base_resp` and coercing
    /// `errcode` to an integer.
    pub fn new(value: Value) -> Self {
        Self(normalize(value))
    }

    /// `0` when the field is absent.
    pub fn errcode(&self) -> i64 {
        match self.0.get("errcode") {
            None | Some(Value::Null) => codes::SUCCESS,
            Some(v) => v.as_i64().unwrap_or(UNPARSEABLE_ERRCODE),
        }
    }

    pub fn errmsg(&self) -> &str {
        self.0
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn is_success(&self) -> bool {
        self.errcode() == codes::SUCCESS
    }

    pub fn is_credential_expired(&self) -> bool {
        codes::is_credential_expired(self.errcode())
    }

    pub fn is_rate_limited(&self) -> bool {
        self.errcode() == codes::OUT_OF_API_FREQ_LIMIT
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Turns a non-zero `errcode` into [`WechatError::Api`].
    pub fn into_result(self) -> Result<Self, WechatError> {
        WechatError::check_api(self.errcode(), self.errmsg())?;
        Ok(self)
    }

    /// Checks the envelope, then deserializes it into `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, WechatError> {
        let value = self.into_result()?.into_value();
        Ok(serde_json::from_value(value)?)
    }
}

fn normalize(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };

    if let Some(base_resp) = map.remove("base_resp") {
        hoist_base_resp(&mut map, base_resp);
    }

    if let Some(Value::String(raw)) = map.get("errcode") {
        if let Ok(code) = raw.trim().parse::<i64>() {
            map.insert("errcode".to_string(), Value::from(code));
        }
    }

    Value::Object(map)
}

// Device-class endpoints nest the outcome as `{"base_resp": {"errcode": .., "errmsg": ..}}`.
fn hoist_base_resp(map: &mut Map<String, Value>, base_resp: Value) {
    match base_resp {
        Value::Object(mut inner) => {
            if let Some(code) = inner.remove("errcode") {
                map.insert("errcode".to_string(), code);
            }
            if let Some(msg) = inner.remove("errmsg") {
                map.entry("errmsg").or_insert(msg);
            }
        }
        scalar => {
            map.insert("errcode".to_string(), scalar);
        }
    }
}

/// A decoded XML response from the payment channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayResponse(BTreeMap<String, String>);

impl PayResponse {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn return_code(&self) -> Option<&str> {
        self.get("return_code")
    }

    pub fn return_msg(&self) -> Option<&str> {
        self.get("return_msg")
    }

    pub fn result_code(&self) -> Option<&str> {
        self.get("result_code")
    }

    pub fn err_code(&self) -> Option<&str> {
        self.get("err_code")
    }

    pub fn err_code_des(&self) -> Option<&str> {
        self.get("err_code_des")
    }

    /// `appid`, or `wxappid` on red packet responses.
    pub fn appid(&self) -> Option<&str> {
        self.get("appid").or_else(|| self.get("wxappid"))
    }

    /// Both `return_code` and `result_code` are `SUCCESS`.
    pub fn is_success(&self) -> bool {
        self.return_code() == Some("SUCCESS") && self.result_code() == Some("SUCCESS")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Turns a failed envelope into [`WechatError::Pay`].
    pub fn into_result(self) -> Result<Self, WechatError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.to_error())
    }

    pub(crate) fn to_error(&self) -> WechatError {
        let (code, message) = if self.return_code() != Some("SUCCESS") {
            (self.return_code(), self.return_msg())
        } else {
            (self.err_code(), self.err_code_des())
        };
        WechatError::Pay {
            code: code.unwrap_or("FAIL").to_string(),
            message: message.unwrap_or_default().to_string(),
        }
    }
}
