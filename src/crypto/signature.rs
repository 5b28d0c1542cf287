//! Parameter signatures for the payment channel.
//!
//! The provider recomputes the signature byte for byte, so the pre-image
//! must be built exactly:
//!
//! 1. drop falsy values
//! 2. sort keys by raw bytes
//! 3. join `key=value` pairs with `&`
//! 4. append `&key=<api key>`
//! 5. MD5, uppercase hex

use std::collections::BTreeMap;

use md5::{Digest, Md5};

use crate::types::Params;

/// Field carrying the signature in requests and notifications.
pub const SIGN_FIELD: &str = "sign";

/// Builds the signing pre-image for `params`.
pub fn format_params(params: &Params, api_key: Option<&str>) -> String {
    let mut pairs: Vec<String> = params
        .non_empty()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        pairs.push(format!("key={key}"));
    }

    pairs.join("&")
}

/// Computes the uppercase MD5 signature of `params` with `api_key`.
pub fn calculate_signature(params: &Params, api_key: &str) -> String {
    let pre_image = format_params(params, Some(api_key));
    hex::encode_upper(Md5::digest(pre_image.as_bytes()))
}

/// Recomputes the signature over every field except `sign` and compares it
/// with the received one.
pub fn verify_signature(fields: &BTreeMap<String, String>, api_key: &str) -> bool {
    let Some(received) = fields.get(SIGN_FIELD) else {
        return false;
    };

    let params: Params = fields
        .iter()
        .filter(|(k, _)| k.as_str() != SIGN_FIELD)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    calculate_signature(&params, api_key) == *received
}
