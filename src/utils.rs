use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Everything but RFC 3986 unreserved characters is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Percent-encodes `value` for use as one query value.
pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Joins `pairs` into an encoded query string.
pub(crate) fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Seconds since the Unix epoch, as the provider's signing schemes expect.
pub(crate) fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string() {
        let value = random_string(16);
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(value, random_string(16));
    }

    #[test]
    fn test_encode_component_escapes_reserved() {
        assert_eq!(
            encode_component("https://example.com/cb?a=1&b=2"),
            "https%3A%2F%2Fexample.com%2Fcb%3Fa%3D1%26b%3D2"
        );
        assert_eq!(encode_component("a-b.c_d~e f"), "a-b.c_d~e%20f");
    }

    #[test]
    fn test_encode_query() {
        assert_eq!(
            encode_query(&[("action", "get_confirm"), ("scene", "1000")]),
            "action=get_confirm&scene=1000"
        );
    }

    #[test]
    fn test_unix_timestamp_is_digits() {
        let ts = unix_timestamp();
        assert!(!ts.is_empty());
        assert!(ts.bytes().all(|b| b.is_ascii_digit()));
    }
}
