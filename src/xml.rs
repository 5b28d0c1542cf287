//! Flat XML codec for the payment channel.
//!
//! Documents are a single `<xml>` root whose children are scalar fields:
//!
//! ```text
//! <xml><amount>100</amount><note><![CDATA[hi&bye]]></note></xml>
//! ```

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::types::Params;

const ROOT: &str = "xml";

/// Encodes `params` under an `<xml>` root.
///
/// Falsy values are skipped. Digit-only values are written as plain text
/// nodes; everything else is wrapped in CDATA.
pub fn encode(params: &Params) -> String {
    let mut out = String::with_capacity(16 + params.len() * 32);
    out.push('<');
    out.push_str(ROOT);
    out.push('>');

    for (key, value) in params.non_empty() {
        let value = value.to_string();
        if is_digits(&value) {
            out.push_str(&format!("<{key}>{value}</{key}>"));
        } else {
            out.push_str(&format!("<{key}><![CDATA[{}]]></{key}>", escape_cdata(&value)));
        }
    }

    out.push_str("</");
    out.push_str(ROOT);
    out.push('>');
    out
}

/// Decodes the children of the root element into a flat map.
///
/// Input that is not well-formed XML yields an empty map rather than an
/// error, so an empty result can mean either an empty document or a parse
/// failure.
pub fn decode(input: &[u8]) -> BTreeMap<String, String> {
    match try_decode(input) {
        Ok(fields) => fields,
        Err(e) => {
            log::debug!("discarding malformed XML payload: {e}");
            BTreeMap::new()
        }
    }
}

fn try_decode(input: &[u8]) -> Result<BTreeMap<String, String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut fields = BTreeMap::new();
    let mut depth = 0usize;
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    current = Some((name, String::new()));
                }
            }
            Event::Empty(e) => {
                if depth == 1 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    fields.insert(name, String::new());
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some((name, text)) = current.take() {
                        fields.insert(name, text);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if let (2, Some((_, text))) = (depth, current.as_mut()) {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let (2, Some((_, text))) = (depth, current.as_mut()) {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(quick_xml::Error::Syntax(
            quick_xml::errors::SyntaxError::UnclosedTag,
        ));
    }
    Ok(fields)
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

// A literal `]]>` would terminate the section early; split it across two sections.
fn escape_cdata(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_digits_plain_text_cdata() {
        let params = Params::new().with("amount", "100").with("note", "hi&bye");
        assert_eq!(
            encode(&params),
            "<xml><amount>100</amount><note><![CDATA[hi&bye]]></note></xml>"
        );
    }

    #[test]
    fn test_encode_skips_falsy() {
        let params = Params::new()
            .with("a", "")
            .with("b", 0)
            .with("c", Option::<String>::None)
            .with("d", "0");
        assert_eq!(encode(&params), "<xml><d>0</d></xml>");
    }

    #[test]
    fn test_encode_integer_values() {
        let params = Params::new().with("total_fee", 1).with("delta", -5);
        assert_eq!(
            encode(&params),
            "<xml><delta><![CDATA[-5]]></delta><total_fee>1</total_fee></xml>"
        );
    }

    #[test]
    fn test_encode_cdata_terminator() {
        let params = Params::new().with("attach", "a]]>b");
        let encoded = encode(&params);
        assert_eq!(decode(encoded.as_bytes()).get("attach").unwrap(), "a]]>b");
    }

    #[test]
    fn test_decode_mixed_nodes() {
        let xml = b"<xml><return_code><![CDATA[SUCCESS]]></return_code>\
                    <total_fee>1</total_fee><empty/><text>a &amp; b</text></xml>";
        let fields = decode(xml);
        assert_eq!(fields.get("return_code").unwrap(), "SUCCESS");
        assert_eq!(fields.get("total_fee").unwrap(), "1");
        assert_eq!(fields.get("empty").unwrap(), "");
        assert_eq!(fields.get("text").unwrap(), "a & b");
    }

    #[test]
    fn test_decode_ignores_whitespace_between_fields() {
        let xml = b"<xml>\n  <a>1</a>\n  <b><![CDATA[x]]></b>\n</xml>\n";
        let fields = decode(xml);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a").unwrap(), "1");
        assert_eq!(fields.get("b").unwrap(), "x");
    }

    #[test]
    fn test_decode_malformed_returns_empty() {
        assert!(decode(b"<xml><a>1</b></xml>").is_empty());
        assert!(decode(b"<xml><a>1</a>").is_empty());
        assert!(decode(b"not xml at all").is_empty());
        assert!(decode(b"").is_empty());
    }

    #[test]
    fn test_decode_empty_document() {
        assert!(decode(b"<xml></xml>").is_empty());
        assert!(decode(b"<xml/>").is_empty());
    }

    #[test]
    fn test_round_trip_restores_non_falsy_values() {
        let params = Params::new()
            .with("appid", "wx1234567890abcdef")
            .with("body", "Tencent <test> & co")
            .with("total_fee", "888")
            .with("skip", "");
        let fields = decode(encode(&params).as_bytes());

        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("appid").unwrap(), "wx1234567890abcdef");
        assert_eq!(fields.get("body").unwrap(), "Tencent <test> & co");
        assert_eq!(fields.get("total_fee").unwrap(), "888");
    }
}
