//! Shared request parsing and JSON reply helpers for route handlers.

use serde::Serialize;
use serde_json::json;

/// Parse a URL-encoded form body into key-value pairs.
/// Handles `key=value&key2=value2` (POST bodies from the page).
pub fn parse_form_body(body: &str) -> Vec<(String, String)> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, val) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(val))
        })
        .collect()
}

/// Percent-decode a URL-encoded value. Decoded bytes are reassembled as
/// UTF-8, so multi-byte characters in answers survive.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                match hex_pair(bytes.get(i + 1).copied(), bytes.get(i + 2).copied()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: Option<u8>, lo: Option<u8>) -> Option<u8> {
    let hi = (hi? as char).to_digit(16)?;
    let lo = (lo? as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Parse a query string into key-value pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let q = query.strip_prefix('?').unwrap_or(query);
    parse_form_body(q)
}

/// Look up a value by key.
pub fn get_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Checkbox-style boolean: `true`/`1`/`on`/`yes` or `false`/`0`/`off`/`no`.
pub fn get_bool(params: &[(String, String)], key: &str) -> Option<bool> {
    match get_param(params, key)?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

pub fn get_int(params: &[(String, String)], key: &str) -> Option<i64> {
    get_param(params, key)?.trim().parse().ok()
}

// ── Replies ────────────────────────────────────────────────────────

/// Serialize a reply body. Serialization of our own types cannot fail in
/// practice; if it does the caller still gets a well-formed error object.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| error_json(500, &e.to_string()))
}

/// `{"ok": true, ...}` merged with the fields of `extra`.
pub fn ok_json(extra: serde_json::Value) -> String {
    let mut reply = json!({ "ok": true });
    if let (Some(reply), serde_json::Value::Object(fields)) = (reply.as_object_mut(), extra) {
        reply.extend(fields);
    }
    reply.to_string()
}

pub fn error_json(status: u16, message: &str) -> String {
    json!({ "ok": false, "status": status, "error": message }).to_string()
}

pub fn bad_request(message: &str) -> String {
    error_json(400, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_form_body_works() {
        let pairs = parse_form_body("level=2&amount=30&flag");
        assert_eq!(pairs.len(), 3);
        assert_eq!(get_param(&pairs, "level"), Some("2"));
        assert_eq!(get_int(&pairs, "amount"), Some(30));
        assert_eq!(get_param(&pairs, "flag"), Some(""));
    }

    #[test]
    fn parse_form_body_empty() {
        assert!(parse_form_body("").is_empty());
    }

    #[test]
    fn percent_decode_plus_and_hex() {
        assert_eq!(percent_decode("hello+world"), "hello world");
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("%7B%22a%22%3A1%7D"), r#"{"a":1}"#);
    }

    #[test]
    fn percent_decode_multibyte() {
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn percent_decode_keeps_bad_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn parse_query_strips_prefix() {
        let pairs = parse_query("?id=3");
        assert_eq!(get_int(&pairs, "id"), Some(3));
    }

    #[test]
    fn bools_accept_common_spellings() {
        let pairs = parse_form_body("a=on&b=0&c=maybe");
        assert_eq!(get_bool(&pairs, "a"), Some(true));
        assert_eq!(get_bool(&pairs, "b"), Some(false));
        assert_eq!(get_bool(&pairs, "c"), None);
        assert_eq!(get_bool(&pairs, "d"), None);
    }

    #[test]
    fn ok_json_merges_fields() {
        let v: serde_json::Value = serde_json::from_str(&ok_json(json!({"totalXp": 5}))).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["totalXp"], 5);
    }
}
