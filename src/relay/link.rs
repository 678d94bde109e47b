//! Client-side construction of relay links.
//!
//! The inverse of the decoding stages: encodes a target URL and header
//! overrides into the `url` and `h` query parameters of a relay endpoint.

use serde_json::{Map, Value};
use url::Url;

use crate::relay::codec::encode_base64;

/// Base64 form of a target URL, as expected in `url`.
pub fn encode_target(target: &str) -> String {
    encode_base64(target.as_bytes())
}

/// Base64 JSON form of header overrides, as expected in `h`.
pub fn encode_headers(headers: &[(String, String)]) -> String {
    let object: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    encode_base64(Value::Object(object).to_string())
}

/// Relay endpoint URL that fetches `target` with the given overrides.
///
/// `h` is omitted when there are no overrides.
pub fn relay_link(relay: &Url, target: &str, headers: &[(String, String)]) -> Url {
    let mut link = relay.clone();
    {
        let mut query = link.query_pairs_mut();
        query.clear();
        query.append_pair("url", &encode_target(target));
        if !headers.is_empty() {
            query.append_pair("h", &encode_headers(headers));
        }
    }
    link
}

/// Parse a `name: value` header argument.
pub fn parse_header_arg(arg: &str) -> Option<(String, String)> {
    let (name, value) = arg.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
