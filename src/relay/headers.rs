//! Header decoding and outbound header assembly.
//!
//! # Responsibilities
//! - Case-normalizing header storage (`HeaderTable`)
//! - Decode the optional `h` query parameter (base64 JSON object)
//! - Merge overrides, whitelisted caller headers and the default user agent
//!
//! # Design Decisions
//! - Caller headers outside `FORWARDED_REQUEST_HEADERS` never reach upstream
//!   unless the caller names them explicitly in `h`
//! - Valid JSON that is not an object yields no overrides instead of an error;
//!   only undecodable base64 or unparseable JSON is rejected
//! - `accept-encoding` is narrowed to codings the upstream client decodes;
//!   `content-encoding` is not relayed, so anything else would reach the
//!   caller as an opaque compressed body

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::codec::decode_base64;
use crate::relay::error::RelayError;

/// Caller headers copied to the upstream request when `h` does not set them.
pub const FORWARDED_REQUEST_HEADERS: &[&str] = &[
    "range",
    "accept",
    "accept-encoding",
    "accept-language",
    "referer",
    "origin",
    "user-agent",
];

/// Sent when neither `h` nor the caller supplies a user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Content codings the upstream client can undo.
pub const DECODABLE_CONTENT_CODINGS: &[&str] = &["gzip", "x-gzip", "deflate", "br", "zstd", "identity"];

const USER_AGENT: &str = "user-agent";
const ACCEPT_ENCODING: &str = "accept-encoding";

/// Header map whose keys are lowercased on insert and lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct HeaderTable(BTreeMap<String, String>);

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, returning the previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into())
    }

    /// Insert a header, joining with `, ` if it is already present.
    pub fn append(&mut self, name: impl AsRef<str>, value: &str) {
        self.0
            .entry(name.as_ref().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(lowercase name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for HeaderTable {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = HeaderTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Decode the `h` query parameter into header overrides.
///
/// Absent or empty input yields an empty table.
pub fn decode_overrides(param: Option<&str>) -> Result<HeaderTable, RelayError> {
    let Some(encoded) = param.filter(|p| !p.is_empty()) else {
        return Ok(HeaderTable::new());
    };

    let raw = decode_base64(encoded).map_err(|_| RelayError::InvalidHeaderPayload)?;
    let parsed: Value =
        serde_json::from_slice(&raw).map_err(|_| RelayError::InvalidHeaderPayload)?;

    let Value::Object(entries) = parsed else {
        tracing::debug!("h parameter is not a JSON object, ignoring");
        return Ok(HeaderTable::new());
    };

    Ok(entries
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name, s)),
            _ => None,
        })
        .collect())
}

/// Merge overrides with whitelisted caller headers and the user-agent fallback.
pub fn assemble(overrides: HeaderTable, inbound: &HeaderTable, default_user_agent: &str) -> HeaderTable {
    let mut headers = overrides;

    for name in FORWARDED_REQUEST_HEADERS {
        if headers.contains(name) {
            continue;
        }
        if let Some(value) = inbound.get(name) {
            headers.insert(name, value);
        }
    }

    if !headers.contains(USER_AGENT) {
        headers.insert(USER_AGENT, default_user_agent);
    }

    if let Some(value) = headers.remove(ACCEPT_ENCODING) {
        match restrict_accept_encoding(&value) {
            Some(narrowed) => {
                headers.insert(ACCEPT_ENCODING, narrowed);
            }
            None => tracing::debug!(accept_encoding = %value, "No decodable coding offered, dropping"),
        }
    }

    headers
}

/// Keep only the entries of an `Accept-Encoding` value whose coding is in
/// `DECODABLE_CONTENT_CODINGS`, preserving their order and q-values.
/// `None` when nothing usable remains.
pub fn restrict_accept_encoding(value: &str) -> Option<String> {
    let kept: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| {
            let coding = entry.split(';').next().unwrap_or_default().trim();
            DECODABLE_CONTENT_CODINGS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(coding))
        })
        .collect();

    (!kept.is_empty()).then(|| kept.join(", "))
}
