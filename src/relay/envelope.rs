//! Request and response envelopes exchanged with the hosting adapter.
//!
//! Both types map onto the serverless function event shape so the pipeline
//! can be driven from JSON as well as from the built-in HTTP server:
//!
//! ```text
//! in:  {"httpMethod", "queryStringParameters", "headers", "body", "isBase64Encoded"}
//! out: {"statusCode", "headers", "body", "isBase64Encoded"}
//! ```

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::relay::codec::encode_base64;
use crate::relay::headers::HeaderTable;

/// Request as handed over by the hosting adapter. Read-only to the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRequest {
    #[serde(rename = "httpMethod", default)]
    pub method: Option<String>,

    #[serde(
        rename = "queryStringParameters",
        default,
        deserialize_with = "null_as_default"
    )]
    pub query: HashMap<String, String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HeaderTable,

    #[serde(default, deserialize_with = "body_from_text")]
    pub body: Option<Bytes>,

    /// The adapter delivered `body` as base64 text.
    #[serde(rename = "isBase64Encoded", default)]
    pub body_is_base64: bool,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>, is_base64: bool) -> Self {
        self.body = Some(body.into());
        self.body_is_base64 = is_base64;
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn body_from_text<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(Bytes::from))
}

/// Body of an `OutboundResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    /// Plain text, sent as-is.
    Text(String),
    /// Raw bytes; base64 encoded when serialized into the envelope.
    Binary(Bytes),
}

impl ResponseBody {
    pub fn is_base64_encoded(&self) -> bool {
        matches!(self, ResponseBody::Binary(_))
    }

    /// Envelope form of the body: base64 for binary, verbatim otherwise.
    pub fn encoded(&self) -> String {
        match self {
            ResponseBody::Empty => String::new(),
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Binary(bytes) => encode_base64(bytes),
        }
    }

    /// Raw bytes to write on the wire.
    pub fn into_bytes(self) -> Bytes {
        match self {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Text(text) => Bytes::from(text),
            ResponseBody::Binary(bytes) => bytes,
        }
    }
}

/// Caller-facing response produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status_code: u16,
    /// Outgoing header names, cased as they should appear on the wire.
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl OutboundResponse {
    pub fn new(status_code: u16, headers: BTreeMap<String, String>, body: ResponseBody) -> Self {
        Self {
            status_code,
            headers,
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for OutboundResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OutboundResponse", 4)?;
        state.serialize_field("statusCode", &self.status_code)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("body", &self.body.encoded())?;
        state.serialize_field("isBase64Encoded", &self.body.is_base64_encoded())?;
        state.end()
    }
}
