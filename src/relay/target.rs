//! Target URL decoding.

use std::fmt;

use url::Url;

use crate::relay::codec::decode_base64;
use crate::relay::error::RelayError;

/// Scheme of a decoded target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScheme {
    Http,
    Https,
}

/// Absolute http(s) URL taken from the `url` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTarget {
    url: Url,
    scheme: TargetScheme,
}

impl DecodedTarget {
    /// Decode the base64 `url` parameter.
    ///
    /// Malformed base64, non UTF-8 bytes and unparseable URLs all collapse to
    /// `InvalidEncoding`; a parseable URL with the wrong scheme is reported
    /// separately.
    pub fn decode(param: Option<&str>) -> Result<Self, RelayError> {
        let encoded = param
            .filter(|p| !p.is_empty())
            .ok_or(RelayError::MissingParameter)?;

        let raw = decode_base64(encoded).map_err(|_| RelayError::InvalidEncoding)?;
        let text = String::from_utf8(raw).map_err(|_| RelayError::InvalidEncoding)?;
        let url = Url::parse(text.trim()).map_err(|_| RelayError::InvalidEncoding)?;

        Self::try_from(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> TargetScheme {
        self.scheme
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl TryFrom<Url> for DecodedTarget {
    type Error = RelayError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        let scheme = match url.scheme() {
            "http" => TargetScheme::Http,
            "https" => TargetScheme::Https,
            other => return Err(RelayError::UnsupportedScheme(other.to_string())),
        };
        Ok(Self { url, scheme })
    }
}

impl fmt::Display for DecodedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}
