//! Cassette document model

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A request or response body as stored in a cassette.
///
/// UTF-8 text is stored as a plain JSON string so cassettes stay readable
/// and diffable; anything else is stored hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    /// UTF-8 text body
    Text(String),
    /// Binary body, hex-encoded
    Binary {
        /// Hex encoding of the raw bytes
        hex: String,
    },
}

impl Body {
    /// Build a body from raw bytes, preferring the text form when possible.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary {
                hex: hex::encode(data),
            },
        }
    }

    /// Decode the body back into raw bytes.
    ///
    /// Binary bodies with malformed hex decode to empty; `CassetteStore`
    /// rejects such documents at load time, so this only happens for
    /// hand-built values.
    #[must_use]
    pub fn as_bytes(&self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            Self::Binary { hex } => hex::decode(hex).map(Bytes::from).unwrap_or_default(),
        }
    }

    /// Whether the stored form decodes cleanly.
    #[must_use]
    pub fn is_decodable(&self) -> bool {
        match self {
            Self::Text(_) => true,
            Self::Binary { hex } => hex::decode(hex).is_ok(),
        }
    }

    /// Body length in bytes once decoded.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary { hex } => hex.len() / 2,
        }
    }

    /// Whether the decoded body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An outgoing HTTP request in recordable form.
///
/// The same shape is used for requests built by callers and for requests
/// stored inside a cassette, so recording needs no conversion step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method, uppercase
    pub method: String,
    /// Absolute request URL
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl Request {
    /// Create a request for `method` and `url`. The method is uppercased.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Append a percent-encoded query parameter to the URL.
    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        self.url.push(separator);
        self.url.push_str(&urlencoding::encode(key));
        self.url.push('=');
        self.url.push_str(&urlencoding::encode(value));
        self
    }

    /// Set a UTF-8 text body.
    #[must_use]
    pub fn body_text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    /// Set a body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, data: &[u8]) -> Self {
        self.body = Some(Body::from_bytes(data));
        self
    }

    /// Look up a header value by case-insensitive name.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// A recorded HTTP response head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// URL the response was served for
    pub url: String,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Response {
    /// Create a response head for `status` and `url`.
    #[must_use]
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up a header value by case-insensitive name.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// One recorded request/response pair plus the response body.
///
/// Treated as immutable once recorded; the owning cassette hands out shared
/// references only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// The request as it was matched and persisted (post-filtering)
    pub request: Request,
    /// The response head
    pub response: Response,
    /// The response body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Body>,
}

impl Interaction {
    /// Assemble an interaction from its parts.
    #[must_use]
    pub fn new(request: Request, response: Response, response_body: Option<Body>) -> Self {
        Self {
            request,
            response,
            response_body,
        }
    }
}

/// A named, ordered collection of interactions.
///
/// Order is recording order and is preserved on persistence; duplicate
/// signatures are allowed (the matcher takes the first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cassette {
    /// Cassette name; doubles as the storage key
    pub name: String,
    /// Recorded interactions in recording order
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Create an empty cassette.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interactions: Vec::new(),
        }
    }

    /// Whether every stored body decodes cleanly.
    #[must_use]
    pub fn well_formed(&self) -> bool {
        self.interactions.iter().all(|interaction| {
            interaction
                .request
                .body
                .as_ref()
                .map_or(true, Body::is_decodable)
                && interaction
                    .response_body
                    .as_ref()
                    .map_or(true, Body::is_decodable)
        })
    }
}

/// Look up a header value by case-insensitive name.
#[must_use]
pub fn header_value<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
