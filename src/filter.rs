//! Request and response filter pipeline
//!
//! Filters rewrite what gets matched and persisted, never what goes over
//! the wire. A request-side veto stops matching and recording for that
//! call; a response-side veto stops only persistence. Either way the
//! caller still receives the real response.

use bytes::Bytes;

use crate::cassette::{Request, Response};

/// Value substituted for redacted headers.
pub const REDACTED: &str = "REDACTED";

/// A stateless transform applied before matching and before persistence.
///
/// Both hooks default to the identity, so a filter can implement only the
/// side it cares about. Returning `None` is a veto.
pub trait Filter: Send + Sync {
    /// Rewrite the request used for matching and recording, or veto the
    /// whole match/record attempt for this call.
    fn filter_request(&self, request: Request) -> Option<Request> {
        Some(request)
    }

    /// Rewrite the response head and body before persistence, or veto
    /// persistence of this interaction.
    fn filter_response(
        &self,
        response: Response,
        body: Option<Bytes>,
    ) -> Option<(Response, Option<Bytes>)> {
        Some((response, body))
    }
}

/// Run `request` through every filter left to right.
///
/// The first veto short-circuits to `None`.
#[must_use]
pub fn apply_request_filters(filters: &[Box<dyn Filter>], request: Request) -> Option<Request> {
    let mut request = request;
    for filter in filters {
        request = filter.filter_request(request)?;
    }
    Some(request)
}

/// Run a response head and body through every filter left to right.
///
/// The first veto short-circuits to `None`.
#[must_use]
pub fn apply_response_filters(
    filters: &[Box<dyn Filter>],
    response: Response,
    body: Option<Bytes>,
) -> Option<(Response, Option<Bytes>)> {
    let mut response = response;
    let mut body = body;
    for filter in filters {
        (response, body) = filter.filter_response(response, body)?;
    }
    Some((response, body))
}

/// Replaces the values of named headers with [`REDACTED`] on both the
/// request and response side, so credentials never land in a cassette.
///
/// Redacting a header that is also listed in `headers_to_check` will keep
/// later requests from matching the recorded entry unless they send the
/// redacted value themselves.
#[derive(Debug, Clone)]
pub struct RedactHeaders {
    names: Vec<String>,
    replacement: String,
}

impl RedactHeaders {
    /// Redact every header whose name case-insensitively matches one of
    /// `names`, substituting [`REDACTED`].
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replacement(names, REDACTED)
    }

    /// Like [`RedactHeaders::new`] with a custom replacement value.
    pub fn with_replacement<I, S>(names: I, replacement: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            replacement: replacement.into(),
        }
    }

    fn redact(&self, headers: &mut std::collections::BTreeMap<String, String>) {
        for (name, value) in headers.iter_mut() {
            if self
                .names
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(name))
            {
                *value = self.replacement.clone();
            }
        }
    }
}

impl Filter for RedactHeaders {
    fn filter_request(&self, mut request: Request) -> Option<Request> {
        self.redact(&mut request.headers);
        Some(request)
    }

    fn filter_response(
        &self,
        mut response: Response,
        body: Option<Bytes>,
    ) -> Option<(Response, Option<Bytes>)> {
        self.redact(&mut response.headers);
        Some((response, body))
    }
}
