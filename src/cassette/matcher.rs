//! Replay matching
//!
//! Decides which stored interaction, if any, satisfies an outgoing
//! request. Matching is a pure read of the cassette: entries are never
//! consumed, so requests with identical signatures replay the same
//! interaction indefinitely.

use crate::cassette::format::{Cassette, Interaction, Request};

/// Find the first stored interaction matching `request`.
///
/// A stored interaction matches when its method and URL are identical to
/// the request's and every header named in `headers_to_check` carries the
/// same value on both sides (a header absent from both sides agrees).
/// Headers not listed are ignored, and bodies are never compared.
#[must_use]
pub fn find_match<'a>(
    cassette: &'a Cassette,
    request: &Request,
    headers_to_check: &[String],
) -> Option<&'a Interaction> {
    cassette
        .interactions
        .iter()
        .find(|interaction| signatures_match(&interaction.request, request, headers_to_check))
}

fn signatures_match(stored: &Request, outgoing: &Request, headers_to_check: &[String]) -> bool {
    stored.method.eq_ignore_ascii_case(&outgoing.method)
        && stored.url == outgoing.url
        && headers_to_check
            .iter()
            .all(|name| stored.header_value(name) == outgoing.header_value(name))
}
