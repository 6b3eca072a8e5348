//! Cassette documents, storage, and replay matching

mod format;
mod matcher;
mod store;

pub use format::{header_value, Body, Cassette, Interaction, Request, Response};
pub use matcher::find_match;
pub use store::{validate_cassette_name, CassetteStore};
