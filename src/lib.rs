//! Overdub - HTTP interaction record-replay sessions for deterministic tests
//!
//! Records real HTTP exchanges to named JSON cassettes on first run and
//! replays them on later runs, so tests that talk to the network become
//! repeatable and offline.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod filter;
pub mod session;
pub mod transport;

pub use error::{OverdubError, Result};
