//! Recorder registry
//!
//! Hands out one shared recorder per cassette name, so concurrent passes
//! against the same cassette cannot be constructed by accident.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cassette::validate_cassette_name;
use crate::config::RecorderConfig;
use crate::session::{Recorder, MAX_RECORDERS};
use crate::transport::{HyperTransport, Transport};
use crate::{OverdubError, Result};

/// Registry of recorders keyed by cassette name.
///
/// Recorders created here share the registry's transport and carry no
/// filters; construct a [`Recorder`] directly when a filter chain is
/// needed.
pub struct RecorderRegistry {
    recorders: DashMap<String, Recorder>,
    defaults: RecorderConfig,
    transport: Arc<dyn Transport>,
    recorder_count: AtomicUsize,
}

impl RecorderRegistry {
    /// Create a registry backed by the real network.
    ///
    /// `defaults` supplies every recorder's configuration; its `cassette`
    /// field is replaced per entry.
    #[must_use]
    pub fn new(defaults: RecorderConfig) -> Self {
        Self::with_transport(defaults, Arc::new(HyperTransport::new()))
    }

    /// Create a registry whose recorders share `transport`.
    #[must_use]
    pub fn with_transport(defaults: RecorderConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            recorders: DashMap::new(),
            defaults,
            transport,
            recorder_count: AtomicUsize::new(0),
        }
    }

    /// Get or create the recorder for `cassette_name`.
    ///
    /// Repeated calls with the same name return clones sharing one
    /// underlying recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the registry is full or the name is invalid
    pub fn recorder(&self, cassette_name: &str) -> Result<Recorder> {
        if let Some(recorder) = self.recorders.get(cassette_name) {
            return Ok(recorder.clone());
        }

        let current_count = self.recorder_count.load(Ordering::Relaxed);
        if current_count >= MAX_RECORDERS {
            return Err(OverdubError::Config(format!(
                "Recorder limit reached: {MAX_RECORDERS}"
            )));
        }

        validate_cassette_name(cassette_name)?;

        // The entry holds the shard lock, so racing callers construct at
        // most one recorder per name.
        match self.recorders.entry(cassette_name.to_string()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let mut config = self.defaults.clone();
                config.cassette = cassette_name.to_string();
                let recorder =
                    Recorder::with_transport(config, Arc::clone(&self.transport), Vec::new())?;
                self.recorder_count.fetch_add(1, Ordering::Relaxed);
                Ok(slot.insert(recorder).clone())
            }
        }
    }

    /// Number of registered recorders.
    #[must_use]
    pub fn recorder_count(&self) -> usize {
        self.recorder_count.load(Ordering::Relaxed)
    }

    /// End every open pass and drop all recorders.
    pub fn close_all(&self) {
        for entry in self.recorders.iter() {
            entry.value().end_recording();
        }

        self.recorders.clear();
        self.recorder_count.store(0, Ordering::Relaxed);
    }
}
