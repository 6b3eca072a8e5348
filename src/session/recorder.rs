//! Recorder pass lifecycle
//!
//! A pass spans from an explicit or implicit recording start to the point
//! where every outstanding task has finished after the pass was closed.
//! Persistence happens at most once per pass, and only when at least one
//! interaction was newly recorded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::cassette::{Cassette, CassetteStore, Interaction, Request};
use crate::config::{RecorderConfig, RecordingMode};
use crate::filter::Filter;
use crate::session::task::{Task, TaskEvent};
use crate::session::EVENT_CHANNEL_CAPACITY;
use crate::transport::{HyperTransport, Transport};
use crate::Result;

/// Orchestrates record/replay tasks against one cassette.
///
/// Cloning is cheap and clones share all state, so a recorder can be handed
/// to tasks and observers freely. Concurrent passes against the same
/// cassette name are not supported; use one recorder per cassette.
#[derive(Clone)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

struct RecorderInner {
    config: RecorderConfig,
    store: CassetteStore,
    transport: Arc<dyn Transport>,
    filters: Vec<Box<dyn Filter>>,
    state: Mutex<PassState>,
    next_task_id: AtomicU64,
    events: broadcast::Sender<TaskEvent>,
}

/// Bookkeeping for the current pass.
///
/// Tasks complete concurrently from transport callbacks, so every mutation
/// goes through the one mutex guarding this struct.
#[derive(Default)]
struct PassState {
    recording: bool,
    needs_persistence: bool,
    outstanding: HashSet<u64>,
    new_interactions: Vec<Interaction>,
    on_done: Option<Box<dyn FnOnce() + Send>>,
}

/// Finalization work captured under the lock and run outside it, so
/// persistence I/O and user callbacks never execute while the state is held.
struct FinalizeAction {
    to_persist: Option<Vec<Interaction>>,
    on_done: Option<Box<dyn FnOnce() + Send>>,
}

impl Recorder {
    /// Create a recorder backed by the real network.
    ///
    /// # Errors
    ///
    /// Returns error if `config` fails validation
    pub fn new(config: RecorderConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(HyperTransport::new()), Vec::new())
    }

    /// Create a recorder with an explicit transport and filter chain.
    ///
    /// # Errors
    ///
    /// Returns error if `config` fails validation
    pub fn with_transport(
        config: RecorderConfig,
        transport: Arc<dyn Transport>,
        filters: Vec<Box<dyn Filter>>,
    ) -> Result<Self> {
        config.validate()?;

        let store = CassetteStore::with_dirs(config.library_dir.clone(), config.write_dir());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(RecorderInner {
                config,
                store,
                transport,
                filters,
                state: Mutex::new(PassState::default()),
                next_task_id: AtomicU64::new(1),
                events,
            }),
        })
    }

    /// The recorder's configuration.
    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.inner.config
    }

    /// Load the current cassette from storage.
    ///
    /// Re-reads the file on every call; an absent or unparseable cassette
    /// is `None`.
    #[must_use]
    pub fn cassette(&self) -> Option<Cassette> {
        self.inner.store.load(&self.inner.config.cassette)
    }

    /// Subscribe to task completion events.
    ///
    /// Events fire after pass bookkeeping, so observing a `Recorded` event
    /// means any persistence it triggered has already happened.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Number of tasks created but not yet finished.
    #[must_use]
    pub fn outstanding_tasks(&self) -> usize {
        self.state().outstanding.len()
    }

    /// Whether a pass is currently open.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state().recording
    }

    /// Open a pass. Not needed for a single ad-hoc task; required when
    /// several tasks should persist together.
    ///
    /// No-op if a pass is already open. Otherwise clears the previous
    /// pass's bookkeeping and starts fresh.
    pub fn begin_recording(&self) {
        let mut state = self.state();
        if state.recording {
            return;
        }
        debug!("Beginning recording pass for '{}'", self.inner.config.cassette);
        Self::open_pass(&mut state);
    }

    /// Close the pass. No-op if no pass is open.
    ///
    /// Finalizes immediately when nothing is outstanding; otherwise the
    /// last finishing task finalizes.
    pub fn end_recording(&self) {
        self.close_pass(None);
    }

    /// Close the pass and run `on_done` once it has fully drained and any
    /// persistence has happened. No-op if no pass is open, in which case
    /// `on_done` is dropped without being invoked.
    pub fn end_recording_with<F>(&self, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.close_pass(Some(Box::new(on_done)));
    }

    /// Create a task for `request` and register it as outstanding.
    ///
    /// When no pass is open and the mode allows recording, the pass is
    /// opened and closed implicitly around registration, so a single
    /// ad-hoc task forms a complete pass by itself. A task that is never
    /// resumed stays outstanding until the next `begin_recording`.
    #[must_use]
    pub fn create_task(&self, request: Request) -> Task {
        let id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.state();
            let implicit = !state.recording && self.inner.config.mode != RecordingMode::None;
            if implicit {
                Self::open_pass(&mut state);
            }
            state.outstanding.insert(id);
            if implicit {
                // Close right away; the task just registered keeps the
                // pass from finalizing until it finishes.
                state.recording = false;
            }
        }

        debug!("Created task {} for {} {}", id, request.method, request.url);
        Task::new(
            self.clone(),
            id,
            request,
            self.inner.config.headers_to_check.clone(),
        )
    }

    pub(crate) fn filters(&self) -> &[Box<dyn Filter>] {
        &self.inner.filters
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Remove a finished task, book its outcome, finalize if the pass has
    /// drained, then broadcast `event`.
    pub(crate) fn finish_task(
        &self,
        task_id: u64,
        recorded: Option<Interaction>,
        event: Option<TaskEvent>,
    ) {
        let action = {
            let mut state = self.state();
            state.outstanding.remove(&task_id);
            if let Some(interaction) = recorded {
                state.new_interactions.push(interaction);
                state.needs_persistence = true;
            }
            Self::take_finalize_if_drained(&mut state)
        };

        if let Some(action) = action {
            self.finalize(action);
        }
        if let Some(event) = event {
            let _ = self.inner.events.send(event);
        }
    }

    fn close_pass(&self, on_done: Option<Box<dyn FnOnce() + Send>>) {
        let action = {
            let mut state = self.state();
            if !state.recording {
                return;
            }
            state.recording = false;
            state.on_done = on_done;
            Self::take_finalize_if_drained(&mut state)
        };

        if let Some(action) = action {
            self.finalize(action);
        }
    }

    fn open_pass(state: &mut PassState) {
        state.recording = true;
        state.needs_persistence = false;
        state.outstanding.clear();
        state.new_interactions.clear();
        state.on_done = None;
    }

    /// Once the pass is closed and drained, take what finalization needs.
    /// The dirty flag resets here so a later drain cannot re-persist.
    fn take_finalize_if_drained(state: &mut PassState) -> Option<FinalizeAction> {
        if state.recording || !state.outstanding.is_empty() {
            return None;
        }

        let to_persist = if state.needs_persistence {
            state.needs_persistence = false;
            Some(std::mem::take(&mut state.new_interactions))
        } else {
            state.new_interactions.clear();
            None
        };

        Some(FinalizeAction {
            to_persist,
            on_done: state.on_done.take(),
        })
    }

    fn finalize(&self, action: FinalizeAction) {
        if let Some(new_interactions) = action.to_persist {
            let name = &self.inner.config.cassette;
            let mut cassette = self
                .inner
                .store
                .load(name)
                .unwrap_or_else(|| Cassette::new(name.clone()));
            cassette.interactions.extend(new_interactions);

            match self.inner.store.persist(&cassette) {
                Ok(path) => info!("Persisted cassette '{}' at {}", name, path.display()),
                Err(err) => error!("Failed to persist cassette '{}': {}", name, err),
            }
        }

        if let Some(on_done) = action.on_done {
            on_done();
        }
    }

    fn state(&self) -> MutexGuard<'_, PassState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
