//! Task record/replay decision
//!
//! A task is one outstanding request execution. Resuming it drives the
//! decision exactly once: replay a stored interaction, fail on a fixture
//! violation, or perform the real call and hand the result to the pass
//! bookkeeping.

use bytes::Bytes;
use tracing::debug;

use crate::cassette::{find_match, Body, Interaction, Request, Response};
use crate::config::RecordingMode;
use crate::error::{OverdubError, Result};
use crate::filter::{apply_request_filters, apply_response_filters};
use crate::session::recorder::Recorder;

/// How a finished task completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Served from the cassette; no network call
    Replayed,
    /// Real call performed and a new interaction recorded
    Recorded,
    /// Real call performed but nothing recorded (filter veto)
    Skipped,
}

/// Broadcast to observers on every task completion, carrying what the
/// caller received.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    /// Id of the finished task
    pub task_id: u64,
    /// Status code delivered to the caller
    pub status: u16,
    /// Body delivered to the caller
    pub body: Option<Bytes>,
    /// How the task completed
    pub outcome: TaskOutcome,
}

/// What [`Task::resume`] delivers to the caller.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    /// Response head
    pub response: Response,
    /// Response body, if any
    pub body: Option<Bytes>,
    /// Whether this was served from the cassette instead of the network
    pub replayed: bool,
}

/// One outstanding request execution.
///
/// Created by [`Recorder::create_task`]. Resuming consumes the task, so
/// the record/replay decision runs exactly once. There is no cancellation:
/// a resumed task always reaches a terminal outcome, since a half-tracked
/// task would corrupt the pass's bookkeeping.
pub struct Task {
    recorder: Recorder,
    id: u64,
    request: Request,
    headers_to_check: Vec<String>,
}

impl Task {
    pub(crate) fn new(
        recorder: Recorder,
        id: u64,
        request: Request,
        headers_to_check: Vec<String>,
    ) -> Self {
        Self {
            recorder,
            id,
            request,
            headers_to_check,
        }
    }

    /// The task id, unique per recorder.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The original request this task executes.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Run the record/replay decision.
    ///
    /// A replay hit returns the stored response with no network call.
    /// Otherwise the real call is performed with the original, unfiltered
    /// request, and its result is returned as soon as the transport
    /// delivers it. In both cases pass bookkeeping continues on a
    /// background task, so the caller is never gated on filtering or
    /// persistence.
    ///
    /// # Errors
    ///
    /// Returns a fixture violation ([`OverdubError::is_fixture_violation`])
    /// when the recording-mode policy cannot satisfy the request, or
    /// [`OverdubError::Transport`] when the real call fails. The task
    /// deregisters itself before any error propagates, so a failed task
    /// never wedges pass finalization.
    pub async fn resume(self) -> Result<TaskOutput> {
        let mode = self.recorder.config().mode;
        let filtered = apply_request_filters(self.recorder.filters(), self.request.clone());

        if mode != RecordingMode::All {
            if let Some(filtered) = filtered.as_ref() {
                if let Some(output) = self.try_replay(filtered)? {
                    return Ok(output);
                }
            }
            // A request veto skips matching and the mode policy both; the
            // real call still happens below.
        }

        self.record(filtered).await
    }

    /// Attempt replay and, on a miss, apply the mode policy.
    ///
    /// `Ok(Some)` is a replay hit, `Ok(None)` falls through to the real
    /// call, `Err` is a fixture violation.
    fn try_replay(&self, filtered: &Request) -> Result<Option<TaskOutput>> {
        let mode = self.recorder.config().mode;
        let cassette = self.recorder.cassette();

        if let Some(cassette) = cassette.as_ref() {
            if let Some(interaction) = find_match(cassette, filtered, &self.headers_to_check) {
                let output = TaskOutput {
                    response: interaction.response.clone(),
                    body: interaction.response_body.as_ref().map(Body::as_bytes),
                    replayed: true,
                };
                debug!(
                    "Task {} replaying {} {}",
                    self.id, self.request.method, self.request.url
                );
                // Bookkeeping may finalize a closed pass; it stays off the
                // delivery path.
                let recorder = self.recorder.clone();
                let id = self.id;
                let event = TaskEvent {
                    task_id: id,
                    status: output.response.status,
                    body: output.body.clone(),
                    outcome: TaskOutcome::Replayed,
                };
                tokio::spawn(async move {
                    recorder.finish_task(id, None, Some(event));
                });
                return Ok(Some(output));
            }
        }

        if cassette.is_some() && mode != RecordingMode::NewEpisodes {
            self.recorder.finish_task(self.id, None, None);
            return Err(OverdubError::FixtureMismatch {
                cassette: self.recorder.config().cassette.clone(),
                method: self.request.method.clone(),
                url: self.request.url.clone(),
            });
        }

        if cassette.is_none() && mode == RecordingMode::None {
            self.recorder.finish_task(self.id, None, None);
            return Err(OverdubError::FixtureMissing(
                self.recorder.config().cassette.clone(),
            ));
        }

        if !self.recorder.config().recording_enabled {
            self.recorder.finish_task(self.id, None, None);
            return Err(OverdubError::RecordingDisabled);
        }

        Ok(None)
    }

    /// Perform the real call and spawn the recording bookkeeping.
    async fn record(self, filtered: Option<Request>) -> Result<TaskOutput> {
        // The wire sees the original request; filters only shape what gets
        // matched and persisted.
        let reply = match self.recorder.transport().perform(&self.request).await {
            Ok(reply) => reply,
            Err(err) => {
                self.recorder.finish_task(self.id, None, None);
                return Err(err);
            }
        };

        let Some(response) = reply.response else {
            self.recorder.finish_task(self.id, None, None);
            return Err(OverdubError::EmptyReply);
        };

        let output = TaskOutput {
            response: response.clone(),
            body: reply.body.clone(),
            replayed: false,
        };

        let recorder = self.recorder;
        let id = self.id;
        let delivered_body = reply.body;
        tokio::spawn(async move {
            let status = response.status;
            let event_body = delivered_body.clone();

            let (recorded, outcome) = match filtered {
                Some(filtered_request) => {
                    match apply_response_filters(recorder.filters(), response, delivered_body) {
                        Some((filtered_response, filtered_body)) => {
                            let interaction = Interaction::new(
                                filtered_request,
                                filtered_response,
                                filtered_body.map(|bytes| Body::from_bytes(&bytes)),
                            );
                            (Some(interaction), TaskOutcome::Recorded)
                        }
                        None => (None, TaskOutcome::Skipped),
                    }
                }
                None => (None, TaskOutcome::Skipped),
            };

            debug!("Task {} finished: {:?}", id, outcome);
            recorder.finish_task(
                id,
                recorded,
                Some(TaskEvent {
                    task_id: id,
                    status,
                    body: event_body,
                    outcome,
                }),
            );
        });

        Ok(output)
    }
}
