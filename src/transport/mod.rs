//! Backing transport abstraction
//!
//! The recorder performs real network calls through a [`Transport`]
//! object, so tests can swap the network out for a scripted double while
//! production code uses the hyper-backed client.

mod hyper;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::cassette::{Request, Response};
use crate::error::{OverdubError, Result};

pub use self::hyper::HyperTransport;

/// What a transport hands back for one performed request.
///
/// A successful HTTP exchange carries a response head; `response: None`
/// models a transport that completed without one, which the recorder
/// treats as fatal.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Response head, if the transport produced one
    pub response: Option<Response>,
    /// Response body, if any
    pub body: Option<Bytes>,
}

impl Reply {
    /// A reply carrying a response head and optional body.
    #[must_use]
    pub fn ok(response: Response, body: Option<Bytes>) -> Self {
        Self {
            response: Some(response),
            body,
        }
    }

    /// A reply with no response head at all.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            response: None,
            body: None,
        }
    }
}

/// Performs real HTTP calls on behalf of a recorder.
///
/// Implementations receive the caller's original request, untouched by
/// any filter, and must resolve to exactly one reply or error.
pub trait Transport: Send + Sync {
    /// Perform `request` against the real network.
    fn perform<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Reply>>;
}

/// A transport double that serves scripted replies in order.
///
/// Each performed call pops the next queued outcome; running past the end
/// of the script yields a transport error. The requests actually
/// performed are retained for inspection.
#[derive(Default)]
pub struct StaticTransport {
    script: Mutex<VecDeque<Result<Reply>>>,
    performed: Mutex<Vec<Request>>,
    calls: AtomicUsize,
}

impl StaticTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn enqueue(&self, reply: Reply) {
        self.lock_script().push_back(Ok(reply));
    }

    /// Queue a transport failure.
    pub fn enqueue_err(&self, error: OverdubError) {
        self.lock_script().push_back(Err(error));
    }

    /// Number of calls performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The requests performed so far, in call order.
    #[must_use]
    pub fn performed(&self) -> Vec<Request> {
        self.performed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Reply>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for StaticTransport {
    fn perform<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Reply>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.performed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let next = self.lock_script().pop_front();

        Box::pin(async move {
            next.unwrap_or_else(|| {
                Err(OverdubError::Transport(
                    "static transport script exhausted".to_string(),
                ))
            })
        })
    }
}
