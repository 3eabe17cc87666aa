//! Request timeout guard
//!
//! Every request is handled on its own spawned task while the guard waits for
//! one of three outcomes: the handler finishes, the handler task fails
//! (panics or produces an unreadable body), or the deadline passes. The
//! handler's response is buffered in a [`TimeoutWriter`] and only the first
//! outcome to claim the writer gets to answer; a response that arrives after
//! the timeout was sent is dropped.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, response::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::{task::JoinError, time::Instant};
use tracing::{debug, error, warn};

use crate::{context::RequestContext, error::AppError};

/// Longest budget the guard will honour; larger budgets are clamped to it
pub const MAX_HANDLER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Budget and response used by [`timeout_middleware`]
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub timeout: Duration,
    pub error: AppError,
}

impl TimeoutConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            error: AppError::ServiceUnavailable("Request took too long to process".to_string()),
        }
    }
}

/// Why the handler task ended without a response
#[derive(Debug, Error)]
pub enum WorkerFailure {
    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler task was cancelled")]
    Aborted,

    #[error("failed to buffer response body: {0}")]
    Body(String),
}

impl From<JoinError> for WorkerFailure {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return WorkerFailure::Aborted;
        }

        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        WorkerFailure::Panicked(message)
    }
}

#[derive(Debug, Default)]
struct WriterState {
    timed_out: bool,
    wrote_header: bool,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Buffer holding the handler's response until the guard commits it
#[derive(Debug, Clone, Default)]
pub struct TimeoutWriter {
    state: Arc<Mutex<WriterState>>,
}

impl TimeoutWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a finished response; returns false if the request already timed out
    pub fn write(&self, parts: Parts, body: Bytes) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.timed_out || state.wrote_header {
            return false;
        }

        state.wrote_header = true;
        state.status = parts.status;
        state.headers = parts.headers;
        state.body = body;
        true
    }

    /// Claim the writer for the timeout response
    ///
    /// Returns false if the handler's response was buffered first.
    pub fn time_out(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.wrote_header {
            return false;
        }
        state.timed_out = true;
        true
    }

    #[cfg(test)]
    fn timed_out(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timed_out
    }

    /// Move the buffered response out of the writer
    fn commit(&self) -> Option<Response> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.wrote_header || state.timed_out {
            return None;
        }

        let mut response = Response::new(Body::from(std::mem::take(&mut state.body)));
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        Some(response)
    }
}

fn deadline_after(now: Instant, budget: Duration) -> Instant {
    now.checked_add(budget.min(MAX_HANDLER_TIMEOUT))
        .unwrap_or(now)
}

/// Race the rest of the handler chain against the configured budget
pub async fn timeout_middleware(
    State(config): State<TimeoutConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    let deadline = deadline_after(Instant::now(), config.timeout);
    let (ctx, cancel) = RequestContext::with_deadline(deadline);
    req.extensions_mut().insert(ctx);

    let method = req.method().clone();
    let uri = req.uri().clone();

    let writer = TimeoutWriter::new();
    let worker_writer = writer.clone();
    let mut worker = tokio::spawn(async move {
        let response = next.run(req).await;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| WorkerFailure::Body(e.to_string()))?;

        if !worker_writer.write(parts, body) {
            debug!("Dropping response produced after the request timed out");
        }
        Ok::<(), WorkerFailure>(())
    });

    tokio::select! {
        joined = &mut worker => {
            match joined.map_err(WorkerFailure::from).and_then(|result| result) {
                Ok(()) => writer.commit().unwrap_or_else(|| {
                    error!("Handler for {} {} finished without a response", method, uri);
                    AppError::Internal.into_response()
                }),
                Err(failure) => {
                    error!("Handler for {} {} failed: {}", method, uri, failure);
                    AppError::Internal.into_response()
                }
            }
        }
        _ = tokio::time::sleep_until(deadline) => {
            if !writer.time_out() {
                // The handler buffered its response just before the deadline
                return writer.commit().unwrap_or_else(|| AppError::Internal.into_response());
            }

            cancel.cancel();
            warn!(
                "Request {} {} exceeded its {:?} budget",
                method, uri, config.timeout
            );
            config.error.into_response()
        }
    }
}
