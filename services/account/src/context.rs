//! Request-scoped execution context
//!
//! A [`RequestContext`] carries the deadline and cancellation signal of the
//! request it was created for. The timeout guard installs one into the
//! request extensions; handlers pull it out with the extractor below and pass
//! it down to anything that performs I/O on the request's behalf.

use std::{convert::Infallible, future::Future};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use thiserror::Error;
use tokio::{sync::watch, time::Instant};

/// Returned by [`RequestContext::run`] when the context is cancelled first
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("request context cancelled")]
pub struct Cancelled;

/// Deadline and cancellation state shared by everything serving one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: watch::Receiver<bool>,
}

/// Owner side of a [`RequestContext`]
///
/// Cancelling (or dropping) the handle cancels every clone of the context.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the associated context
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        let (sender, cancelled) = watch::channel(false);
        // Without a sender the receiver reports "closed", which `cancelled`
        // treats as "never".
        drop(sender);
        Self {
            deadline: None,
            cancelled,
        }
    }

    /// A context bounded by `deadline`, plus the handle that cancels it early
    pub fn with_deadline(deadline: Instant) -> (Self, CancelHandle) {
        let (sender, cancelled) = watch::channel(false);
        let context = Self {
            deadline: Some(deadline),
            cancelled,
        };
        (context, CancelHandle { sender })
    }

    /// The instant after which the context counts as cancelled
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context has been cancelled or its deadline has passed
    pub fn is_cancelled(&self) -> bool {
        if *self.cancelled.borrow() {
            return true;
        }
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once the context is cancelled or its deadline passes
    ///
    /// Never resolves for a background context.
    pub async fn cancelled(&self) {
        let mut receiver = self.cancelled.clone();
        let signal = async move {
            if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signal => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signal.await,
        }
    }

    /// Drive `future` to completion unless the context is cancelled first
    pub async fn run<F, T>(&self, future: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            output = future => Ok(output),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(RequestContext::background))
    }
}
