//! Future-style correlation
//!
//! [`PendingResponse`] is what [`crate::CorrelationRegistry::track`] hands
//! back. It is a thin wrapper over a oneshot receiver whose sender lives in
//! the registry entry, so it settles exactly once: with the response on
//! `fire`, or with `Error::Timeout` when the entry expires.

use futures::FutureExt;
use jrmsg_core::{Error, Response, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A response that has not arrived yet
///
/// Dropping it does not remove the registry entry; the entry still expires
/// (or is consumed by a matching response) as usual.
#[derive(Debug)]
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<Result<Response>>,
}

impl PendingResponse {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<Response>>) -> Self {
        Self { id, rx }
    }

    /// Id of the request being waited on
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Sender dropped without sending: the entry was removed or replaced
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled(id))),
            Poll::Pending => Poll::Pending,
        }
    }
}
