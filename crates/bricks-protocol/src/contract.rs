//! The service contract.
//!
//! `HelperProtocol` is the API the helper vends. Replies travel through a
//! [`Reply`] callback that must be invoked exactly once; ownership enforces
//! the "at most once" half, and [`PendingReply`] reports the "never" case as
//! [`ReplyDropped`] instead of leaving the caller waiting.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// API vended by the helper service.
///
/// Implementations hold no per-call state and may be invoked concurrently.
pub trait HelperProtocol: Send + Sync + 'static {
    /// Reply with `input` converted to uppercase.
    fn upper_case_string(&self, input: String, reply: Reply<String>);
}

/// One-shot reply callback handed to a [`HelperProtocol`] implementation.
#[derive(Debug)]
#[must_use = "a reply that is never sent resolves as ReplyDropped"]
pub struct Reply<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Reply<T> {
    /// Create a reply callback and the future that resolves when it fires.
    pub fn channel() -> (Reply<T>, PendingReply<T>) {
        let (tx, rx) = oneshot::channel();
        (Reply { tx }, PendingReply { rx })
    }

    /// Deliver the reply. Consumes the callback.
    ///
    /// Returns `false` when the waiting side has already gone away.
    pub fn send(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// The reply callback was released without being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("reply callback dropped without a reply")]
pub struct ReplyDropped;

/// Future side of a [`Reply`].
#[derive(Debug)]
pub struct PendingReply<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for PendingReply<T> {
    type Output = Result<T, ReplyDropped>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.map_err(|_| ReplyDropped))
    }
}
