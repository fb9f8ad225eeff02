//! SignalQueue: blocking hand-off of session-control signals.
//!
//! Any number of cloned [`SignalSender`]s feed one [`SignalQueue`], which the
//! controller thread drains with [`SignalQueue::dequeue_blocking`]. Producers
//! never block.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// Sent to a reply that is dropped without being answered.
pub const SHUTDOWN_REPLY: &str = "Error, controller shut down.";

/// Callback receiving the outcome of a signal, exactly once.
///
/// Dropping an unanswered reply answers it with [`SHUTDOWN_REPLY`].
pub struct Reply(Option<Box<dyn FnOnce(String) + Send>>);

impl Reply {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        Self(Some(Box::new(callback)))
    }

    /// Reply whose outcome is discarded.
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    /// Reply delivered through a oneshot channel.
    pub fn channel() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let reply = Self::new(move |message| {
            let _ = tx.send(message);
        });
        (reply, rx)
    }

    pub fn send(mut self, message: impl Into<String>) {
        if let Some(callback) = self.0.take() {
            callback(message.into());
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            callback(SHUTDOWN_REPLY.to_string());
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reply")
            .field(&if self.0.is_some() { "pending" } else { "answered" })
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    StartCapture,
    EndCapture,
}

/// A session-control event and the reply awaiting its outcome.
#[derive(Debug)]
pub enum Signal {
    StartCapture(Reply),
    EndCapture(Reply),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::StartCapture(_) => SignalKind::StartCapture,
            Self::EndCapture(_) => SignalKind::EndCapture,
        }
    }

    pub fn into_reply(self) -> Reply {
        match self {
            Self::StartCapture(reply) | Self::EndCapture(reply) => reply,
        }
    }
}

enum Envelope {
    Signal(Signal),
    Interrupt,
}

/// The queue has no consumer any more. The signal's reply was already
/// answered with [`SHUTDOWN_REPLY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signal queue is closed")]
pub struct QueueClosed;

/// A blocked dequeue was released without a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signal queue interrupted")]
pub struct Interrupted;

/// Producer half; cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl SignalSender {
    pub fn enqueue(&self, signal: Signal) -> Result<(), QueueClosed> {
        trace!("enqueue {:?}", signal.kind());
        // On failure the envelope is dropped here, which answers the reply
        self.tx.send(Envelope::Signal(signal)).map_err(|_| QueueClosed)
    }

    /// Release the consumer; it exits its loop.
    pub fn interrupt(&self) {
        let _ = self.tx.send(Envelope::Interrupt);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half. There is exactly one.
pub struct SignalQueue {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl SignalQueue {
    /// Block until a signal arrives.
    ///
    /// Returns [`Interrupted`] after an interrupt or once every sender is
    /// gone. Must not be called from inside an async runtime.
    pub fn dequeue_blocking(&mut self) -> Result<Signal, Interrupted> {
        match self.rx.blocking_recv() {
            Some(Envelope::Signal(signal)) => Ok(signal),
            Some(Envelope::Interrupt) | None => Err(Interrupted),
        }
    }
}

/// Create a connected sender/queue pair.
pub fn signal_queue() -> (SignalSender, SignalQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalQueue { rx })
}
