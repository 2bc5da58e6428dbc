//! One-shot readiness handshakes with timeout and cancellation
//!
//! Used while installing a core: the audio callback and the core worker each
//! signal once when they are ready, and `install` waits for that signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

use crate::error::HandshakeError;

/// How often a waiter re-checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(5);

/// Shared flag for aborting an in-flight handshake from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear a previous cancellation so the token can guard the next install.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sending half of a handshake.
#[derive(Debug)]
pub struct Signal<T> {
    tx: SyncSender<T>,
}

impl<T> Signal<T> {
    /// Deliver the value. Returns false if the waiter already gave up.
    pub fn send(self, value: T) -> bool {
        self.tx.try_send(value).is_ok()
    }
}

/// Receiving half of a handshake.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: Receiver<T>,
    what: &'static str,
}

impl<T> Waiter<T> {
    /// Block until the signal arrives, `timeout` elapses or `cancel` fires.
    ///
    /// A dropped [`Signal`] counts as cancellation. A timeout too large to
    /// represent as a deadline waits without one.
    pub fn wait(self, timeout: Duration, cancel: &CancelToken) -> Result<T, HandshakeError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if cancel.is_cancelled() {
                return Err(HandshakeError::Cancelled { what: self.what });
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(HandshakeError::Timeout { what: self.what });
                    }
                    (deadline - now).min(CANCEL_POLL)
                }
                None => CANCEL_POLL,
            };
            match self.rx.recv_timeout(slice) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(HandshakeError::Cancelled { what: self.what });
                }
            }
        }
    }
}

/// Create a connected signal/waiter pair. `what` names the handshake in errors.
pub fn handshake<T>(what: &'static str) -> (Signal<T>, Waiter<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Signal { tx }, Waiter { rx, what })
}
