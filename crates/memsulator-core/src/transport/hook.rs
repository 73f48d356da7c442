//! Receive hooks
//!
//! A [`Transport`](super::Transport) calls every registered hook, on its
//! worker thread, right after each inbound chunk is queued. Hooks are how
//! behaviour gets layered onto one concrete transport: the client tracks
//! replies with a [`ResponseSignal`], the emulator answers commands with an
//! auto-responder.

use std::io;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{lock, LinkHandle};
use crate::protocol::Frame;

/// Callback fired for every inbound chunk while the transport is connected
pub trait ReceiveHook: Send + Sync {
    /// A chunk has just been appended to the receive queue
    fn on_receive(&self, chunk: &Frame, link: &LinkHandle);

    /// The worker stopped on an I/O failure
    fn on_fault(&self, _error: &io::Error) {}
}

/// Result of waiting on a [`ResponseSignal`]
#[derive(Debug)]
pub enum Wake {
    /// The expected reply (or, if its length is unknown, its first chunk) arrived
    Ready,
    /// The bound elapsed first
    TimedOut,
    /// The transport failed while waiting
    Failed(io::Error),
}

#[derive(Debug, Default)]
struct PendingResponse {
    waiting: bool,
    expected: usize,
    received: usize,
    fault: Option<(io::ErrorKind, String)>,
}

/// Tracks whether a reply to the last request has fully arrived.
///
/// `arm` raises the flag before a request is queued; the flag drops once
/// `expected` bytes have been received, or on the first chunk when the
/// length is unknown (`expected == 0`). Waiters block on a condition
/// variable with an explicit bound.
#[derive(Debug, Default)]
pub struct ResponseSignal {
    state: Mutex<PendingResponse>,
    changed: Condvar,
}

impl ResponseSignal {
    /// Create an idle signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for a reply of `expected_len` bytes (0 = unknown)
    pub fn arm(&self, expected_len: usize) {
        let mut state = lock(&self.state);
        *state = PendingResponse {
            waiting: true,
            expected: expected_len,
            received: 0,
            fault: None,
        };
    }

    /// True while a reply is still outstanding
    pub fn is_waiting(&self) -> bool {
        lock(&self.state).waiting
    }

    /// Bytes received since the last `arm`
    pub fn received(&self) -> usize {
        lock(&self.state).received
    }

    /// Block until the reply is complete, the transport fails, or `timeout` passes
    pub fn wait(&self, timeout: Duration) -> Wake {
        let state = lock(&self.state);
        let (mut state, result) = self
            .changed
            .wait_timeout_while(state, timeout, |s| s.waiting)
            .unwrap_or_else(|e| e.into_inner());

        if let Some((kind, message)) = state.fault.take() {
            return Wake::Failed(io::Error::new(kind, message));
        }
        if result.timed_out() && state.waiting {
            return Wake::TimedOut;
        }
        Wake::Ready
    }

    /// Wait up to `gap` for more bytes beyond `seen`; returns the new total
    pub fn wait_for_more(&self, seen: usize, gap: Duration) -> usize {
        let deadline = Instant::now() + gap;
        let mut state = lock(&self.state);
        while state.received <= seen && state.fault.is_none() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        state.received
    }
}

impl ReceiveHook for ResponseSignal {
    fn on_receive(&self, chunk: &Frame, _link: &LinkHandle) {
        let mut state = lock(&self.state);
        state.received += chunk.len();
        if state.waiting && (state.expected == 0 || state.received >= state.expected) {
            state.waiting = false;
        }
        self.changed.notify_all();
    }

    fn on_fault(&self, error: &io::Error) {
        let mut state = lock(&self.state);
        state.fault = Some((error.kind(), error.to_string()));
        state.waiting = false;
        self.changed.notify_all();
    }
}
