//! Synchronization with the companion.
//!
//! A synchronize tells the companion to drop its callback table and proves
//! that the link carries fresh traffic. It sends a lone END (so the companion
//! abandons any half-received frame), then a SYNC request whose correlation
//! is a nonce. Only a value response echoing that exact nonce counts. A
//! reply to an older request, sent before the companion reset, cannot match.

use std::time::{Duration, Instant};

use elink_frame::{Response, END, SYNC};
use elink_transport::{ByteSink, SerialPort};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::callback::{CallbackToken, NONCE_BIT};
use crate::client::{deadline_after, is_past, Client};
use crate::error::Result;

/// Link synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    /// Never synchronized, or the last attempt failed.
    Unsynced,
    /// A synchronize is in progress.
    Syncing,
    /// The last synchronize succeeded.
    Synced,
}

/// Returns true if `value` lies in the nonce space rather than the
/// callback-token space.
pub fn is_nonce(value: u32) -> bool {
    value & NONCE_BIT != 0
}

#[derive(Debug)]
pub(crate) struct SyncTracker {
    state: SyncState,
    generation: u64,
    last_nonce: Option<u32>,
    epoch: Instant,
}

impl SyncTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: SyncState::Unsynced,
            generation: 0,
            last_nonce: None,
            epoch: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> SyncState {
        self.state
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Microseconds since the tracker was created, with the nonce bit set.
    /// Never repeats the previous nonce.
    pub(crate) fn next_nonce(&mut self) -> u32 {
        // Truncation wraps after ~35 minutes; only adjacent nonces must differ.
        let micros = self.epoch.elapsed().as_micros() as u32;
        let mut nonce = micros | NONCE_BIT;
        if self.last_nonce == Some(nonce) {
            nonce = nonce.wrapping_add(1) | NONCE_BIT;
        }
        self.last_nonce = Some(nonce);
        nonce
    }
}

impl<P: SerialPort> Client<P> {
    /// Synchronize with the companion.
    ///
    /// Returns `Ok(true)` once the companion echoes this attempt's nonce,
    /// `Ok(false)` if `timeout` elapses first. Nothing is retried; call
    /// again on failure. Callback responses arriving while synchronizing are
    /// discarded. On success, registered callbacks are dropped when
    /// [`ClientConfig::clear_callbacks_on_sync`](crate::ClientConfig::clear_callbacks_on_sync)
    /// is set.
    pub fn synchronize(&mut self, timeout: Duration) -> Result<bool> {
        self.synchronize_inner(timeout).map(|nonce| nonce.is_some())
    }

    /// [`synchronize`](Self::synchronize) with the configured timeout.
    pub fn synchronize_default(&mut self) -> Result<bool> {
        self.synchronize(self.config().sync_timeout)
    }

    /// Synchronize, then register `on_status` for status reports.
    ///
    /// The companion addresses unsolicited status reports (for example
    /// network connectivity changes) to the nonce it was synchronized with,
    /// so the callback is registered under that value. Nothing is registered
    /// if the synchronize fails.
    pub fn synchronize_with_status<F>(&mut self, timeout: Duration, on_status: F) -> Result<bool>
    where
        F: FnMut(&mut Client<P>, &mut Response<'_>) + Send + 'static,
    {
        let Some(nonce) = self.synchronize_inner(timeout)? else {
            return Ok(false);
        };
        if let Some(token) = CallbackToken::new(nonce) {
            self.register_boxed_at(token, Box::new(on_status));
        }
        Ok(true)
    }

    fn synchronize_inner(&mut self, timeout: Duration) -> Result<Option<u32>> {
        self.sync.state = SyncState::Syncing;
        let outcome = self.run_sync(timeout);
        match &outcome {
            Ok(Some(nonce)) => {
                self.sync.state = SyncState::Synced;
                self.sync.generation += 1;
                if self.config().clear_callbacks_on_sync {
                    let dropped = self.callbacks.len();
                    self.callbacks.clear();
                    debug!(dropped, "cleared callbacks after synchronize");
                }
                info!(
                    nonce = %format_args!("{nonce:#010x}"),
                    generation = self.sync.generation,
                    "synchronized with companion"
                );
            }
            Ok(None) => {
                self.sync.state = SyncState::Unsynced;
                warn!(timeout_ms = timeout.as_millis() as u64, "synchronize timed out");
            }
            Err(_) => self.sync.state = SyncState::Unsynced,
        }
        outcome
    }

    fn run_sync(&mut self, timeout: Duration) -> Result<Option<u32>> {
        let deadline = deadline_after(timeout);
        ByteSink::write_bytes(&mut self.port, &[END])?;

        let nonce = self.sync.next_nonce();
        debug!(nonce = %format_args!("{nonce:#010x}"), "sending SYNC");
        self.send(SYNC, nonce, &[])?;

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            match self.wait_for_reply(remaining)? {
                Some(reply) if reply.value == nonce => return Ok(Some(nonce)),
                Some(reply) => {
                    debug!(
                        expected = nonce,
                        got = reply.value,
                        "ignoring stale reply while synchronizing"
                    );
                    if is_past(deadline) {
                        return Ok(None);
                    }
                }
                None => return Ok(None),
            }
        }
    }
}
