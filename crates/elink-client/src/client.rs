use std::fmt;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use elink_frame::{
    command_name, FrameDecoder, FrameError, FrameEvent, Packet, RequestBuilder, Response,
    CALLBACK_RESPONSE, VALUE_RESPONSE,
};
use elink_transport::SerialPort;
use tracing::{debug, trace, warn};

use crate::callback::{Callback, CallbackRegistry, CallbackToken};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::pending::{PendingCall, Reply};
use crate::stats::LinkStats;
use crate::sync::{SyncState, SyncTracker};

const READ_CHUNK: usize = 64;

type TextHook = Box<dyn FnMut(&[u8]) + Send>;

/// Protocol engine bound to one serial port.
///
/// Nothing happens in the background. Incoming traffic is processed only
/// inside [`drain_incoming`](Self::drain_incoming), and inside the blocking
/// helpers that call it in a loop. Callbacks run on the caller's stack and
/// may re-enter the client.
///
/// One client per port. To drive it from several threads, put it behind a
/// `Mutex`; concurrent waits are otherwise a caller error.
pub struct Client<P> {
    pub(crate) port: P,
    decoder: FrameDecoder,
    // Bytes read from the port but not yet fed to the decoder. Shared by
    // nested drains so bytes are decoded strictly in arrival order.
    staged: BytesMut,
    pub(crate) pending: PendingCall,
    pub(crate) callbacks: CallbackRegistry<P>,
    pub(crate) stats: LinkStats,
    pub(crate) sync: SyncTracker,
    config: ClientConfig,
    text_hook: Option<TextHook>,
}

impl<P: SerialPort> Client<P> {
    /// Client with the default configuration.
    pub fn new(port: P) -> Self {
        Self::with_config(port, ClientConfig::default())
    }

    /// Client with an explicit configuration.
    ///
    /// The configuration is taken as is; see [`ClientConfig::validate`].
    pub fn with_config(port: P, config: ClientConfig) -> Self {
        Self {
            port,
            decoder: FrameDecoder::with_capacity(config.rx_capacity, config.text_capacity),
            staged: BytesMut::with_capacity(READ_CHUNK),
            pending: PendingCall::default(),
            callbacks: CallbackRegistry::default(),
            stats: LinkStats::default(),
            sync: SyncTracker::new(),
            config,
            text_hook: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Number of successful synchronizations so far.
    pub fn sync_generation(&self) -> u64 {
        self.sync.generation()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port. Registered callbacks and buffered input are lost.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Receive every line of text the companion prints outside a frame.
    pub fn set_text_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.text_hook = Some(Box::new(hook));
    }

    // ---- requests ----

    /// Start a request. Arguments go straight to the port.
    ///
    /// `correlation` is zero for a request answered by a value response, or
    /// a [`CallbackToken`] value for one answered through a callback.
    pub fn open_request(
        &mut self,
        command: u16,
        correlation: u32,
        argc: u16,
    ) -> Result<RequestBuilder<'_, P>> {
        Ok(RequestBuilder::begin(&mut self.port, command, correlation, argc)?)
    }

    /// Send a complete request.
    pub fn send(&mut self, command: u16, correlation: u32, args: &[&[u8]]) -> Result<()> {
        let argc =
            u16::try_from(args.len()).map_err(|_| FrameError::Malformed("too many arguments"))?;
        let mut request = self.open_request(command, correlation, argc)?;
        for arg in args {
            request.arg(arg)?;
        }
        request.finish()?;
        Ok(())
    }

    /// Send a request and block for its value response.
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn call(
        &mut self,
        command: u16,
        args: &[&[u8]],
        timeout: Duration,
    ) -> Result<Option<Reply>> {
        self.send(command, 0, args)?;
        self.wait_for_reply(timeout)
    }

    // ---- callbacks ----

    /// Register a callback under a fresh token.
    pub fn register_callback<F>(&mut self, callback: F) -> CallbackToken
    where
        F: FnMut(&mut Client<P>, &mut Response<'_>) + Send + 'static,
    {
        let token = self.callbacks.allocate(Box::new(callback));
        trace!(%token, "callback registered");
        token
    }

    /// Register a callback under a specific token, replacing any previous
    /// one. Returns true if a registration was replaced.
    pub fn register_callback_at<F>(&mut self, token: CallbackToken, callback: F) -> bool
    where
        F: FnMut(&mut Client<P>, &mut Response<'_>) + Send + 'static,
    {
        self.register_boxed_at(token, Box::new(callback))
    }

    pub(crate) fn register_boxed_at(
        &mut self,
        token: CallbackToken,
        callback: Callback<P>,
    ) -> bool {
        let replaced = self.callbacks.insert(token, callback);
        trace!(%token, replaced, "callback registered at token");
        replaced
    }

    /// Remove a registration. Safe to call from inside the callback itself.
    pub fn unregister_callback(&mut self, token: CallbackToken) -> bool {
        self.callbacks.remove(token)
    }

    pub fn is_registered(&self, token: CallbackToken) -> bool {
        self.callbacks.contains(token)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    // ---- receiving ----

    /// Process everything the port has already received, without blocking.
    ///
    /// Returns how many packets were delivered to a waiter or a callback.
    /// Invalid or unexpected traffic is dropped and counted in
    /// [`stats`](Self::stats); only transport failures are errors.
    pub fn drain_incoming(&mut self) -> Result<usize> {
        let mut delivered = 0;
        loop {
            if !self.staged.has_remaining() && !self.refill()? {
                break;
            }
            let byte = self.staged.get_u8();
            if let Some(event) = self.decoder.push(byte) {
                if self.handle_event(event) {
                    delivered += 1;
                }
            }
        }
        Ok(delivered)
    }

    /// Block until a value response arrives or `timeout` elapses.
    ///
    /// Spins on [`drain_incoming`](Self::drain_incoming) without sleeping.
    /// At least one drain happens even with a zero timeout. Callback
    /// responses that arrive meanwhile are dispatched as usual and never
    /// complete the wait.
    pub fn wait_for_reply(&mut self, timeout: Duration) -> Result<Option<Reply>> {
        let deadline = deadline_after(timeout);
        let saved = self.pending.arm();
        let outcome = loop {
            if let Err(err) = self.drain_incoming() {
                break Err(err);
            }
            if let Some(reply) = self.pending.take() {
                break Ok(Some(reply));
            }
            if is_past(deadline) {
                break Ok(None);
            }
            std::hint::spin_loop();
        };
        self.pending.settle(saved);
        if let Ok(None) = outcome {
            debug!(timeout_ms = timeout.as_millis() as u64, "wait for reply timed out");
        }
        outcome
    }

    /// True while a [`wait_for_reply`](Self::wait_for_reply) is in progress,
    /// for example when checked from inside a callback.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_armed()
    }

    /// [`wait_for_reply`](Self::wait_for_reply) with the configured timeout.
    pub fn wait_for_default(&mut self) -> Result<Option<Reply>> {
        self.wait_for_reply(self.config.reply_timeout)
    }

    fn refill(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.port.read_available(&mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        self.staged.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn handle_event(&mut self, event: FrameEvent) -> bool {
        match event {
            FrameEvent::Frame(frame) => match Packet::validate(frame) {
                Ok(packet) => self.dispatch(packet),
                Err(err) => {
                    self.stats.record_rejected(&err);
                    debug!(error = %err, "dropping invalid frame");
                    false
                }
            },
            FrameEvent::Runt(len) => {
                self.stats.runts += 1;
                debug!(len, "dropping runt frame");
                false
            }
            FrameEvent::Overflow(len) => {
                self.stats.overflows += 1;
                debug!(len, capacity = self.decoder.capacity(), "dropping oversized frame");
                false
            }
            FrameEvent::Text(line) => {
                self.stats.text_lines += 1;
                debug!(text = %String::from_utf8_lossy(&line), "companion text");
                if let Some(hook) = self.text_hook.as_mut() {
                    hook(&line);
                }
                false
            }
        }
    }

    fn dispatch(&mut self, packet: Packet) -> bool {
        let command = packet.command();
        let value = packet.correlation();
        trace!(
            command,
            name = command_name(command),
            value,
            argc = packet.argc(),
            "packet received"
        );

        match command {
            VALUE_RESPONSE => {
                if self.pending.offer(packet) {
                    self.stats.values += 1;
                    self.stats.dispatched += 1;
                    true
                } else {
                    self.stats.unsolicited_values += 1;
                    debug!(value, "dropping value response with no wait armed");
                    false
                }
            }
            CALLBACK_RESPONSE => self.invoke_callback(packet),
            other => {
                self.stats.unhandled_commands += 1;
                debug!(command = other, name = command_name(other), "dropping unhandled command");
                false
            }
        }
    }

    fn invoke_callback(&mut self, packet: Packet) -> bool {
        let value = packet.correlation();
        if self.sync.state() == SyncState::Syncing {
            self.stats.discarded_while_syncing += 1;
            debug!(value, "dropping callback response while synchronizing");
            return false;
        }

        let Some(token) = CallbackToken::new(value) else {
            self.stats.orphan_callbacks += 1;
            debug!("dropping callback response with zero token");
            return false;
        };
        let Some((mut callback, lease)) = self.callbacks.take(token) else {
            self.stats.orphan_callbacks += 1;
            if self.callbacks.is_in_flight(token) {
                warn!(%token, "callback response for a callback that is still running; dropped");
            } else {
                debug!(%token, "dropping callback response for unregistered token");
            }
            return false;
        };

        self.stats.callbacks += 1;
        self.stats.dispatched += 1;
        let mut response = packet.response();
        callback(self, &mut response);
        self.callbacks.restore(token, lease, callback);
        true
    }
}

/// `None` when the timeout is too large to represent, meaning no deadline.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

pub(crate) fn is_past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

impl<P> fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("decoder", &self.decoder)
            .field("staged", &self.staged.len())
            .field("pending", &self.pending)
            .field("callbacks", &self.callbacks)
            .field("stats", &self.stats)
            .field("sync", &self.sync)
            .field("config", &self.config)
            .field("text_hook", &self.text_hook.is_some())
            .finish_non_exhaustive()
    }
}
