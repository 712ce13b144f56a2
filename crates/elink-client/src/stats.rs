use elink_frame::FrameError;
use serde::Serialize;

/// Counters for everything the receiver saw on the link.
///
/// Dropped traffic is never an error for the caller; this is the only place
/// it shows up besides `debug!` logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Packets delivered to a waiter or a callback.
    pub dispatched: u64,
    /// Value responses that completed a wait.
    pub values: u64,
    /// Callback invocations.
    pub callbacks: u64,
    /// Frames shorter than a header plus checksum.
    pub runts: u64,
    /// Frames larger than the receive buffer.
    pub overflows: u64,
    /// Frames whose checksum did not match.
    pub checksum_failures: u64,
    /// Frames whose argument blocks did not line up.
    pub malformed: u64,
    /// Value responses that arrived with no wait armed.
    pub unsolicited_values: u64,
    /// Callback responses for a token with no registration.
    pub orphan_callbacks: u64,
    /// Packets with a command id the engine does not handle.
    pub unhandled_commands: u64,
    /// Callback responses dropped while a synchronize was in progress.
    pub discarded_while_syncing: u64,
    /// Lines of out-of-band text.
    pub text_lines: u64,
}

impl LinkStats {
    /// Total packets and frames dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.runts
            + self.overflows
            + self.checksum_failures
            + self.malformed
            + self.unsolicited_values
            + self.orphan_callbacks
            + self.unhandled_commands
            + self.discarded_while_syncing
    }

    pub(crate) fn record_rejected(&mut self, err: &FrameError) {
        match err {
            FrameError::TooShort { .. } => self.runts += 1,
            FrameError::ChecksumMismatch { .. } => self.checksum_failures += 1,
            _ => self.malformed += 1,
        }
    }
}
