use std::time::Duration;

use elink_frame::{DEFAULT_RX_CAPACITY, DEFAULT_TEXT_CAPACITY, MIN_FRAME_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default timeout for a blocking wait on a value response.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default timeout for [`Client::synchronize`](crate::Client::synchronize).
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_millis(2000);

/// Client tuning.
///
/// Serialized durations are whole milliseconds:
///
/// ```json
/// { "rx_capacity": 256, "reply_timeout_ms": 500 }
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Largest unescaped frame kept by the receiver. Larger frames are
    /// dropped and counted as overflows.
    pub rx_capacity: usize,
    /// Out-of-band text is surfaced in chunks of at most this many bytes.
    /// Zero discards it.
    pub text_capacity: usize,
    /// Timeout used by [`Client::wait_for_default`](crate::Client::wait_for_default).
    #[serde(rename = "reply_timeout_ms", with = "millis")]
    pub reply_timeout: Duration,
    /// Timeout used by [`Client::synchronize_default`](crate::Client::synchronize_default).
    #[serde(rename = "sync_timeout_ms", with = "millis")]
    pub sync_timeout: Duration,
    /// Forget every registered callback after a successful synchronize.
    pub clear_callbacks_on_sync: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rx_capacity: DEFAULT_RX_CAPACITY,
            text_capacity: DEFAULT_TEXT_CAPACITY,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            clear_callbacks_on_sync: true,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the receiver cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.rx_capacity < MIN_FRAME_SIZE {
            return Err(ClientError::InvalidConfig(format!(
                "rx_capacity {} is below the minimum frame size {}",
                self.rx_capacity, MIN_FRAME_SIZE
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
