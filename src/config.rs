//! Runtime configuration for the messaging core.
//!
//! Hosts construct a [`MessagingConfig`] once and hand it to the components
//! that need it. Every field has a sensible default, so `Default::default()`
//! is a valid production configuration apart from the upload endpoint.

use serde::Deserialize;

use crate::shared::ConfigError;

/// Sample rate voice recordings are resampled to before encoding.
///
/// 16 kHz mono is a good quality-to-size ratio for speech.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;

/// Minimum assembled payload size for a voice message. Anything smaller is
/// treated as an accidental tap on the record button.
pub const DEFAULT_MIN_VOICE_PAYLOAD_BYTES: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Target sample rate for finalized voice recordings.
    pub target_sample_rate: u32,
    /// Minimum WAV payload size below which a recording is discarded.
    pub min_voice_payload_bytes: usize,
    /// Endpoint of the durable media storage service.
    pub upload_endpoint: Option<String>,
    /// Per-request timeout for media uploads.
    pub upload_timeout_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            min_voice_payload_bytes: DEFAULT_MIN_VOICE_PAYLOAD_BYTES,
            upload_endpoint: None,
            upload_timeout_secs: 30,
        }
    }
}

impl MessagingConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}
