//! Failure taxonomy for the messaging core.
//!
//! Each variant maps to a distinct user-visible (or deliberately invisible)
//! condition: a denied microphone is retryable, a too-short recording is a
//! silent cancellation, a failed upload or store append surfaces to the
//! caller with no local state to roll back.

use thiserror::Error;

/// Failures of the audio capture lifecycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Permission denied, no input device, or the device refused a stream.
    /// Recoverable, the user may retry.
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// The finalized payload came in under the configured minimum size.
    /// Treated as a silent cancellation rather than a hard error.
    #[error("recording too short ({size} bytes, minimum {min})")]
    RecordingTooShort { size: usize, min: usize },

    /// A capture session is already live. Exclusive microphone ownership is
    /// fail-fast: the first session keeps the device.
    #[error("a recording is already in progress")]
    CaptureBusy,

    /// Resampling or WAV assembly failed while finalizing.
    #[error("audio encoding failed: {0}")]
    Encode(String),
}

/// Failures while turning user input into a stored message.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Media upload to durable storage failed. No message was created and
    /// composer state is unchanged, so the user may simply retry.
    #[error("upload failed: {0}")]
    UploadFailed(#[from] UploadError),

    /// The store rejected the append. Nothing was inserted locally, so there
    /// is no optimistic state to roll back.
    #[error("send failed: {0}")]
    SendFailed(#[from] StoreError),

    /// Sending requires an open conversation; reaching this is a programming
    /// error in the caller, not a user-recoverable condition.
    #[error("no active conversation")]
    NoActiveConversation,
}

/// Failures reported by a [`MessageStore`](crate::store::MessageStore)
/// implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid message draft: {0}")]
    InvalidDraft(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a [`MediaUploader`](crate::store::MediaUploader)
/// implementation.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("malformed payload: {0}")]
    BadPayload(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server rejected upload: {0}")]
    Rejected(String),
}

/// Failures in the audio toolbox (decode, resample, WAV I/O).
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("failed to resample audio: {0}")]
    Resample(String),

    #[error("failed to write WAV data: {0}")]
    WavEncode(String),
}

/// Failure to parse a [`MessagingConfig`](crate::config::MessagingConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid upload endpoint: {0}")]
    BadEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
