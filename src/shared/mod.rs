//! Shared utilities used across the messaging core.
//!
//! This module provides:
//! - `error`: the typed failure taxonomy for capture, compose and store paths

pub mod error;

pub use error::{AudioError, CaptureError, ComposeError, ConfigError, StoreError, UploadError};
