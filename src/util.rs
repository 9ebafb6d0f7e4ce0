//! Small pure helpers shared across the messaging core.

use std::time::{SystemTime, UNIX_EPOCH};

/// Format an elapsed-seconds counter as a zero-padded `MM:SS` clock.
///
/// Used for the live recording timer.
pub fn format_clock(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// Format a playback time as `M:SS`.
///
/// Unknown, zero or non-finite durations render as `0:00`.
pub fn format_playback_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Build a `data:` URL from a MIME type and raw bytes.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, base64_simd::STANDARD.encode_to_string(bytes))
}

/// Parse a base64 `data:` URL back into its MIME type and raw bytes.
///
/// Returns `None` for anything that isn't a well-formed base64 data URL.
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = base64_simd::STANDARD.decode_to_vec(payload).ok()?;
    Some((mime.to_string(), bytes))
}

/// Map a file extension to the MIME type used for upload.
pub fn mime_from_extension(extension: &str) -> String {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Map a MIME type back to a file extension, for payloads that arrive as
/// data URLs.
pub fn extension_from_mime(mime: &str) -> String {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "audio/wav" => "wav",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
    .to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
