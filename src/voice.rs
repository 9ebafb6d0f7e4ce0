//! Voice message capture.
//!
//! [`AudioCaptureController`] owns the microphone lifecycle: it acquires an
//! input stream through a [`CaptureBackend`], buffers incoming samples,
//! tracks elapsed time, and finalizes captured audio into a WAV payload.
//! Every exit path (stop, cancel, error, drop) converges on the same
//! idempotent cleanup routine.
//!
//! The controller itself is backend-agnostic; [`CpalBackend`] is the
//! production implementation over the system's default input device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::Serialize;
use tracing::{debug, warn};

use crate::audio;
use crate::config::MessagingConfig;
use crate::shared::CaptureError;

/// Shared buffer the backend appends captured mono samples into.
pub type SampleSink = Arc<Mutex<Vec<i16>>>;

/// Capture lifecycle states.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Recording,
    /// Buffered chunks are being assembled into a payload. Brief and
    /// internal to [`AudioCaptureController::stop`].
    Finalizing,
}

/// A live capture session handed out by a backend. Releasing stops sample
/// delivery and frees the underlying device; it must be safe to call more
/// than once.
pub trait CaptureHandle: Send {
    /// Native sample rate of the delivered samples.
    fn sample_rate(&self) -> u32;

    /// Stop delivery and release the device. Idempotent.
    fn release(&mut self);
}

/// Microphone access abstraction, so the capture state machine stays
/// platform-agnostic and unit-testable without real hardware.
pub trait CaptureBackend: Send + Sync {
    /// Request exclusive access to an input stream that appends mono i16
    /// samples into `sink` until released.
    fn acquire(&self, sink: SampleSink) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// A finalized voice recording ready for upload.
#[derive(Clone, Debug)]
pub struct Recording {
    /// Complete WAV payload (mono, 16-bit).
    pub wav: Vec<u8>,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Owns the microphone resource lifecycle for one composer.
pub struct AudioCaptureController {
    backend: Box<dyn CaptureBackend>,
    target_sample_rate: u32,
    min_payload_bytes: usize,
    state: CaptureState,
    sink: SampleSink,
    handle: Option<Box<dyn CaptureHandle>>,
    started_at: Option<Instant>,
}

impl AudioCaptureController {
    /// Controller over the system's default input device.
    pub fn new(config: &MessagingConfig) -> Self {
        Self::with_backend(Box::new(CpalBackend), config)
    }

    pub fn with_backend(backend: Box<dyn CaptureBackend>, config: &MessagingConfig) -> Self {
        Self {
            backend,
            target_sample_rate: config.target_sample_rate,
            min_payload_bytes: config.min_voice_payload_bytes,
            state: CaptureState::Idle,
            sink: Arc::new(Mutex::new(Vec::new())),
            handle: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Elapsed recording time at 1-second resolution; 0 while idle.
    pub fn elapsed_secs(&self) -> u64 {
        self.started_at.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// The elapsed time rendered as an `MM:SS` clock for the live timer.
    pub fn elapsed_label(&self) -> String {
        crate::util::format_clock(self.elapsed_secs())
    }

    /// Request the microphone and begin buffering samples.
    ///
    /// Microphone ownership is exclusive and fail-fast: calling `start`
    /// while a session is live returns [`CaptureError::CaptureBusy`] and
    /// leaves the live session untouched. On acquisition failure the full
    /// cleanup routine runs defensively and the error is surfaced.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::CaptureBusy);
        }

        if let Ok(mut sink) = self.sink.lock() {
            sink.clear();
        }

        match self.backend.acquire(Arc::clone(&self.sink)) {
            Ok(handle) => {
                debug!(sample_rate = handle.sample_rate(), "recording started");
                self.handle = Some(handle);
                self.started_at = Some(Instant::now());
                self.state = CaptureState::Recording;
                Ok(())
            }
            Err(err) => {
                self.cleanup();
                Err(err)
            }
        }
    }

    /// Stop the session.
    ///
    /// With `send == false` the buffered audio is discarded and `Ok(None)`
    /// is returned. With `send == true` the buffer is resampled to the
    /// target rate and assembled into a WAV payload; a payload below the
    /// configured minimum is discarded and reported as
    /// [`CaptureError::RecordingTooShort`], producing no message. Calling
    /// `stop` while idle just re-runs cleanup.
    pub fn stop(&mut self, send: bool) -> Result<Option<Recording>, CaptureError> {
        if self.state != CaptureState::Recording {
            self.cleanup();
            return Ok(None);
        }

        self.state = CaptureState::Finalizing;

        let source_rate = self
            .handle
            .as_ref()
            .map(|h| h.sample_rate())
            .unwrap_or(self.target_sample_rate);

        // Release the device before touching the buffer so no further
        // samples arrive while we assemble the payload.
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }

        let samples = match self.sink.lock() {
            Ok(mut sink) => std::mem::take(&mut *sink),
            Err(_) => Vec::new(),
        };

        if !send {
            debug!("recording cancelled, {} samples discarded", samples.len());
            self.cleanup();
            return Ok(None);
        }

        let result = self.finalize(&samples, source_rate);
        self.cleanup();
        result.map(Some)
    }

    /// Abandon the session without producing a message.
    pub fn cancel(&mut self) {
        let _ = self.stop(false);
    }

    fn finalize(&self, samples: &[i16], source_rate: u32) -> Result<Recording, CaptureError> {
        let resampled = audio::resample_mono_i16(samples, source_rate, self.target_sample_rate)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        let wav = audio::encode_wav_mono16(&resampled, self.target_sample_rate)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        // An immediate stop produces an all-but-empty payload; treat it the
        // same as any other too-short recording.
        if wav.len() < self.min_payload_bytes {
            return Err(CaptureError::RecordingTooShort {
                size: wav.len(),
                min: self.min_payload_bytes,
            });
        }

        Ok(Recording {
            duration_secs: resampled.len() as f64 / self.target_sample_rate as f64,
            wav,
            sample_rate: self.target_sample_rate,
        })
    }

    /// The cleanup routine every exit path converges on: release the input
    /// stream, discard buffered samples, clear the timer, reset to idle.
    /// Safe to call any number of times, in any state.
    pub fn cleanup(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        if let Ok(mut sink) = self.sink.lock() {
            sink.clear();
        }
        self.started_at = None;
        self.state = CaptureState::Idle;
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ============================================================================
// cpal backend
// ============================================================================

/// Ordered capture-format preference. The first format the device supports
/// wins; this is capability negotiation, not user configuration.
const PREFERRED_FORMATS: [cpal::SampleFormat; 3] = [
    cpal::SampleFormat::F32,
    cpal::SampleFormat::I16,
    cpal::SampleFormat::U16,
];

/// Production [`CaptureBackend`] over the system default input device.
pub struct CpalBackend;

impl CpalBackend {
    fn select_input_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, CaptureError> {
        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| CaptureError::MicrophoneUnavailable(e.to_string()))?
            .collect();

        for format in PREFERRED_FORMATS {
            if let Some(range) = ranges.iter().find(|r| r.sample_format() == format) {
                return Ok(range.clone().with_max_sample_rate());
            }
        }

        // Nothing from the preference list; fall back to the device default
        device
            .default_input_config()
            .map_err(|e| CaptureError::MicrophoneUnavailable(e.to_string()))
    }
}

impl CaptureBackend for CpalBackend {
    fn acquire(&self, sink: SampleSink) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::MicrophoneUnavailable("no input device found".to_string()))?;

        let supported = Self::select_input_config(&device)?;
        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        let live = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        // cpal streams are not Send on every platform; build and own the
        // stream on a dedicated thread that parks until released.
        let live_for_thread = Arc::clone(&live);
        std::thread::spawn(move || {
            let config: cpal::StreamConfig = supported.into();
            let err_fn = |err| warn!("input stream error: {}", err);

            let stream = match sample_format {
                cpal::SampleFormat::F32 => {
                    let sink = Arc::clone(&sink);
                    let live = Arc::clone(&live_for_thread);
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &_| {
                            push_frames(&sink, &live, channels, data, |s| {
                                (s * 32768.0).clamp(-32768.0, 32767.0) as i16
                            });
                        },
                        err_fn,
                        None,
                    )
                }
                cpal::SampleFormat::I16 => {
                    let sink = Arc::clone(&sink);
                    let live = Arc::clone(&live_for_thread);
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &_| {
                            push_frames(&sink, &live, channels, data, |s| s);
                        },
                        err_fn,
                        None,
                    )
                }
                cpal::SampleFormat::U16 => {
                    let sink = Arc::clone(&sink);
                    let live = Arc::clone(&live_for_thread);
                    device.build_input_stream(
                        &config,
                        move |data: &[u16], _: &_| {
                            push_frames(&sink, &live, channels, data, |s| {
                                (s as i32 - 32768) as i16
                            });
                        },
                        err_fn,
                        None,
                    )
                }
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until release; dropping the stream stops the tracks
            let _ = stop_rx.recv();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureHandle {
                sample_rate,
                live,
                stop_tx: Some(stop_tx),
            })),
            Ok(Err(e)) => Err(CaptureError::MicrophoneUnavailable(e)),
            Err(_) => Err(CaptureError::MicrophoneUnavailable(
                "capture thread exited before the stream was ready".to_string(),
            )),
        }
    }
}

/// Downmix interleaved frames to mono and append them to the sink.
fn push_frames<S: Copy>(
    sink: &SampleSink,
    live: &AtomicBool,
    channels: usize,
    data: &[S],
    convert: impl Fn(S) -> i16,
) {
    if !live.load(Ordering::SeqCst) {
        return;
    }
    if let Ok(mut guard) = sink.lock() {
        if channels <= 1 {
            guard.extend(data.iter().map(|&s| convert(s)));
        } else {
            guard.extend(data.chunks(channels).map(|frame| {
                let sum: i32 = frame.iter().map(|&s| convert(s) as i32).sum();
                (sum / frame.len() as i32) as i16
            }));
        }
    }
}

struct CpalCaptureHandle {
    sample_rate: u32,
    live: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl CaptureHandle for CpalCaptureHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CpalCaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Backend that delivers a fixed sample buffer, or fails like a denied
    /// permission prompt.
    struct FakeBackend {
        samples: Vec<i16>,
        sample_rate: u32,
        deny: bool,
        releases: Arc<AtomicUsize>,
    }

    struct FakeHandle {
        sample_rate: u32,
        releases: Arc<AtomicUsize>,
    }

    impl CaptureHandle for FakeHandle {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CaptureBackend for FakeBackend {
        fn acquire(&self, sink: SampleSink) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            if self.deny {
                return Err(CaptureError::MicrophoneUnavailable(
                    "permission denied".to_string(),
                ));
            }
            sink.lock().unwrap().extend_from_slice(&self.samples);
            Ok(Box::new(FakeHandle {
                sample_rate: self.sample_rate,
                releases: Arc::clone(&self.releases),
            }))
        }
    }

    fn controller(samples: Vec<i16>, deny: bool) -> (AudioCaptureController, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend {
            samples,
            sample_rate: 16_000,
            deny,
            releases: Arc::clone(&releases),
        };
        let config = MessagingConfig::default();
        (
            AudioCaptureController::with_backend(Box::new(backend), &config),
            releases,
        )
    }

    #[test]
    fn test_start_stop_produces_recording() {
        let (mut rec, releases) = controller(vec![100i16; 16_000], false);

        rec.start().unwrap();
        assert!(rec.is_recording());

        let recording = rec.stop(true).unwrap().expect("should produce a payload");
        assert_eq!(recording.sample_rate, 16_000);
        assert!((recording.duration_secs - 1.0).abs() < 0.05);
        assert!(recording.wav.len() > 100);

        assert_eq!(rec.state(), CaptureState::Idle);
        assert!(releases.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_second_start_fails_fast() {
        let (mut rec, _) = controller(vec![0i16; 1000], false);
        rec.start().unwrap();
        assert!(matches!(rec.start(), Err(CaptureError::CaptureBusy)));
        // The live session is untouched
        assert!(rec.is_recording());
    }

    #[test]
    fn test_cancel_discards_buffer() {
        let (mut rec, releases) = controller(vec![100i16; 16_000], false);
        rec.start().unwrap();

        assert!(rec.stop(false).unwrap().is_none());
        assert_eq!(rec.state(), CaptureState::Idle);
        assert!(rec.sink.lock().unwrap().is_empty());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_permission_failure_leaves_clean_idle_state() {
        let (mut rec, _) = controller(Vec::new(), true);

        let err = rec.start().unwrap_err();
        assert!(matches!(err, CaptureError::MicrophoneUnavailable(_)));
        assert_eq!(rec.state(), CaptureState::Idle);
        assert_eq!(rec.elapsed_secs(), 0);
        assert!(rec.handle.is_none());
    }

    #[test]
    fn test_immediate_stop_is_too_short() {
        // Zero captured chunks
        let (mut rec, _) = controller(Vec::new(), false);
        rec.start().unwrap();

        let err = rec.stop(true).unwrap_err();
        assert!(matches!(err, CaptureError::RecordingTooShort { .. }));
        assert_eq!(rec.state(), CaptureState::Idle);
    }

    #[test]
    fn test_payload_under_minimum_is_too_short() {
        // A handful of samples encodes to less than the 100-byte minimum
        let (mut rec, _) = controller(vec![5i16; 10], false);
        rec.start().unwrap();

        let err = rec.stop(true).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::RecordingTooShort { size, min } if size < min
        ));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let (mut rec, releases) = controller(vec![1i16; 100], false);
        rec.start().unwrap();

        rec.cleanup();
        assert_eq!(rec.state(), CaptureState::Idle);
        rec.cleanup();
        assert_eq!(rec.state(), CaptureState::Idle);
        // Only the first cleanup held a handle to release
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_while_idle_is_a_clean_no_op() {
        let (mut rec, _) = controller(Vec::new(), false);
        assert!(rec.stop(true).unwrap().is_none());
        assert_eq!(rec.state(), CaptureState::Idle);
    }

    #[test]
    fn test_restart_after_failure_succeeds() {
        let releases = Arc::new(AtomicUsize::new(0));
        let config = MessagingConfig::default();
        let mut rec = AudioCaptureController::with_backend(
            Box::new(FakeBackend {
                samples: vec![10i16; 16_000],
                sample_rate: 16_000,
                deny: false,
                releases: Arc::clone(&releases),
            }),
            &config,
        );

        rec.start().unwrap();
        rec.cancel();
        rec.start().unwrap();
        assert!(rec.stop(true).unwrap().is_some());
    }
}
