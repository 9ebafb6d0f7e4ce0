//! Audio toolbox for the messaging core.
//!
//! Provides:
//! - Mono i16 resampling (rubato, high-quality sinc interpolation)
//! - WAV assembly for finalized voice recordings (hound)
//! - Clip decoding and duration probing for playback (symphonia)

use std::io::Cursor;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::shared::AudioError;

/// Standard high-quality resampling parameters, tuned for voice.
fn resampling_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample mono i16 samples to a target sample rate.
///
/// Converts i16 to normalized f32, resamples, converts back.
pub fn resample_mono_i16(samples: &[i16], from_rate: u32, to_rate: u32) -> Result<Vec<i16>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let samples_f32: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        resampling_params(),
        samples.len(),
        1, // mono
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let waves_in = vec![samples_f32];
    let waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    Ok(waves_out
        .into_iter()
        .next()
        .unwrap_or_default()
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect())
}

/// Assemble mono 16-bit samples into an in-memory WAV payload.
pub fn encode_wav_mono16(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer: Vec<u8> = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)
            .map_err(|e| AudioError::WavEncode(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::WavEncode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::WavEncode(e.to_string()))?;
    }
    Ok(buffer)
}

/// A fully decoded audio clip: interleaved f32 samples plus stream metadata.
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedClip {
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels) as f64 / self.sample_rate as f64
    }
}

/// Metadata of a stored clip, as reported once "media loads".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipInfo {
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Decode an in-memory audio payload (wav, mp3, ogg) to interleaved samples.
pub fn decode_clip(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedClip, AudioError> {
    let media_source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let format_opts = FormatOptions::default();
    let meta_opts = MetadataOptions::default();
    let probed = symphonia::default::get_probe()
        .format(&hint, media_source, &format_opts, &meta_opts)
        .map_err(|e| AudioError::Decode(format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no supported audio tracks".to_string()))?;

    let track_id = track.id;
    let codec_params = &track.codec_params;

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("no decoder: {}", e)))?;

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;
    let channels = codec_params
        .channels
        .ok_or_else(|| AudioError::Decode("unknown channel count".to_string()))?
        .count();

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }
                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(_) => break,
        }
    }

    Ok(DecodedClip {
        samples,
        sample_rate,
        channels,
    })
}

/// Probe a stored clip for its metadata without keeping the samples around.
pub fn probe_clip(bytes: Vec<u8>, extension: Option<&str>) -> Result<ClipInfo, AudioError> {
    let clip = decode_clip(bytes, extension)?;
    Ok(ClipInfo {
        duration_secs: clip.duration_secs(),
        sample_rate: clip.sample_rate,
        channels: clip.channels,
    })
}
