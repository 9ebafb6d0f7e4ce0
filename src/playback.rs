//! Per-message audio playback state machine.
//!
//! One [`AudioPlaybackController`] per rendered audio message. The machine
//! is platform-agnostic: the host's media layer executes the
//! [`PlaybackCommand`]s it returns and feeds back [`MediaEvent`]s
//! (metadata loaded, time update, ended). Duration is unknown until the
//! metadata event arrives; reaching end of media returns to idle with the
//! position reset to zero.

use serde::Serialize;
use tracing::debug;

use crate::util;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
    /// Only reachable from `Playing`.
    Paused,
}

/// Instruction for the host's media backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
}

/// Lifecycle notifications from the host's media backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaEvent {
    /// Media metadata became available.
    LoadedMetadata { duration_secs: f64 },
    /// Periodic position report while playing.
    TimeUpdate { position_secs: f64 },
    /// Playback reached the end of the clip.
    Ended,
}

pub struct AudioPlaybackController {
    state: PlaybackState,
    /// Unknown until metadata loads.
    duration_secs: Option<f64>,
    position_secs: f64,
}

impl AudioPlaybackController {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            duration_secs: None,
            position_secs: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    /// Flip between playing and paused (or start from idle). Returns the
    /// command the host's media backend must execute.
    pub fn toggle_play_pause(&mut self) -> PlaybackCommand {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Paused;
                PlaybackCommand::Pause
            }
            PlaybackState::Idle | PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                PlaybackCommand::Play
            }
        }
    }

    /// Apply a media lifecycle event from the host backend.
    pub fn apply(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata { duration_secs } => {
                // Streams can report a non-finite duration before fully
                // buffering; keep it unknown until a usable value arrives.
                if duration_secs.is_finite() && duration_secs > 0.0 {
                    self.duration_secs = Some(duration_secs);
                }
            }
            MediaEvent::TimeUpdate { position_secs } => {
                self.position_secs = position_secs.max(0.0);
            }
            MediaEvent::Ended => {
                debug!("playback ended");
                self.state = PlaybackState::Idle;
                self.position_secs = 0.0;
            }
        }
    }

    /// Playback progress as a fraction in `[0, 1]`; 0 while the duration is
    /// still unknown.
    pub fn progress(&self) -> f64 {
        match self.duration_secs {
            Some(duration) if duration > 0.0 => (self.position_secs / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// The clip duration rendered as `M:SS`, `0:00` while unknown.
    pub fn duration_label(&self) -> String {
        util::format_playback_time(self.duration_secs.unwrap_or(0.0))
    }

    /// Probe a locally held clip payload and apply its metadata, for hosts
    /// that download the message media before playing it.
    pub fn load_clip(
        &mut self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<crate::audio::ClipInfo, crate::shared::AudioError> {
        let info = crate::audio::probe_clip(bytes, extension)?;
        self.apply(MediaEvent::LoadedMetadata {
            duration_secs: info.duration_secs,
        });
        Ok(info)
    }
}

impl Default for AudioPlaybackController {
    fn default() -> Self {
        Self::new()
    }
}
