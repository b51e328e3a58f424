//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference to a playable track
///
/// Immutable once enqueued. `duration` is the catalogue value until a buffer
/// has prepared the source, after which the buffer's duration is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    /// Opaque track identifier
    pub id: String,

    /// Locator the track source resolves (file path, URL, asset id)
    pub locator: String,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Handle to artwork owned by the host (optional)
    pub artwork: Option<String>,

    /// Track duration
    pub duration: Duration,
}

impl TrackRef {
    /// Create a track reference with empty display metadata
    pub fn new(id: impl Into<String>, locator: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
            title: String::new(),
            artist: String::new(),
            artwork: None,
            duration,
        }
    }

    /// Attach title and artist
    #[must_use]
    pub fn with_metadata(mut self, title: impl Into<String>, artist: impl Into<String>) -> Self {
        self.title = title.into();
        self.artist = artist.into();
        self
    }

    /// Attach an artwork handle
    #[must_use]
    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }
}

/// Coarse session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing has been played yet
    Initial,

    /// Currently playing
    Playing,

    /// Paused (also the state after stop)
    Paused,

    /// Paused by the operating environment (call, alarm)
    Interrupted,
}

/// Queue ordering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Play in insertion order
    Linear,

    /// Play a random permutation
    Shuffle,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    Off,

    /// Loop entire queue
    All,

    /// Loop current track only
    One,
}

/// Configuration for the playback engine
///
/// Times are stored as plain numbers so the struct can be layered from TOML
/// and environment variables; use the accessor methods for `Duration`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Remaining time (seconds) at which the standby buffer is armed (default: 2.0)
    pub gap_threshold_secs: f64,

    /// Dispatch latency added to the scheduled start (default: 10ms)
    pub lookahead_ms: u64,

    /// Delay from arm to selector flip (default: 2100ms)
    pub settle_delay_ms: u64,

    /// Remaining-time polling interval (default: 1000ms)
    pub poll_interval_ms: u64,

    /// Now-playing sink cadence (default: 700ms)
    pub now_playing_interval_ms: u64,

    /// "Previous" restarts the track when past this position (default: 3.0s)
    pub previous_restart_secs: f64,

    /// Flip lateness that is reported as an audible gap (default: 50ms)
    pub late_flip_tolerance_ms: u64,

    /// Push now-playing info while playing (default: true)
    pub update_now_playing: bool,

    /// Enable remote commands on first play (default: true)
    pub show_remote_controls: bool,

    /// Initial playback mode (default: Linear)
    pub playback_mode: PlaybackMode,

    /// Initial repeat mode (default: Off)
    pub repeat_mode: RepeatMode,

    /// Fixed shuffle seed for reproducible permutations (default: none)
    pub shuffle_seed: Option<u64>,

    /// Notification bus capacity (default: 64)
    pub event_capacity: usize,

    /// Player command channel capacity (default: 32)
    pub command_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 2.0,
            lookahead_ms: 10,
            settle_delay_ms: 2100,
            poll_interval_ms: 1000,
            now_playing_interval_ms: 700,
            previous_restart_secs: 3.0,
            late_flip_tolerance_ms: 50,
            update_now_playing: true,
            show_remote_controls: true,
            playback_mode: PlaybackMode::Linear,
            repeat_mode: RepeatMode::Off,
            shuffle_seed: None,
            event_capacity: 64,
            command_capacity: 32,
        }
    }
}

impl PlaybackConfig {
    pub fn gap_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.gap_threshold_secs.max(0.0))
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn now_playing_interval(&self) -> Duration {
        Duration::from_millis(self.now_playing_interval_ms)
    }

    pub fn previous_restart(&self) -> Duration {
        Duration::from_secs_f64(self.previous_restart_secs.max(0.0))
    }

    pub fn late_flip_tolerance(&self) -> Duration {
        Duration::from_millis(self.late_flip_tolerance_ms)
    }
}
