//! Interfaces to the host platform
//!
//! The engine calls these; it never renders UI or negotiates audio routes
//! itself.

use crate::error::{LoadError, SessionActivationError};
use crate::types::TrackRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a track source reports about a resolvable track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub duration: Duration,
}

/// Resolves a track reference to a decodable source
pub trait TrackSource: Send + Sync {
    fn resolve(&self, track: &TrackRef) -> Result<SourceInfo, LoadError>;
}

/// Snapshot pushed to the lock screen / control center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
    pub elapsed: Duration,
    pub rate: f32,
    pub duration: Duration,
}

/// Receives now-playing snapshots on a fixed cadence while playing
pub trait NowPlayingSink: Send {
    fn update(&mut self, info: &NowPlayingInfo);
}

/// OS audio session (category, activation)
pub trait AudioSession: Send {
    fn set_active(&mut self, active: bool) -> Result<(), SessionActivationError>;
}

/// Remote-command surface (lock screen, headset buttons, media keys)
///
/// The engine supplies the handler bodies (see [`crate::RemoteCommand`]); the
/// host only needs to route events and honour bulk enable/disable.
pub trait RemoteCommandCenter: Send {
    fn set_enabled(&mut self, enabled: bool);
}

/// Session that always activates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudioSession;

impl AudioSession for NoopAudioSession {
    fn set_active(&mut self, _active: bool) -> Result<(), SessionActivationError> {
        Ok(())
    }
}

/// Sink that drops every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNowPlaying;

impl NowPlayingSink for NoopNowPlaying {
    fn update(&mut self, _info: &NowPlayingInfo) {}
}

/// Command center with nothing to toggle
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRemoteCommands;

impl RemoteCommandCenter for NoopRemoteCommands {
    fn set_enabled(&mut self, _enabled: bool) {}
}
