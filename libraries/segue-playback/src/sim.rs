//! Simulated platform for tests and headless hosts
//!
//! [`SimulatedBuffer`] plays silence against a [`SimClock`] built on
//! `tokio::time::Instant`, so a runtime with paused time drives playback
//! deterministically. The recording collaborators capture what the engine
//! pushed out.

use crate::buffer::PlaybackBuffer;
use crate::collaborators::{
    AudioSession, NowPlayingInfo, NowPlayingSink, RemoteCommandCenter, SourceInfo, TrackSource,
};
use crate::error::{LoadError, SessionActivationError};
use crate::types::TrackRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Device clock: time elapsed since the clock was created
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: Instant,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum LibraryEntry {
    Playable(Duration),
    Unreadable(String),
    InvalidFormat,
}

/// In-memory track source keyed by locator
#[derive(Debug, Clone, Default)]
pub struct SimLibrary {
    entries: Arc<Mutex<HashMap<String, LibraryEntry>>>,
}

impl SimLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: impl Into<String>, duration: Duration) {
        lock(&self.entries).insert(locator.into(), LibraryEntry::Playable(duration));
    }

    pub fn insert_unreadable(&self, locator: impl Into<String>, reason: impl Into<String>) {
        lock(&self.entries).insert(locator.into(), LibraryEntry::Unreadable(reason.into()));
    }

    pub fn insert_invalid(&self, locator: impl Into<String>) {
        lock(&self.entries).insert(locator.into(), LibraryEntry::InvalidFormat);
    }
}

impl TrackSource for SimLibrary {
    fn resolve(&self, track: &TrackRef) -> Result<SourceInfo, LoadError> {
        match lock(&self.entries).get(&track.locator) {
            Some(LibraryEntry::Playable(duration)) => Ok(SourceInfo {
                duration: *duration,
            }),
            Some(LibraryEntry::Unreadable(reason)) => Err(LoadError::Unreadable {
                locator: track.locator.clone(),
                reason: reason.clone(),
            }),
            Some(LibraryEntry::InvalidFormat) => {
                Err(LoadError::InvalidFormat(track.locator.clone()))
            }
            None => Err(LoadError::NotFound(track.locator.clone())),
        }
    }
}

/// Calls a simulated buffer received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SimAction {
    Load(String),
    PlayNow,
    PlayAt(Duration),
    Pause,
    Stop,
    Seek(Duration),
}

#[derive(Debug, Default)]
struct SimState {
    track_id: Option<String>,
    duration: Duration,
    /// Position at `anchor`
    base: Duration,
    /// Device time playback (re)started or is scheduled to start
    anchor: Option<Duration>,
    rate: f32,
    actions: Vec<SimAction>,
}

impl SimState {
    fn position(&self, now: Duration) -> Duration {
        match self.anchor {
            Some(anchor) if now >= anchor => {
                let elapsed = now - anchor;
                let advanced = if (self.rate - 1.0).abs() < f32::EPSILON {
                    elapsed
                } else {
                    elapsed.mul_f64(f64::from(self.rate))
                };
                (self.base + advanced).min(self.duration)
            }
            _ => self.base,
        }
    }
}

/// Playback buffer that produces silence on the simulated device clock
pub struct SimulatedBuffer {
    name: String,
    clock: SimClock,
    source: Arc<dyn TrackSource>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBuffer {
    pub fn new(
        name: impl Into<String>,
        clock: SimClock,
        source: impl TrackSource + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            source: Arc::new(source),
            state: Arc::new(Mutex::new(SimState {
                rate: 1.0,
                ..SimState::default()
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only view that outlives handing the buffer to an engine
    pub fn observer(&self) -> SimObserver {
        SimObserver {
            clock: self.clock.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }
}

impl PlaybackBuffer for SimulatedBuffer {
    fn load(&mut self, track: &TrackRef) -> Result<(), LoadError> {
        let mut state = lock(&self.state);
        state.actions.push(SimAction::Load(track.id.clone()));
        state.anchor = None;
        state.base = Duration::ZERO;
        state.track_id = None;
        state.duration = Duration::ZERO;

        let info = self.source.resolve(track)?;
        state.track_id = Some(track.id.clone());
        state.duration = info.duration;
        Ok(())
    }

    fn prepare(&mut self) {}

    fn play_now(&mut self) {
        let now = self.now();
        let mut state = lock(&self.state);
        state.actions.push(SimAction::PlayNow);
        if state.track_id.is_some() {
            state.base = state.position(now);
            state.anchor = Some(now);
        }
    }

    fn play_at(&mut self, device_time: Duration) {
        let now = self.now();
        let mut state = lock(&self.state);
        state.actions.push(SimAction::PlayAt(device_time));
        if state.track_id.is_some() {
            state.base = state.position(now);
            state.anchor = Some(device_time.max(now));
        }
    }

    fn pause(&mut self) {
        let now = self.now();
        let mut state = lock(&self.state);
        state.actions.push(SimAction::Pause);
        state.base = state.position(now);
        state.anchor = None;
    }

    fn stop(&mut self) {
        let mut state = lock(&self.state);
        state.actions.push(SimAction::Stop);
        state.anchor = None;
        state.base = Duration::ZERO;
        state.track_id = None;
        state.duration = Duration::ZERO;
    }

    fn current_time(&self) -> Duration {
        lock(&self.state).position(self.now())
    }

    fn set_current_time(&mut self, position: Duration) {
        let now = self.now();
        let mut state = lock(&self.state);
        state.actions.push(SimAction::Seek(position));
        state.base = position.min(state.duration);
        if let Some(anchor) = state.anchor {
            state.anchor = Some(anchor.max(now));
        }
    }

    fn duration(&self) -> Duration {
        lock(&self.state).duration
    }

    fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    fn set_rate(&mut self, rate: f32) {
        let now = self.now();
        let mut state = lock(&self.state);
        if let Some(anchor) = state.anchor {
            state.base = state.position(now);
            state.anchor = Some(anchor.max(now));
        }
        state.rate = rate.max(0.0);
    }

    fn device_current_time(&self) -> Duration {
        self.now()
    }

    fn is_playing(&self) -> bool {
        let now = self.now();
        let state = lock(&self.state);
        matches!(state.anchor, Some(anchor) if now >= anchor) && state.position(now) < state.duration
    }
}

/// Observer of a [`SimulatedBuffer`] handed to an engine
#[derive(Clone)]
pub struct SimObserver {
    clock: SimClock,
    state: Arc<Mutex<SimState>>,
}

impl SimObserver {
    pub fn track_id(&self) -> Option<String> {
        lock(&self.state).track_id.clone()
    }

    pub fn is_playing(&self) -> bool {
        let now = self.clock.now();
        let state = lock(&self.state);
        matches!(state.anchor, Some(anchor) if now >= anchor) && state.position(now) < state.duration
    }

    /// A start is pending on the device clock
    pub fn is_scheduled(&self) -> bool {
        let now = self.clock.now();
        matches!(lock(&self.state).anchor, Some(anchor) if anchor > now)
    }

    pub fn current_time(&self) -> Duration {
        lock(&self.state).position(self.clock.now())
    }

    pub fn actions(&self) -> Vec<SimAction> {
        lock(&self.state).actions.clone()
    }
}

/// Audio session that records activation calls and can be told to fail
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    calls: Arc<Mutex<Vec<bool>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_activation(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    pub fn calls(&self) -> Vec<bool> {
        lock(&self.calls).clone()
    }
}

impl AudioSession for RecordingSession {
    fn set_active(&mut self, active: bool) -> Result<(), SessionActivationError> {
        lock(&self.calls).push(active);
        if *lock(&self.fail) {
            return Err(SessionActivationError("simulated activation failure".to_string()));
        }
        Ok(())
    }
}

/// Now-playing sink that keeps every snapshot
#[derive(Debug, Clone, Default)]
pub struct RecordingNowPlaying {
    updates: Arc<Mutex<Vec<NowPlayingInfo>>>,
}

impl RecordingNowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<NowPlayingInfo> {
        lock(&self.updates).clone()
    }
}

impl NowPlayingSink for RecordingNowPlaying {
    fn update(&mut self, info: &NowPlayingInfo) {
        lock(&self.updates).push(info.clone());
    }
}

/// Remote command center that records enable/disable calls
#[derive(Debug, Clone, Default)]
pub struct RecordingRemote {
    toggles: Arc<Mutex<Vec<bool>>>,
}

impl RecordingRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggles(&self) -> Vec<bool> {
        lock(&self.toggles).clone()
    }
}

impl RemoteCommandCenter for RecordingRemote {
    fn set_enabled(&mut self, enabled: bool) {
        lock(&self.toggles).push(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id, format!("/music/{id}.flac"), Duration::from_secs(5))
    }

    fn library() -> SimLibrary {
        let library = SimLibrary::new();
        library.insert("/music/t1.flac", Duration::from_secs(5));
        library.insert_unreadable("/music/broken.flac", "permission denied");
        library.insert_invalid("/music/cover.jpg.flac");
        library
    }

    #[test]
    fn library_reports_typed_errors() {
        let library = library();
        assert!(library.resolve(&track("t1")).is_ok());
        assert!(matches!(
            library.resolve(&track("broken")),
            Err(LoadError::Unreadable { .. })
        ));
        assert!(matches!(
            library.resolve(&track("cover.jpg")),
            Err(LoadError::InvalidFormat(_))
        ));
        assert!(matches!(
            library.resolve(&track("nope")),
            Err(LoadError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn position_follows_device_clock() {
        let clock = SimClock::new();
        let mut buffer = SimulatedBuffer::new("A", clock, library());
        buffer.load(&track("t1")).unwrap();
        buffer.play_now();

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(buffer.current_time(), Duration::from_millis(1500));
        assert!(buffer.is_playing());

        buffer.pause();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(buffer.current_time(), Duration::from_millis(1500));
        assert!(!buffer.is_playing());

        buffer.play_now();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(buffer.current_time(), Duration::from_secs(5));
        assert!(buffer.is_finished());
        assert!(!buffer.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_start_waits_for_device_time() {
        let clock = SimClock::new();
        let mut buffer = SimulatedBuffer::new("B", clock.clone(), library());
        let observer = buffer.observer();
        buffer.load(&track("t1")).unwrap();
        buffer.play_at(clock.now() + Duration::from_secs(2));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(observer.is_scheduled());
        assert_eq!(buffer.current_time(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(observer.is_playing());
        assert_eq!(buffer.current_time(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_scheduled_play() {
        let clock = SimClock::new();
        let mut buffer = SimulatedBuffer::new("B", clock.clone(), library());
        let observer = buffer.observer();
        buffer.load(&track("t1")).unwrap();
        buffer.play_at(clock.now() + Duration::from_secs(1));
        buffer.stop();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!observer.is_playing());
        assert!(observer.track_id().is_none());
        assert_eq!(
            observer.actions().last(),
            Some(&SimAction::Stop)
        );
    }
}
