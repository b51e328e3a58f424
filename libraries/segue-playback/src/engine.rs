//! Playback engine - transport controller
//!
//! Owns the queue, the buffer pair, the gapless scheduler and the session.
//! Every public operation runs to completion on `&mut self`; events queued
//! while it runs are published once it has committed its changes.
//!
//! The engine has no timers of its own. A driver (see [`crate::Player`])
//! calls [`PlaybackEngine::poll`] on the poll cadence,
//! [`PlaybackEngine::publish_now_playing`] on the now-playing cadence, and
//! [`PlaybackEngine::on_deadline`] once [`PlaybackEngine::next_deadline`]
//! passes.

use crate::{
    buffer::{BufferId, BufferPair},
    collaborators::{
        AudioSession, NoopAudioSession, NoopNowPlaying, NoopRemoteCommands, NowPlayingInfo,
        NowPlayingSink, RemoteCommandCenter,
    },
    error::{PlaybackError, Result},
    events::{NotificationBus, PlaybackEvent},
    queue::{Queue, QueueSlot, Resolved},
    scheduler::{GaplessScheduler, PendingHandoff, Phase},
    session::Session,
    types::{PlaybackConfig, PlaybackMode, PlaybackState, RepeatMode, TrackRef},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Rates the platform buffers can play at
const MIN_RATE: f32 = 0.5;
const MAX_RATE: f32 = 2.0;

/// Point-in-time view of the engine for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: PlaybackState,
    pub playback_mode: PlaybackMode,
    pub repeat_mode: RepeatMode,
    pub current_track: Option<TrackRef>,
    pub position: Duration,
    pub duration: Duration,
    pub cursor: usize,
    pub queue_len: usize,
    pub active_buffer: BufferId,
    pub handoff_pending: bool,
}

pub struct PlaybackEngine {
    config: PlaybackConfig,
    queue: Queue,
    buffers: BufferPair,
    scheduler: GaplessScheduler,
    session: Session,
    bus: NotificationBus,

    audio_session: Box<dyn AudioSession>,
    now_playing: Box<dyn NowPlayingSink>,
    remote: Box<dyn RemoteCommandCenter>,

    // Surfaces switched on by the first play
    started: bool,
    remote_enabled: bool,
    now_playing_enabled: bool,
    session_active: bool,

    rate: f32,

    // Published at the end of each operation
    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Create an engine over a buffer pair, with no-op platform collaborators
    pub fn new(config: PlaybackConfig, buffers: BufferPair) -> Self {
        let session = Session::new(config.playback_mode, config.repeat_mode);
        Self {
            queue: Queue::new(config.shuffle_seed),
            scheduler: GaplessScheduler::new(&config),
            bus: NotificationBus::new(config.event_capacity),
            buffers,
            session,
            audio_session: Box::new(NoopAudioSession),
            now_playing: Box::new(NoopNowPlaying),
            remote: Box::new(NoopRemoteCommands),
            started: false,
            remote_enabled: false,
            now_playing_enabled: false,
            session_active: false,
            rate: 1.0,
            pending_events: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_audio_session(mut self, session: impl AudioSession + 'static) -> Self {
        self.audio_session = Box::new(session);
        self
    }

    #[must_use]
    pub fn with_now_playing(mut self, sink: impl NowPlayingSink + 'static) -> Self {
        self.now_playing = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_remote_commands(mut self, remote: impl RemoteCommandCenter + 'static) -> Self {
        self.remote = Box::new(remote);
        self
    }

    // ===== Transport =====

    /// Start or resume playback
    ///
    /// Loads the track under the cursor when nothing is bound. The first play
    /// also switches on remote controls and now-playing updates.
    pub fn play(&mut self) -> Result<()> {
        let result = self.start_playback();
        self.publish_events();
        result
    }

    fn start_playback(&mut self) -> Result<()> {
        if self.session.is_playing() {
            return Ok(());
        }

        if self.buffers.active().track().is_none() {
            let resolved = self
                .queue
                .resolve_start()
                .ok_or(PlaybackError::EmptyQueue)?;
            self.bind(resolved)?;
        } else if self.buffers.active().buffer().is_finished() {
            // Played out at the end of the queue: start it over
            self.buffers
                .active_mut()
                .buffer_mut()
                .set_current_time(Duration::ZERO);
            self.scheduler.on_track_activated();
        }

        if !self.started {
            self.started = true;
            self.enable_surfaces();
        }
        if !self.session_active {
            self.activate_session();
        }

        self.buffers.active_mut().buffer_mut().play_now();
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Pause; a no-op unless playing or interrupted
    pub fn pause(&mut self) {
        if matches!(
            self.session.state(),
            PlaybackState::Playing | PlaybackState::Interrupted
        ) {
            self.cancel_handoff("pause");
            self.buffers.active_mut().buffer_mut().pause();
            self.set_state(PlaybackState::Paused);
        }
        self.publish_events();
    }

    /// Pause, rewind to the start and release the audio session
    pub fn stop(&mut self) {
        self.cancel_handoff("stop");
        let active = self.buffers.active_mut().buffer_mut();
        active.pause();
        active.set_current_time(Duration::ZERO);
        self.deactivate_session();
        self.set_state(PlaybackState::Paused);
        self.publish_events();
    }

    /// Paused by the environment rather than the user
    pub(crate) fn mark_interrupted(&mut self) {
        self.set_state(PlaybackState::Interrupted);
        self.publish_events();
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.session.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Replace the current track with the next one right away
    ///
    /// Cancels any pending handoff. At the end of the queue (repeat off) this
    /// returns `EmptyQueue` and changes nothing.
    pub fn skip_to_next(&mut self) -> Result<()> {
        let result = self.advance();
        self.publish_events();
        result
    }

    fn advance(&mut self) -> Result<()> {
        let resolved = self.resolve_following().ok_or(PlaybackError::EmptyQueue)?;
        self.cancel_handoff("skip");
        self.replace_active(resolved)?;
        if self.session.is_playing() {
            self.buffers.active_mut().buffer_mut().play_now();
        }
        Ok(())
    }

    /// Restart the current track when past the restart threshold, otherwise
    /// do nothing
    pub fn skip_to_previous(&mut self) {
        if self.current_time() > self.config.previous_restart() {
            self.cancel_handoff("previous");
            self.buffers
                .active_mut()
                .buffer_mut()
                .set_current_time(Duration::ZERO);
            debug!("restarted current track");
        }
        self.publish_events();
    }

    /// Seek within the current track, clamped to its duration
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        if self.buffers.active().track().is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.cancel_handoff("seek");
        let buffer = self.buffers.active_mut().buffer_mut();
        let position = position.min(buffer.duration());
        buffer.set_current_time(position);
        debug!(position = ?position, "seek");
        self.publish_events();
        Ok(())
    }

    /// Change playback rate, clamped to 0.5..=2.0
    ///
    /// A scheduled handoff computed at the old rate is dropped and re-armed on
    /// the next poll.
    pub fn set_rate(&mut self, rate: f32) {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        };
        if (rate - self.rate).abs() > f32::EPSILON {
            self.cancel_handoff("rate change");
            self.rate = rate;
            self.buffers.active_mut().buffer_mut().set_rate(rate);
            debug!(rate, "rate changed");
        }
        self.publish_events();
    }

    // ===== Queue & modes =====

    /// Replace the queue; the cursor goes back to 0
    pub fn set_original_queue(&mut self, tracks: Vec<TrackRef>) {
        self.cancel_handoff("queue replaced");
        self.queue.set_original(tracks, self.session.playback_mode());
        info!(tracks = self.queue.len(), "queue replaced");
        self.pending_events.push(PlaybackEvent::QueueChanged);
        self.publish_events();
    }

    /// Rebuild the active queue under the current playback mode
    pub fn set_queue(&mut self) {
        self.rebuild_queue();
        self.publish_events();
    }

    fn rebuild_queue(&mut self) {
        self.cancel_handoff("queue rebuilt");
        self.queue.rebuild(self.session.playback_mode());
        self.pending_events.push(PlaybackEvent::QueueChanged);
    }

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        if self.session.set_playback_mode(mode) {
            info!(?mode, "playback mode changed");
            self.pending_events.push(PlaybackEvent::PlaybackModeChanged);
            self.rebuild_queue();
        }
        self.publish_events();
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        if self.session.set_repeat_mode(mode) {
            info!(?mode, "repeat mode changed");
            // Whatever was resolved under the old mode is stale
            self.cancel_handoff("repeat mode changed");
            self.pending_events.push(PlaybackEvent::RepeatModeChanged);
        }
        self.publish_events();
    }

    /// Queue a track to play right after the current one
    pub fn play_next(&mut self, track: TrackRef) {
        debug!(track = %track.id, "play next");
        self.queue.add_next(track);
        self.queue_grew();
    }

    /// Queue a track after every other queued override
    pub fn play_last(&mut self, track: TrackRef) {
        debug!(track = %track.id, "play last");
        self.queue.add_last(track);
        self.queue_grew();
    }

    fn queue_grew(&mut self) {
        let stale = self
            .scheduler
            .pending()
            .is_some_and(|p| self.resolve_following().as_ref() != Some(&p.resolved));
        if stale {
            // The new override goes before whatever was scheduled
            self.cancel_handoff("override queued");
            if self.session.is_playing() {
                self.check_threshold();
            }
        } else if matches!(self.scheduler.phase(), Phase::Draining { .. }) {
            // A drained track may now have something to hand off to
            self.scheduler.cancel();
        }
        self.pending_events.push(PlaybackEvent::QueueChanged);
        self.publish_events();
    }

    /// Jump to `index` of the active queue
    pub fn play_item(&mut self, index: usize) -> Result<()> {
        let result = self.jump_to(index);
        self.publish_events();
        result
    }

    fn jump_to(&mut self, index: usize) -> Result<()> {
        let resolved = self
            .queue
            .resolve_index(index)
            .ok_or(PlaybackError::IndexOutOfBounds(index))?;
        self.cancel_handoff("play item");
        self.replace_active(resolved)?;
        if self.session.is_playing() {
            self.buffers.active_mut().buffer_mut().play_now();
        }
        Ok(())
    }

    // ===== Scheduler hooks =====

    /// Remaining-time check; arms the standby buffer once the threshold is
    /// crossed
    pub fn poll(&mut self) {
        if self.session.is_playing() && matches!(self.scheduler.phase(), Phase::Watching) {
            self.check_threshold();
        }
        self.publish_events();
    }

    fn check_threshold(&mut self) {
        if self.buffers.active().track().is_none() {
            return;
        }

        let remaining = self.remaining_wall_time();
        if !self.scheduler.should_arm(remaining) {
            return;
        }
        self.scheduler.latch();
        debug!(remaining = ?remaining, "gap threshold crossed");

        match self.resolve_following() {
            Some(resolved) => self.arm(resolved, remaining),
            None => {
                info!("no next track, draining current one");
                self.scheduler.drain(Instant::now() + remaining);
            }
        }
    }

    fn arm(&mut self, resolved: Resolved, remaining: Duration) {
        let device_now = self.buffers.active().buffer().device_current_time();
        let target = self.buffers.active_id().other();

        let standby = self.buffers.standby_mut();
        if let Err(e) = standby.load(&resolved.track) {
            warn!(
                track = %resolved.track.id,
                error = %e,
                "standby load failed, current track will play out"
            );
            self.scheduler.drain(Instant::now() + remaining);
            return;
        }
        standby.buffer_mut().set_rate(self.rate);

        let scheduled_start = self.scheduler.scheduled_start(device_now, remaining);
        standby.schedule(scheduled_start);
        let flip_after = self.scheduler.flip_delay(device_now, scheduled_start);

        debug!(
            track = %resolved.track.id,
            buffer = ?target,
            device_now = ?device_now,
            scheduled_start = ?scheduled_start,
            flip_after = ?flip_after,
            "handoff armed"
        );

        self.scheduler.arm(PendingHandoff {
            target,
            resolved,
            armed_at: device_now,
            scheduled_start,
            flip_due: Instant::now() + flip_after,
        });
    }

    /// Act on a due deadline: flip the selector or handle the end of a
    /// drained track
    pub fn on_deadline(&mut self) {
        let now = Instant::now();
        if let Some(due) = self.scheduler.deadline() {
            if now >= due {
                if self.scheduler.pending().is_some() {
                    self.complete_handoff(now);
                } else {
                    self.finish_track();
                }
            }
        }
        self.publish_events();
    }

    fn complete_handoff(&mut self, now: Instant) {
        let Some(pending) = self.scheduler.take_pending() else {
            return;
        };
        if let Some(late) = self.scheduler.lateness(pending.flip_due, now) {
            warn!(
                late = ?late,
                track = %pending.resolved.track.id,
                "handoff flip late, gap may be audible"
            );
        }

        let previous = self.buffers.swap();
        let retiring = self.buffers.slot_mut(previous);
        if retiring.buffer().is_finished() {
            debug!(buffer = ?previous, "retiring buffer played to its end");
        }
        retiring.retire();

        self.commit_track(&pending.resolved);
    }

    fn finish_track(&mut self) {
        if !self.buffers.active().buffer().is_finished() {
            // Still audible (rate or clock drift); watch it again
            self.scheduler.cancel();
            return;
        }

        self.scheduler.on_track_activated();
        let Some(resolved) = self.resolve_following() else {
            self.end_of_queue();
            return;
        };
        match self.replace_active(resolved) {
            Ok(()) => {
                self.buffers.active_mut().buffer_mut().play_now();
                info!("advanced after track end");
            }
            Err(_) => self.end_of_queue(),
        }
    }

    fn end_of_queue(&mut self) {
        info!("queue ended");
        self.buffers.active_mut().buffer_mut().pause();
        self.pending_events.push(PlaybackEvent::QueueEnded);
        self.set_state(PlaybackState::Paused);
    }

    /// When the driver must next call [`Self::on_deadline`]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Push a now-playing snapshot, if updates are enabled and playing
    pub fn publish_now_playing(&mut self) {
        if !self.now_playing_enabled || !self.session.is_playing() {
            return;
        }
        if let Some(info) = self.now_playing_info() {
            self.now_playing.update(&info);
        }
    }

    pub fn now_playing_info(&self) -> Option<NowPlayingInfo> {
        let slot = self.buffers.active();
        let track = slot.track()?;
        let buffer = slot.buffer();
        Some(NowPlayingInfo {
            title: track.title.clone(),
            artist: track.artist.clone(),
            artwork: track.artwork.clone(),
            elapsed: buffer.current_time(),
            rate: buffer.rate(),
            duration: buffer.duration(),
        })
    }

    /// Release every platform resource the engine switched on
    pub fn teardown(&mut self) {
        self.cancel_handoff("teardown");
        self.buffers.active_mut().buffer_mut().pause();
        if self.remote_enabled {
            self.remote.set_enabled(false);
            self.remote_enabled = false;
        }
        self.now_playing_enabled = false;
        self.deactivate_session();
        debug!("engine torn down");
    }

    // ===== Queries =====

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.session.playback_mode()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.session.repeat_mode()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn buffers(&self) -> &BufferPair {
        &self.buffers
    }

    pub fn scheduler(&self) -> &GaplessScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn current_track(&self) -> Option<&TrackRef> {
        self.buffers.active().track()
    }

    pub fn current_time(&self) -> Duration {
        self.buffers.active().buffer().current_time()
    }

    /// Duration reported by the active buffer
    pub fn duration(&self) -> Duration {
        self.buffers.active().buffer().duration()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn remote_controls_enabled(&self) -> bool {
        self.remote_enabled
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.session.state(),
            playback_mode: self.session.playback_mode(),
            repeat_mode: self.session.repeat_mode(),
            current_track: self.current_track().cloned(),
            position: self.current_time(),
            duration: self.duration(),
            cursor: self.queue.cursor(),
            queue_len: self.queue.len(),
            active_buffer: self.buffers.active_id(),
            handoff_pending: self.scheduler.pending().is_some(),
        }
    }

    // ===== Internal =====

    /// Next track per the resolution rule; repeat one replays the bound track
    fn resolve_following(&self) -> Option<Resolved> {
        let repeat = self.session.repeat_mode();
        if repeat == RepeatMode::One {
            if let Some(track) = self.buffers.active().track() {
                return Some(Resolved {
                    track: track.clone(),
                    slot: QueueSlot::Current,
                });
            }
        }
        self.queue.resolve_next(repeat)
    }

    /// Bind a track when nothing is loaded yet
    fn bind(&mut self, resolved: Resolved) -> Result<()> {
        let active = self.buffers.active_mut();
        if let Err(e) = active.load(&resolved.track) {
            warn!(track = %resolved.track.id, error = %e, "load failed");
            return Err(e.into());
        }
        active.buffer_mut().set_rate(self.rate);
        active.activate();
        self.commit_track(&resolved);
        Ok(())
    }

    /// Immediate replace: load the standby buffer, flip, retire the old one
    ///
    /// On a load failure the current track stays untouched.
    fn replace_active(&mut self, resolved: Resolved) -> Result<()> {
        if self.buffers.active().track().is_none() {
            return self.bind(resolved);
        }

        let standby = self.buffers.standby_mut();
        if let Err(e) = standby.load(&resolved.track) {
            warn!(
                track = %resolved.track.id,
                error = %e,
                "load failed, staying on current track"
            );
            return Err(e.into());
        }
        standby.buffer_mut().set_rate(self.rate);

        let previous = self.buffers.swap();
        self.buffers.slot_mut(previous).retire();
        self.commit_track(&resolved);
        Ok(())
    }

    fn commit_track(&mut self, resolved: &Resolved) {
        let cursor = self.queue.cursor();
        self.queue.commit(resolved);
        self.scheduler.on_track_activated();

        info!(
            track = %resolved.track.id,
            slot = ?resolved.slot,
            buffer = ?self.buffers.active_id(),
            "track active"
        );
        self.pending_events.push(PlaybackEvent::TrackChanged);
        if self.queue.cursor() != cursor || matches!(resolved.slot, QueueSlot::Override(_)) {
            self.pending_events.push(PlaybackEvent::QueueChanged);
        }
    }

    /// Abort an in-flight handoff and discard the standby buffer's scheduled play
    fn cancel_handoff(&mut self, reason: &'static str) {
        if let Some(pending) = self.scheduler.cancel() {
            self.buffers.slot_mut(pending.target).retire();
            debug!(reason, track = %pending.resolved.track.id, "handoff cancelled");
        }
    }

    fn remaining_wall_time(&self) -> Duration {
        let remaining = self.buffers.active().buffer().remaining();
        if (self.rate - 1.0).abs() > f32::EPSILON {
            remaining.div_f64(f64::from(self.rate))
        } else {
            remaining
        }
    }

    fn enable_surfaces(&mut self) {
        if self.config.show_remote_controls && !self.remote_enabled {
            self.remote.set_enabled(true);
            self.remote_enabled = true;
        }
        self.now_playing_enabled = self.config.update_now_playing;
    }

    fn activate_session(&mut self) {
        match self.audio_session.set_active(true) {
            Ok(()) => self.session_active = true,
            Err(e) => warn!(error = %e, "audio session activation failed, playing anyway"),
        }
    }

    fn deactivate_session(&mut self) {
        if !self.session_active {
            return;
        }
        if let Err(e) = self.audio_session.set_active(false) {
            warn!(error = %e, "audio session deactivation failed");
        }
        self.session_active = false;
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.session.set_state(state) {
            info!(?state, "playback state changed");
            self.pending_events.push(PlaybackEvent::PlaybackStateChanged);
        }
    }

    fn publish_events(&mut self) {
        for event in self.pending_events.drain(..) {
            self.bus.emit(event);
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("session", &self.session)
            .field("queue", &self.queue)
            .field("buffers", &self.buffers)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferState;
    use crate::sim::{
        RecordingNowPlaying, RecordingRemote, RecordingSession, SimClock, SimLibrary,
        SimObserver, SimulatedBuffer,
    };

    struct Rig {
        engine: PlaybackEngine,
        a: SimObserver,
        b: SimObserver,
        library: SimLibrary,
    }

    fn track(id: &str, secs: u64) -> TrackRef {
        TrackRef::new(id, format!("/music/{id}.flac"), Duration::from_secs(secs))
    }

    fn rig(tracks: &[TrackRef]) -> Rig {
        let clock = SimClock::new();
        let library = SimLibrary::new();
        for t in tracks {
            library.insert(t.locator.clone(), t.duration);
        }
        let a = SimulatedBuffer::new("A", clock.clone(), library.clone());
        let b = SimulatedBuffer::new("B", clock, library.clone());
        let (obs_a, obs_b) = (a.observer(), b.observer());
        let mut engine = PlaybackEngine::new(
            PlaybackConfig::default(),
            BufferPair::new(Box::new(a), Box::new(b)),
        );
        engine.set_original_queue(tracks.to_vec());
        Rig {
            engine,
            a: obs_a,
            b: obs_b,
            library,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn play_binds_cursor_track_into_active_buffer() {
        let mut rig = rig(&[track("t1", 5), track("t2", 5)]);
        rig.engine.play().unwrap();

        assert_eq!(rig.engine.state(), PlaybackState::Playing);
        assert_eq!(rig.engine.current_track().unwrap().id, "t1");
        assert_eq!(rig.engine.buffers().active_id(), BufferId::A);
        assert_eq!(rig.a.track_id().as_deref(), Some("t1"));
        assert!(rig.a.is_playing());
        assert!(rig.b.track_id().is_none());
    }

    #[test]
    fn play_on_empty_queue_is_an_error_without_state_change() {
        let mut rig = rig(&[]);
        assert_eq!(rig.engine.play(), Err(PlaybackError::EmptyQueue));
        assert_eq!(rig.engine.state(), PlaybackState::Initial);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_outside_playing_is_a_noop() {
        let mut rig = rig(&[track("t1", 5)]);
        let mut events = rig.engine.subscribe();
        rig.engine.pause();
        assert_eq!(rig.engine.state(), PlaybackState::Initial);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_rewinds_and_releases_session() {
        let session = RecordingSession::new();
        let mut rig = rig(&[track("t1", 5)]);
        rig.engine = rig.engine.with_audio_session(session.clone());
        rig.engine.play().unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        rig.engine.stop();
        assert_eq!(rig.engine.state(), PlaybackState::Paused);
        assert_eq!(rig.engine.current_time(), Duration::ZERO);
        assert_eq!(session.calls(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_play_enables_remote_controls_once() {
        let remote = RecordingRemote::new();
        let mut rig = rig(&[track("t1", 5)]);
        rig.engine = rig.engine.with_remote_commands(remote.clone());

        rig.engine.play().unwrap();
        rig.engine.pause();
        rig.engine.play().unwrap();
        assert_eq!(remote.toggles(), vec![true]);

        rig.engine.teardown();
        assert_eq!(remote.toggles(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_play_still_enables_remote_controls() {
        let remote = RecordingRemote::new();
        let sink = RecordingNowPlaying::new();
        let mut rig = rig(&[track("t1", 5)]);
        rig.engine = rig
            .engine
            .with_remote_commands(remote.clone())
            .with_now_playing(sink.clone());

        rig.engine.stop();
        assert_eq!(rig.engine.state(), PlaybackState::Paused);
        assert!(remote.toggles().is_empty());

        rig.engine.play().unwrap();
        assert_eq!(remote.toggles(), vec![true]);
        assert!(rig.engine.remote_controls_enabled());

        rig.engine.publish_now_playing();
        assert_eq!(sink.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_rates_are_clamped() {
        let mut rig = rig(&[track("t1", 5), track("t2", 5)]);
        rig.engine.play().unwrap();

        rig.engine.set_rate(1e-20);
        assert!((rig.engine.rate() - 0.5).abs() < f32::EPSILON);
        tokio::time::advance(Duration::from_secs(1)).await;
        rig.engine.poll();
        assert!(rig.engine.scheduler().pending().is_none());

        rig.engine.set_rate(f32::MAX);
        assert!((rig.engine.rate() - 2.0).abs() < f32::EPSILON);
        rig.engine.set_rate(f32::NAN);
        assert!((rig.engine.rate() - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_session_activation_still_plays() {
        let session = RecordingSession::new();
        session.fail_activation(true);
        let mut rig = rig(&[track("t1", 5)]);
        rig.engine = rig.engine.with_audio_session(session.clone());

        rig.engine.play().unwrap();
        assert_eq!(rig.engine.state(), PlaybackState::Playing);
        assert!(rig.a.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_arms_standby_at_threshold() {
        let mut rig = rig(&[track("t1", 5), track("t2", 5)]);
        rig.engine.play().unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        rig.engine.poll();
        assert!(rig.engine.scheduler().pending().is_none());

        tokio::time::advance(Duration::from_secs(1)).await;
        rig.engine.poll();
        let pending = rig.engine.scheduler().pending().unwrap();
        assert_eq!(pending.scheduled_start, Duration::from_millis(5010));
        assert_eq!(rig.engine.buffers().state_of(BufferId::B), BufferState::Scheduled);
        assert!(rig.b.is_scheduled());
        // Cursor only moves on the flip
        assert_eq!(rig.engine.queue().cursor(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_standby_load_keeps_latch_and_drains() {
        let mut rig = rig(&[track("t1", 5), track("t2", 5)]);
        rig.library.insert_unreadable("/music/t2.flac", "truncated");
        rig.engine.play().unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        rig.engine.poll();
        assert!(rig.engine.scheduler().is_latched());
        assert!(matches!(
            rig.engine.scheduler().phase(),
            Phase::Draining { .. }
        ));
        assert_eq!(rig.engine.buffers().state_of(BufferId::B), BufferState::Idle);

        // No retry on later polls
        tokio::time::advance(Duration::from_secs(1)).await;
        rig.engine.poll();
        assert_eq!(
            rig.b.actions().iter().filter(|a| matches!(a, crate::sim::SimAction::Load(_))).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn now_playing_reports_bound_track() {
        let sink = RecordingNowPlaying::new();
        let mut rig = rig(&[track("t1", 5).with_metadata("Intro", "Band")]);
        rig.engine = rig.engine.with_now_playing(sink.clone());

        rig.engine.publish_now_playing();
        assert!(sink.updates().is_empty());

        rig.engine.play().unwrap();
        tokio::time::advance(Duration::from_millis(700)).await;
        rig.engine.publish_now_playing();

        let updates = sink.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].title, "Intro");
        assert_eq!(updates[0].elapsed, Duration::from_millis(700));
        assert_eq!(updates[0].duration, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn events_only_on_actual_change() {
        let mut rig = rig(&[track("t1", 5)]);
        let mut events = rig.engine.subscribe();

        rig.engine.set_repeat_mode(RepeatMode::Off);
        rig.engine.set_playback_mode(PlaybackMode::Linear);
        assert!(events.try_recv().is_err());

        rig.engine.set_repeat_mode(RepeatMode::All);
        assert_eq!(events.try_recv().unwrap(), PlaybackEvent::RepeatModeChanged);
    }
}
