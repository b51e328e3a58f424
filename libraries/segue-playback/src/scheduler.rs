//! Gapless scheduler
//!
//! Decides when the standby buffer gets armed and when the selector flips.
//! Pure bookkeeping: the engine feeds it remaining-time readings and device
//! clock values, and performs the buffer operations it asks for.
//!
//! ```text
//!   Watching ──remaining <= threshold──> Armed ──settle delay──> flip ──> Watching
//!      │                                   │
//!      │ no next track / load failed       │ skip, seek, pause, stop
//!      v                                   v
//!   Draining ──track end──> end handling   cancel ──> Watching
//! ```

use crate::buffer::BufferId;
use crate::queue::Resolved;
use crate::types::PlaybackConfig;
use std::time::Duration;
use tokio::time::Instant;

/// A standby buffer armed for a gapless start
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHandoff {
    /// Slot holding the upcoming track
    pub target: BufferId,
    /// Track and queue slot to commit on flip
    pub resolved: Resolved,
    /// Device time when the handoff was armed
    pub armed_at: Duration,
    /// Device time the standby buffer starts producing audio
    pub scheduled_start: Duration,
    /// When the selector flip is due
    pub flip_due: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Polling remaining time, nothing armed
    Watching,
    /// Standby buffer scheduled, waiting for the flip
    Armed(PendingHandoff),
    /// Nothing could be armed; the active track plays out until `track_end`
    Draining { track_end: Instant },
}

#[derive(Debug)]
pub struct GaplessScheduler {
    threshold: Duration,
    lookahead: Duration,
    settle_delay: Duration,
    late_tolerance: Duration,
    /// One-shot latch, set when the threshold is crossed for the current track
    latched: bool,
    /// Set between arming and the flip (or cancel)
    reduce_gap: bool,
    phase: Phase,
}

impl GaplessScheduler {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            threshold: config.gap_threshold(),
            lookahead: config.lookahead(),
            settle_delay: config.settle_delay(),
            late_tolerance: config.late_flip_tolerance(),
            latched: false,
            reduce_gap: false,
            phase: Phase::Watching,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pending(&self) -> Option<&PendingHandoff> {
        match &self.phase {
            Phase::Armed(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn reduce_gap(&self) -> bool {
        self.reduce_gap
    }

    /// Threshold crossed and not yet acted on for this track
    pub fn should_arm(&self, remaining: Duration) -> bool {
        !self.latched && matches!(self.phase, Phase::Watching) && remaining <= self.threshold
    }

    /// Close the latch for the current track
    pub fn latch(&mut self) {
        self.latched = true;
    }

    /// Device time the standby buffer must start at
    ///
    /// `remaining` is already floored at zero, so a track shorter than the
    /// threshold schedules `lookahead` from now.
    pub fn scheduled_start(&self, device_now: Duration, remaining: Duration) -> Duration {
        device_now + self.lookahead + remaining
    }

    /// Delay from arming until the flip: the settle delay, but never before
    /// the standby buffer has started
    pub fn flip_delay(&self, device_now: Duration, scheduled_start: Duration) -> Duration {
        self.settle_delay
            .max(scheduled_start.saturating_sub(device_now))
    }

    pub fn arm(&mut self, pending: PendingHandoff) {
        self.latched = true;
        self.reduce_gap = true;
        self.phase = Phase::Armed(pending);
    }

    /// Nothing to arm; wait for the active track to end
    pub fn drain(&mut self, track_end: Instant) {
        self.latched = true;
        self.reduce_gap = false;
        self.phase = Phase::Draining { track_end };
    }

    /// Take the pending handoff for the flip
    pub fn take_pending(&mut self) -> Option<PendingHandoff> {
        match std::mem::replace(&mut self.phase, Phase::Watching) {
            Phase::Armed(pending) => Some(pending),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Abort whatever is in flight and start watching from a clean state
    ///
    /// Returns the abandoned handoff so the caller can discard its buffer.
    pub fn cancel(&mut self) -> Option<PendingHandoff> {
        self.latched = false;
        self.reduce_gap = false;
        match std::mem::replace(&mut self.phase, Phase::Watching) {
            Phase::Armed(pending) => Some(pending),
            _ => None,
        }
    }

    /// A new track became active: re-arm polling for it
    pub fn on_track_activated(&mut self) {
        self.latched = false;
        self.reduce_gap = false;
        self.phase = Phase::Watching;
    }

    /// Next instant the engine must be woken for
    pub fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Watching => None,
            Phase::Armed(pending) => Some(pending.flip_due),
            Phase::Draining { track_end } => Some(*track_end),
        }
    }

    /// Lateness beyond tolerance, if any
    pub fn lateness(&self, due: Instant, now: Instant) -> Option<Duration> {
        let late = now.saturating_duration_since(due);
        (late > self.late_tolerance).then_some(late)
    }
}
