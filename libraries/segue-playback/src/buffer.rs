//! Playback buffer pair
//!
//! Two interchangeable playback resources. One is selected as active (the
//! audible "player"); the other is idle, loading, scheduled, or retiring.
//! Only the selector hands out the active buffer, and the standby buffer is
//! reachable from inside the crate only, since it may be mid-transition.

use crate::error::LoadError;
use crate::types::TrackRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform playback resource
///
/// Implementors wrap a decoder + output that can be bound to one track at a
/// time and started at a precise device-clock time (AVAudioPlayer-style).
/// Decoding itself is out of scope for this crate.
pub trait PlaybackBuffer: Send {
    /// Bind a track, invalidating any previous binding
    fn load(&mut self, track: &TrackRef) -> Result<(), LoadError>;

    /// Warm up decoding so a later start is immediate
    fn prepare(&mut self);

    /// Start (or resume) immediately
    fn play_now(&mut self);

    /// Start when the device clock reaches `device_time`
    fn play_at(&mut self, device_time: Duration);

    /// Pause, keeping position
    fn pause(&mut self);

    /// Stop output, discard any scheduled start, and unbind the track
    fn stop(&mut self);

    /// Position within the bound track
    fn current_time(&self) -> Duration;

    /// Seek within the bound track
    fn set_current_time(&mut self, position: Duration);

    /// Duration of the bound track (zero when unbound)
    fn duration(&self) -> Duration;

    /// Playback rate (1.0 = normal speed)
    fn rate(&self) -> f32;

    fn set_rate(&mut self, rate: f32);

    /// Monotonic device clock shared by both buffers, unaffected by pause
    fn device_current_time(&self) -> Duration;

    /// Whether audio is being produced right now
    fn is_playing(&self) -> bool;

    /// Whether the bound track played through to its end
    fn is_finished(&self) -> bool {
        let duration = self.duration();
        !duration.is_zero() && self.current_time() >= duration
    }

    /// Remaining media time, floored at zero
    fn remaining(&self) -> Duration {
        self.duration().saturating_sub(self.current_time())
    }
}

/// Which of the two slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    pub fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

/// Buffer lifecycle
///
/// `Idle -> Loading -> Ready -> (Scheduled ->) Active -> Retiring -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferState {
    Idle,
    Loading,
    Ready,
    /// Scheduled play issued, waiting for the selector flip
    Scheduled,
    Active,
    Retiring,
}

/// A buffer plus the bookkeeping the scheduler needs
pub struct BufferSlot {
    buffer: Box<dyn PlaybackBuffer>,
    state: BufferState,
    track: Option<TrackRef>,
    scheduled_start: Option<Duration>,
}

impl BufferSlot {
    fn new(buffer: Box<dyn PlaybackBuffer>) -> Self {
        Self {
            buffer,
            state: BufferState::Idle,
            track: None,
            scheduled_start: None,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Track bound to this buffer
    pub fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    /// Device time of the scheduled start, if armed
    pub fn scheduled_start(&self) -> Option<Duration> {
        self.scheduled_start
    }

    pub fn buffer(&self) -> &dyn PlaybackBuffer {
        self.buffer.as_ref()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut dyn PlaybackBuffer {
        self.buffer.as_mut()
    }

    /// `Idle -> Loading -> Ready`; a failed load leaves the slot idle and unbound
    pub(crate) fn load(&mut self, track: &TrackRef) -> Result<(), LoadError> {
        self.state = BufferState::Loading;
        self.scheduled_start = None;
        match self.buffer.load(track) {
            Ok(()) => {
                self.buffer.prepare();
                self.track = Some(track.clone());
                self.state = BufferState::Ready;
                Ok(())
            }
            Err(e) => {
                self.track = None;
                self.state = BufferState::Idle;
                Err(e)
            }
        }
    }

    /// `Ready -> Scheduled`, issuing the device-time play
    pub(crate) fn schedule(&mut self, device_time: Duration) {
        self.scheduled_start = Some(device_time);
        self.state = BufferState::Scheduled;
        self.buffer.play_at(device_time);
    }

    pub(crate) fn activate(&mut self) {
        self.scheduled_start = None;
        self.state = BufferState::Active;
    }

    /// `-> Retiring -> Idle`, stopping output and dropping the binding
    pub(crate) fn retire(&mut self) {
        self.state = BufferState::Retiring;
        self.buffer.stop();
        self.track = None;
        self.scheduled_start = None;
        self.state = BufferState::Idle;
    }
}

impl std::fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlot")
            .field("state", &self.state)
            .field("track", &self.track.as_ref().map(|t| t.id.as_str()))
            .field("scheduled_start", &self.scheduled_start)
            .finish_non_exhaustive()
    }
}

/// Two slots and the active selector
#[derive(Debug)]
pub struct BufferPair {
    slots: [BufferSlot; 2],
    active: BufferId,
}

impl BufferPair {
    pub fn new(a: Box<dyn PlaybackBuffer>, b: Box<dyn PlaybackBuffer>) -> Self {
        Self {
            slots: [BufferSlot::new(a), BufferSlot::new(b)],
            active: BufferId::A,
        }
    }

    pub fn active_id(&self) -> BufferId {
        self.active
    }

    /// The buffer currently selected as "the player"
    pub fn active(&self) -> &BufferSlot {
        &self.slots[self.active.index()]
    }

    pub(crate) fn active_mut(&mut self) -> &mut BufferSlot {
        &mut self.slots[self.active.index()]
    }

    pub(crate) fn standby_mut(&mut self) -> &mut BufferSlot {
        &mut self.slots[self.active.other().index()]
    }

    pub(crate) fn standby(&self) -> &BufferSlot {
        &self.slots[self.active.other().index()]
    }

    /// Lifecycle state of both slots, for observers
    pub fn states(&self) -> [(BufferId, BufferState); 2] {
        [
            (BufferId::A, self.slots[0].state),
            (BufferId::B, self.slots[1].state),
        ]
    }

    pub fn state_of(&self, id: BufferId) -> BufferState {
        self.slots[id.index()].state
    }

    /// Flip the selector to the standby slot and mark it active
    ///
    /// Returns the id of the slot that was active before; it is left for the
    /// caller to retire.
    pub(crate) fn swap(&mut self) -> BufferId {
        let previous = self.active;
        self.active = previous.other();
        self.slots[self.active.index()].activate();
        previous
    }

    pub(crate) fn slot_mut(&mut self, id: BufferId) -> &mut BufferSlot {
        &mut self.slots[id.index()]
    }
}
