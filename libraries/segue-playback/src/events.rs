//! Playback Events
//!
//! Events carry no payload: each one means "this part of the state changed,
//! re-read it". They are emitted by the engine once an operation has
//! committed its changes, never from inside a half-applied mutation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A different track became active (gapless flip or manual replace)
    TrackChanged,

    /// Session state changed (initial/playing/paused/interrupted)
    PlaybackStateChanged,

    /// Active queue, cursor, or override queue changed
    QueueChanged,

    /// Linear/shuffle mode changed
    PlaybackModeChanged,

    /// Repeat mode changed
    RepeatModeChanged,

    /// The last track played out with nothing left to resolve
    QueueEnded,
}

/// Fan-out of playback events to any number of subscribers
///
/// Slow subscribers lag (and see `RecvError::Lagged`) rather than blocking
/// the engine.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: PlaybackEvent) {
        tracing::trace!(?event, "emit");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(64)
    }
}
