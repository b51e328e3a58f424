//! Queue store
//!
//! Three sequences:
//!
//! ```text
//! original:  T1 T2 T3 T4          (user-authored order)
//! active:    T3 T1 T4 T2          (identity in linear mode, permutation in shuffle)
//!               ^ cursor
//! overrides: N1 N2 | N3           ("play next" / "play last")
//!                 ^ last consumed
//! ```
//!
//! Pure data: resolution hands out a [`Resolved`] candidate and nothing moves
//! until the caller commits it, so an abandoned handoff leaves no trace.

use crate::shuffle::{apply_mode, queue_rng};
use crate::types::{PlaybackMode, RepeatMode, TrackRef};
use rand::rngs::StdRng;

/// Where a resolved track lives in the queue store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSlot {
    /// Index into the active queue
    Main(usize),

    /// Index into the override queue
    Override(usize),

    /// Replay of whatever is currently playing (repeat one)
    Current,
}

/// A track picked by the resolution rule, not yet committed
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub track: TrackRef,
    pub slot: QueueSlot,
}

#[derive(Debug)]
pub struct Queue {
    original: Vec<TrackRef>,
    active: Vec<TrackRef>,
    cursor: usize,
    overrides: Vec<TrackRef>,
    /// Last consumed override entry
    override_position: Option<usize>,
    /// Slot of the committed (now playing) track
    now_playing: Option<QueueSlot>,
    rng: StdRng,
}

impl Queue {
    pub fn new(shuffle_seed: Option<u64>) -> Self {
        Self {
            original: Vec::new(),
            active: Vec::new(),
            cursor: 0,
            overrides: Vec::new(),
            override_position: None,
            now_playing: None,
            rng: queue_rng(shuffle_seed),
        }
    }

    /// Replace the original queue and rebuild the active queue
    pub fn set_original(&mut self, tracks: Vec<TrackRef>, mode: PlaybackMode) {
        self.original = tracks;
        self.rebuild(mode);
    }

    /// Rebuild the active queue under `mode` and reset the cursor
    pub fn rebuild(&mut self, mode: PlaybackMode) {
        self.active.clone_from(&self.original);
        apply_mode(&mut self.active, mode, &mut self.rng);
        self.cursor = 0;
        if matches!(self.now_playing, Some(QueueSlot::Main(_))) {
            self.now_playing = None;
        }
    }

    /// Insert after the current override position (plays next)
    pub fn add_next(&mut self, track: TrackRef) {
        let at = self.next_override_index();
        self.overrides.insert(at, track);
    }

    /// Append to the override queue
    pub fn add_last(&mut self, track: TrackRef) {
        self.overrides.push(track);
    }

    fn next_override_index(&self) -> usize {
        self.override_position.map_or(0, |p| p + 1)
    }

    /// Track to start from when nothing has been committed yet
    pub fn resolve_start(&self) -> Option<Resolved> {
        if let Some(track) = self.active.get(self.cursor) {
            return Some(Resolved {
                track: track.clone(),
                slot: QueueSlot::Main(self.cursor),
            });
        }
        self.resolve_override()
    }

    /// General resolution rule: unconsumed overrides first, then `active[cursor + 1]`
    ///
    /// Repeat one is the caller's business; here it behaves like "stay on the
    /// cursor" when the main queue is exhausted.
    pub fn resolve_next(&self, repeat: RepeatMode) -> Option<Resolved> {
        if let Some(resolved) = self.resolve_override() {
            return Some(resolved);
        }

        if self.active.is_empty() {
            return None;
        }

        let index = if self.cursor + 1 < self.active.len() {
            self.cursor + 1
        } else {
            match repeat {
                RepeatMode::All => 0,
                RepeatMode::One => self.cursor,
                RepeatMode::Off => return None,
            }
        };

        Some(Resolved {
            track: self.active[index].clone(),
            slot: QueueSlot::Main(index),
        })
    }

    fn resolve_override(&self) -> Option<Resolved> {
        let index = self.next_override_index();
        self.overrides.get(index).map(|track| Resolved {
            track: track.clone(),
            slot: QueueSlot::Override(index),
        })
    }

    /// Resolve a specific index of the active queue
    pub fn resolve_index(&self, index: usize) -> Option<Resolved> {
        self.active.get(index).map(|track| Resolved {
            track: track.clone(),
            slot: QueueSlot::Main(index),
        })
    }

    /// Make a resolved track the committed one, advancing the matching cursor
    pub fn commit(&mut self, resolved: &Resolved) {
        match resolved.slot {
            QueueSlot::Main(index) => {
                self.cursor = index;
                self.now_playing = Some(QueueSlot::Main(index));
            }
            QueueSlot::Override(index) => {
                self.override_position = Some(index);
                self.now_playing = Some(QueueSlot::Override(index));
            }
            QueueSlot::Current => {}
        }
    }

    /// Index of `track_id` in the active queue
    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.active.iter().position(|t| t.id == track_id)
    }

    pub fn original(&self) -> &[TrackRef] {
        &self.original
    }

    pub fn active(&self) -> &[TrackRef] {
        &self.active
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn now_playing(&self) -> Option<QueueSlot> {
        self.now_playing
    }

    /// Override entries not yet consumed
    pub fn pending_overrides(&self) -> &[TrackRef] {
        let start = self.next_override_index().min(self.overrides.len());
        &self.overrides[start..]
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_test_track(id: &str) -> TrackRef {
        TrackRef::new(id, format!("/music/{}.flac", id), Duration::from_secs(180))
    }

    fn tracks(ids: &[&str]) -> Vec<TrackRef> {
        ids.iter().map(|id| create_test_track(id)).collect()
    }

    fn ids(resolved: Option<Resolved>) -> Option<String> {
        resolved.map(|r| r.track.id)
    }

    #[test]
    fn create_empty_queue() {
        let queue = Queue::new(None);
        assert!(queue.is_empty());
        assert!(queue.resolve_start().is_none());
        assert!(queue.resolve_next(RepeatMode::All).is_none());
    }

    #[test]
    fn set_original_resets_cursor() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["1", "2", "3"]), PlaybackMode::Linear);
        let second = queue.resolve_index(2).unwrap();
        queue.commit(&second);
        assert_eq!(queue.cursor(), 2);

        queue.set_original(tracks(&["4", "5"]), PlaybackMode::Linear);
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.active(), queue.original());
    }

    #[test]
    fn linear_resolution_walks_forward() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["1", "2", "3"]), PlaybackMode::Linear);

        assert_eq!(ids(queue.resolve_start()), Some("1".to_string()));
        let next = queue.resolve_next(RepeatMode::Off).unwrap();
        assert_eq!(next.slot, QueueSlot::Main(1));

        // Resolution alone never moves the cursor
        assert_eq!(queue.cursor(), 0);
        queue.commit(&next);
        assert_eq!(queue.cursor(), 1);
    }

    #[test]
    fn end_of_queue_depends_on_repeat() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["1", "2"]), PlaybackMode::Linear);
        let last = queue.resolve_index(1).unwrap();
        queue.commit(&last);

        assert!(queue.resolve_next(RepeatMode::Off).is_none());
        assert_eq!(
            queue.resolve_next(RepeatMode::All).map(|r| r.slot),
            Some(QueueSlot::Main(0))
        );
        assert_eq!(
            queue.resolve_next(RepeatMode::One).map(|r| r.slot),
            Some(QueueSlot::Main(1))
        );
    }

    #[test]
    fn overrides_are_consumed_before_main_queue() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["s1", "s2"]), PlaybackMode::Linear);
        let start = queue.resolve_start().unwrap();
        queue.commit(&start);

        queue.add_last(create_test_track("o1"));
        queue.add_last(create_test_track("o2"));

        let next = queue.resolve_next(RepeatMode::Off).unwrap();
        assert_eq!(next.track.id, "o1");
        queue.commit(&next);
        // Main cursor stays where the main queue left off
        assert_eq!(queue.cursor(), 0);

        let next = queue.resolve_next(RepeatMode::Off).unwrap();
        assert_eq!(next.track.id, "o2");
        queue.commit(&next);

        let next = queue.resolve_next(RepeatMode::Off).unwrap();
        assert_eq!(next.track.id, "s2");
        assert_eq!(next.slot, QueueSlot::Main(1));
    }

    #[test]
    fn consumed_overrides_are_never_revisited() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["s1"]), PlaybackMode::Linear);
        queue.add_last(create_test_track("o1"));

        let next = queue.resolve_next(RepeatMode::All).unwrap();
        queue.commit(&next);
        assert!(queue.pending_overrides().is_empty());

        // Repeat all wraps the main queue, not the overrides
        let next = queue.resolve_next(RepeatMode::All).unwrap();
        assert_eq!(next.track.id, "s1");
    }

    #[test]
    fn add_next_jumps_ahead_of_pending_overrides() {
        let mut queue = Queue::new(None);
        queue.add_last(create_test_track("o1"));
        queue.add_last(create_test_track("o2"));
        let first = queue.resolve_next(RepeatMode::Off).unwrap();
        queue.commit(&first);

        queue.add_next(create_test_track("urgent"));

        let pending: Vec<_> = queue.pending_overrides().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending, vec!["urgent", "o2"]);
    }

    #[test]
    fn start_falls_back_to_overrides() {
        let mut queue = Queue::new(None);
        queue.add_last(create_test_track("o1"));
        assert_eq!(
            queue.resolve_start().map(|r| r.slot),
            Some(QueueSlot::Override(0))
        );
    }

    #[test]
    fn shuffle_rebuild_is_permutation() {
        let mut queue = Queue::new(Some(3));
        queue.set_original(tracks(&["1", "2", "3", "4", "5", "6"]), PlaybackMode::Shuffle);

        let mut shuffled: Vec<_> = queue.active().iter().map(|t| t.id.clone()).collect();
        shuffled.sort();
        assert_eq!(shuffled, vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(queue.cursor(), 0);

        queue.rebuild(PlaybackMode::Linear);
        assert_eq!(queue.active(), queue.original());
    }

    #[test]
    fn commit_current_changes_nothing() {
        let mut queue = Queue::new(None);
        queue.set_original(tracks(&["1", "2"]), PlaybackMode::Linear);
        let start = queue.resolve_start().unwrap();
        queue.commit(&start);

        queue.commit(&Resolved {
            track: create_test_track("1"),
            slot: QueueSlot::Current,
        });
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.now_playing(), Some(QueueSlot::Main(0)));
    }
}
