//! Session state
//!
//! Every setter reports whether the value actually changed; the engine turns
//! a change into the matching event at the end of the operation.

use crate::types::{PlaybackMode, PlaybackState, RepeatMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    state: PlaybackState,
    playback_mode: PlaybackMode,
    repeat_mode: RepeatMode,
}

impl Session {
    pub fn new(playback_mode: PlaybackMode, repeat_mode: RepeatMode) -> Self {
        Self {
            state: PlaybackState::Initial,
            playback_mode,
            repeat_mode,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.playback_mode
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub(crate) fn set_state(&mut self, state: PlaybackState) -> bool {
        replace_if_changed(&mut self.state, state)
    }

    pub(crate) fn set_playback_mode(&mut self, mode: PlaybackMode) -> bool {
        replace_if_changed(&mut self.playback_mode, mode)
    }

    pub(crate) fn set_repeat_mode(&mut self, mode: RepeatMode) -> bool {
        replace_if_changed(&mut self.repeat_mode, mode)
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_initial() {
        let session = Session::new(PlaybackMode::Linear, RepeatMode::Off);
        assert_eq!(session.state(), PlaybackState::Initial);
        assert!(!session.is_playing());
    }

    #[test]
    fn setters_report_changes() {
        let mut session = Session::new(PlaybackMode::Linear, RepeatMode::Off);
        assert!(session.set_state(PlaybackState::Playing));
        assert!(!session.set_state(PlaybackState::Playing));
        assert!(session.set_playback_mode(PlaybackMode::Shuffle));
        assert!(!session.set_repeat_mode(RepeatMode::Off));
        assert!(session.set_repeat_mode(RepeatMode::One));
        assert_eq!(session.repeat_mode(), RepeatMode::One);
    }
}
