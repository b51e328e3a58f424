//! Remote command handlers
//!
//! Bodies for lock-screen / headset / media-key commands. The host's command
//! center routes events here and reports the returned status back.

use crate::engine::PlaybackEngine;
use crate::types::PlaybackMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RemoteCommand {
    Play,
    Pause,
    Stop,
    TogglePlayPause,
    /// Change playback position
    Seek(Duration),
    NextTrack,
    PreviousTrack,
    ChangeShuffle(PlaybackMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteCommandStatus {
    Success,
    CommandFailed,
    /// Remote controls are switched off
    Disabled,
}

impl PlaybackEngine {
    pub fn handle_remote_command(&mut self, command: RemoteCommand) -> RemoteCommandStatus {
        if !self.remote_controls_enabled() {
            debug!(?command, "remote command while controls disabled");
            return RemoteCommandStatus::Disabled;
        }

        let result = match command {
            RemoteCommand::Play => self.play(),
            RemoteCommand::Pause => {
                self.pause();
                Ok(())
            }
            RemoteCommand::Stop => {
                self.stop();
                Ok(())
            }
            RemoteCommand::TogglePlayPause => self.toggle(),
            RemoteCommand::Seek(position) => self.seek(position),
            RemoteCommand::NextTrack => self.skip_to_next().and_then(|()| self.resume_if_playing()),
            RemoteCommand::PreviousTrack => {
                self.skip_to_previous();
                self.resume_if_playing()
            }
            RemoteCommand::ChangeShuffle(mode) => {
                self.set_playback_mode(mode);
                Ok(())
            }
        };

        match result {
            Ok(()) => RemoteCommandStatus::Success,
            Err(e) => {
                warn!(?command, error = %e, "remote command failed");
                RemoteCommandStatus::CommandFailed
            }
        }
    }

    /// Re-issue play so the platform sees a playing rate after a jump
    fn resume_if_playing(&mut self) -> crate::Result<()> {
        if self.session().is_playing() {
            self.play()
        } else {
            Ok(())
        }
    }
}
