//! Interruption & route policy
//!
//! Signals from the host's audio session (phone calls, alarms, headphones
//! unplugged) mapped onto transport operations.

use crate::engine::PlaybackEngine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Why the audio route changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteChangeReason {
    NewDeviceAvailable,
    /// The device we were playing through went away (headphones unplugged)
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    RouteConfigurationChange,
    Unknown,
}

/// Audio-session signal delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSignal {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    RouteChanged(RouteChangeReason),
}

impl PlaybackEngine {
    /// Apply the interruption / route-change policy
    ///
    /// An interruption always leaves the engine `Interrupted`, whatever it was
    /// doing. Its end resumes playback only when the host hints so.
    pub fn handle_session_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::InterruptionBegan => {
                info!(state = ?self.state(), "interruption began, pausing");
                self.pause();
                self.mark_interrupted();
            }
            SessionSignal::InterruptionEnded { should_resume } => {
                if should_resume {
                    info!("interruption ended, resuming");
                    if let Err(e) = self.play() {
                        warn!(error = %e, "resume after interruption failed");
                    }
                } else {
                    debug!("interruption ended without resume hint");
                }
            }
            SessionSignal::RouteChanged(RouteChangeReason::OldDeviceUnavailable) => {
                info!("output device went away, pausing");
                self.pause();
            }
            SessionSignal::RouteChanged(reason) => {
                debug!(?reason, "route changed");
            }
        }
    }
}
