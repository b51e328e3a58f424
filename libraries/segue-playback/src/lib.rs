//! Segue - Gapless Playback
//!
//! Platform-agnostic gapless playback engine built around two alternating
//! playback buffers.
//!
//! This crate provides:
//! - Dual-buffer gapless handoff (scheduled start on the device clock)
//! - Transport control (play, pause, stop, toggle, seek, skip, rate)
//! - Queue store with shuffle and a "play next" / "play last" override queue
//! - Repeat modes (Off, All, One)
//! - Session state and change notifications
//! - Interruption and route-change policy
//! - Remote command handlers and now-playing updates
//!
//! # Architecture
//!
//! `segue-playback` does not decode audio or talk to an OS audio stack.
//! Platform code is plugged in through traits:
//! - [`PlaybackBuffer`] - a decoder + output bound to one track at a time
//! - [`AudioSession`], [`NowPlayingSink`], [`RemoteCommandCenter`]
//!
//! [`PlaybackEngine`] is a synchronous state machine. [`Player`] runs it on a
//! tokio task and owns the timers that drive it.
//!
//! # Example: Engine
//!
//! ```rust
//! use segue_playback::sim::{SimClock, SimLibrary, SimulatedBuffer};
//! use segue_playback::{BufferPair, PlaybackConfig, PlaybackEngine, PlaybackState, TrackRef};
//! use std::time::Duration;
//!
//! let clock = SimClock::new();
//! let library = SimLibrary::new();
//! library.insert("/music/intro.flac", Duration::from_secs(95));
//!
//! let buffers = BufferPair::new(
//!     Box::new(SimulatedBuffer::new("A", clock.clone(), library.clone())),
//!     Box::new(SimulatedBuffer::new("B", clock, library)),
//! );
//! let mut engine = PlaybackEngine::new(PlaybackConfig::default(), buffers);
//!
//! engine.set_original_queue(vec![
//!     TrackRef::new("intro", "/music/intro.flac", Duration::from_secs(95))
//!         .with_metadata("Intro", "Band"),
//! ]);
//! engine.play()?;
//! assert_eq!(engine.state(), PlaybackState::Playing);
//! # Ok::<(), segue_playback::PlaybackError>(())
//! ```
//!
//! # Example: Player task
//!
//! ```rust,no_run
//! use segue_playback::{Player, PlaybackEngine, RepeatMode};
//!
//! # async fn run(engine: PlaybackEngine) -> segue_playback::Result<()> {
//! let (player, _task) = Player::spawn(engine);
//! let mut events = player.subscribe();
//!
//! player.set_repeat_mode(RepeatMode::All).await?;
//! player.play().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod buffer;
mod collaborators;
mod config;
mod engine;
mod error;
mod events;
mod interruption;
mod player;
mod queue;
mod remote;
mod scheduler;
mod session;
mod shuffle;
pub mod sim;
pub mod types;

// Public exports
pub use buffer::{BufferId, BufferPair, BufferSlot, BufferState, PlaybackBuffer};
pub use collaborators::{
    AudioSession, NoopAudioSession, NoopNowPlaying, NoopRemoteCommands, NowPlayingInfo,
    NowPlayingSink, RemoteCommandCenter, SourceInfo, TrackSource,
};
pub use engine::{EngineSnapshot, PlaybackEngine};
pub use error::{LoadError, PlaybackError, Result, SessionActivationError};
pub use events::{NotificationBus, PlaybackEvent};
pub use interruption::{RouteChangeReason, SessionSignal};
pub use player::{Player, PlayerCommand, PlayerHandle};
pub use queue::{Queue, QueueSlot, Resolved};
pub use remote::{RemoteCommand, RemoteCommandStatus};
pub use scheduler::{GaplessScheduler, PendingHandoff, Phase};
pub use session::Session;
pub use types::{PlaybackConfig, PlaybackMode, PlaybackState, RepeatMode, TrackRef};
