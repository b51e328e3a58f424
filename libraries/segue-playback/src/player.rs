//! Player task
//!
//! Runs a [`PlaybackEngine`] on a single tokio task. Commands, remote
//! commands and session signals arrive over one channel and are applied in
//! order; the remaining-time poll, the now-playing cadence and the handoff
//! deadline are timers owned by the same loop, so nothing touches the engine
//! concurrently. Poll and now-playing timers only exist while playing.
//!
//! The task ends on [`PlayerHandle::shutdown`] or once every handle is
//! dropped, tearing the engine down on its way out.

use crate::{
    engine::{EngineSnapshot, PlaybackEngine},
    error::{PlaybackError, Result},
    events::{NotificationBus, PlaybackEvent},
    interruption::SessionSignal,
    remote::{RemoteCommand, RemoteCommandStatus},
    types::{PlaybackMode, RepeatMode, TrackRef},
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Transport and queue operations accepted by the player task
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Toggle,
    SkipToNext,
    SkipToPrevious,
    Seek(Duration),
    SetRate(f32),
    SetOriginalQueue(Vec<TrackRef>),
    SetQueue,
    SetPlaybackMode(PlaybackMode),
    SetRepeatMode(RepeatMode),
    PlayNext(TrackRef),
    PlayLast(TrackRef),
    PlayItem(usize),
}

impl PlaybackEngine {
    /// Apply a [`PlayerCommand`]
    pub fn apply(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play => return self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::Toggle => return self.toggle(),
            PlayerCommand::SkipToNext => return self.skip_to_next(),
            PlayerCommand::SkipToPrevious => self.skip_to_previous(),
            PlayerCommand::Seek(position) => return self.seek(position),
            PlayerCommand::SetRate(rate) => self.set_rate(rate),
            PlayerCommand::SetOriginalQueue(tracks) => self.set_original_queue(tracks),
            PlayerCommand::SetQueue => self.set_queue(),
            PlayerCommand::SetPlaybackMode(mode) => self.set_playback_mode(mode),
            PlayerCommand::SetRepeatMode(mode) => self.set_repeat_mode(mode),
            PlayerCommand::PlayNext(track) => self.play_next(track),
            PlayerCommand::PlayLast(track) => self.play_last(track),
            PlayerCommand::PlayItem(index) => return self.play_item(index),
        }
        Ok(())
    }
}

enum Request {
    Command(PlayerCommand, oneshot::Sender<Result<()>>),
    Remote(RemoteCommand, oneshot::Sender<RemoteCommandStatus>),
    Signal(SessionSignal),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Owner of the player task
pub struct Player;

impl Player {
    /// Move `engine` onto a new task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: PlaybackEngine) -> (PlayerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(engine.config().command_capacity.max(1));
        let handle = PlayerHandle {
            tx,
            bus: engine.bus().clone(),
        };
        let task = tokio::spawn(run(engine, rx));
        (handle, task)
    }
}

/// Cloneable handle to a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<Request>,
    bus: NotificationBus,
}

impl PlayerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    /// Send a command and wait for the engine's answer
    pub async fn command(&self, command: PlayerCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command(command, reply)).await?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)?
    }

    pub async fn play(&self) -> Result<()> {
        self.command(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.command(PlayerCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.command(PlayerCommand::Stop).await
    }

    pub async fn toggle(&self) -> Result<()> {
        self.command(PlayerCommand::Toggle).await
    }

    pub async fn skip_to_next(&self) -> Result<()> {
        self.command(PlayerCommand::SkipToNext).await
    }

    pub async fn skip_to_previous(&self) -> Result<()> {
        self.command(PlayerCommand::SkipToPrevious).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.command(PlayerCommand::Seek(position)).await
    }

    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        self.command(PlayerCommand::SetRate(rate)).await
    }

    pub async fn set_original_queue(&self, tracks: Vec<TrackRef>) -> Result<()> {
        self.command(PlayerCommand::SetOriginalQueue(tracks)).await
    }

    pub async fn set_queue(&self) -> Result<()> {
        self.command(PlayerCommand::SetQueue).await
    }

    pub async fn set_playback_mode(&self, mode: PlaybackMode) -> Result<()> {
        self.command(PlayerCommand::SetPlaybackMode(mode)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.command(PlayerCommand::SetRepeatMode(mode)).await
    }

    pub async fn play_next(&self, track: TrackRef) -> Result<()> {
        self.command(PlayerCommand::PlayNext(track)).await
    }

    pub async fn play_last(&self, track: TrackRef) -> Result<()> {
        self.command(PlayerCommand::PlayLast(track)).await
    }

    pub async fn play_item(&self, index: usize) -> Result<()> {
        self.command(PlayerCommand::PlayItem(index)).await
    }

    /// Route a remote command; the status is what the platform reports back
    pub async fn remote(&self, command: RemoteCommand) -> Result<RemoteCommandStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Remote(command, reply)).await?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)
    }

    /// Deliver an audio-session signal (fire and forget)
    pub async fn signal(&self, signal: SessionSignal) -> Result<()> {
        self.send(Request::Signal(signal)).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Snapshot(reply)).await?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)
    }

    /// Ask the task to tear down and exit
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Request::Shutdown).await
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| PlaybackError::PlayerClosed)
    }
}

async fn run(mut engine: PlaybackEngine, mut rx: mpsc::Receiver<Request>) {
    let poll_period = engine.config().poll_interval();
    let now_playing_period = engine.config().now_playing_interval();
    let mut poll_timer: Option<Interval> = None;
    let mut now_playing_timer: Option<Interval> = None;

    info!("player started");

    loop {
        if engine.session().is_playing() {
            if poll_timer.is_none() {
                poll_timer = Some(timer(poll_period));
                now_playing_timer = Some(timer(now_playing_period));
                debug!("timers armed");
            }
        } else if poll_timer.is_some() {
            poll_timer = None;
            now_playing_timer = None;
            debug!("timers dropped");
        }
        let deadline = engine.next_deadline();

        tokio::select! {
            biased;

            // The flip is the only hard deadline
            () = wait_until(deadline) => engine.on_deadline(),
            request = rx.recv() => {
                let Some(request) = request else {
                    debug!("all player handles dropped");
                    break;
                };
                if !handle_request(&mut engine, request) {
                    break;
                }
            }
            () = tick(&mut poll_timer) => engine.poll(),
            () = tick(&mut now_playing_timer) => engine.publish_now_playing(),
        }
    }

    engine.teardown();
    info!("player stopped");
}

/// Returns false when the task should exit
fn handle_request(engine: &mut PlaybackEngine, request: Request) -> bool {
    match request {
        Request::Command(command, reply) => {
            let _ = reply.send(engine.apply(command));
        }
        Request::Remote(command, reply) => {
            let _ = reply.send(engine.handle_remote_command(command));
        }
        Request::Signal(signal) => engine.handle_session_signal(signal),
        Request::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot());
        }
        Request::Shutdown => return false,
    }
    true
}

/// First tick one period from now
fn timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPair;
    use crate::sim::{SimClock, SimLibrary, SimulatedBuffer};
    use crate::types::{PlaybackConfig, PlaybackState};

    fn spawn() -> (PlayerHandle, JoinHandle<()>) {
        let clock = SimClock::new();
        let library = SimLibrary::new();
        library.insert("/music/t1.flac", Duration::from_secs(5));
        let engine = PlaybackEngine::new(
            PlaybackConfig::default(),
            BufferPair::new(
                Box::new(SimulatedBuffer::new("A", clock.clone(), library.clone())),
                Box::new(SimulatedBuffer::new("B", clock, library)),
            ),
        );
        Player::spawn(engine)
    }

    #[tokio::test(start_paused = true)]
    async fn commands_round_trip() {
        let (player, _task) = spawn();
        player
            .set_original_queue(vec![TrackRef::new(
                "t1",
                "/music/t1.flac",
                Duration::from_secs(5),
            )])
            .await
            .unwrap();
        player.play().await.unwrap();

        let snapshot = player.snapshot().await.unwrap();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.current_track.unwrap().id, "t1");
    }

    #[tokio::test(start_paused = true)]
    async fn errors_come_back_to_the_caller() {
        let (player, _task) = spawn();
        assert_eq!(player.play().await, Err(PlaybackError::EmptyQueue));
        assert_eq!(
            player.play_item(3).await,
            Err(PlaybackError::IndexOutOfBounds(3))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_handle() {
        let (player, task) = spawn();
        player.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(player.play().await, Err(PlaybackError::PlayerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_the_task() {
        let (player, task) = spawn();
        let other = player.clone();
        drop(player);
        drop(other);
        task.await.unwrap();
    }
}
