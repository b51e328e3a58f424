//! Shared helpers for integration tests
#![allow(dead_code)]

use segue_playback::sim::{SimClock, SimLibrary, SimObserver, SimulatedBuffer};
use segue_playback::{
    BufferId, BufferPair, PlaybackConfig, PlaybackEngine, PlaybackEvent, TrackRef,
};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::broadcast;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn track(id: &str, secs: u64) -> TrackRef {
    TrackRef::new(id, format!("/music/{id}.flac"), Duration::from_secs(secs))
        .with_metadata(format!("Title {id}"), "Test Artist")
}

/// Engine over two simulated buffers, with observers kept outside
pub struct Rig {
    pub engine: PlaybackEngine,
    pub library: SimLibrary,
    pub clock: SimClock,
    a: SimObserver,
    b: SimObserver,
}

impl Rig {
    pub fn observer(&self, id: BufferId) -> &SimObserver {
        match id {
            BufferId::A => &self.a,
            BufferId::B => &self.b,
        }
    }

    pub fn active(&self) -> &SimObserver {
        self.observer(self.engine.buffers().active_id())
    }

    pub fn standby(&self) -> &SimObserver {
        self.observer(self.engine.buffers().active_id().other())
    }

    pub fn current_id(&self) -> Option<String> {
        self.engine.current_track().map(|t| t.id.clone())
    }
}

pub fn buffers(clock: &SimClock, library: &SimLibrary) -> (BufferPair, SimObserver, SimObserver) {
    let a = SimulatedBuffer::new("A", clock.clone(), library.clone());
    let b = SimulatedBuffer::new("B", clock.clone(), library.clone());
    let (obs_a, obs_b) = (a.observer(), b.observer());
    (BufferPair::new(Box::new(a), Box::new(b)), obs_a, obs_b)
}

pub fn library(tracks: &[TrackRef]) -> SimLibrary {
    let library = SimLibrary::new();
    for t in tracks {
        library.insert(t.locator.clone(), t.duration);
    }
    library
}

pub fn rig_with(config: PlaybackConfig, tracks: &[TrackRef]) -> Rig {
    init_tracing();
    let clock = SimClock::new();
    let library = library(tracks);
    let (pair, a, b) = buffers(&clock, &library);
    let mut engine = PlaybackEngine::new(config, pair);
    engine.set_original_queue(tracks.to_vec());
    Rig {
        engine,
        library,
        clock,
        a,
        b,
    }
}

pub fn rig(tracks: &[TrackRef]) -> Rig {
    rig_with(PlaybackConfig::default(), tracks)
}

/// Everything published so far
pub fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Advance paused time, polling once per step like the player task would
pub async fn advance_polling(rig: &mut Rig, steps: u32, step: Duration) {
    for _ in 0..steps {
        tokio::time::advance(step).await;
        rig.engine.poll();
        rig.engine.on_deadline();
    }
}
