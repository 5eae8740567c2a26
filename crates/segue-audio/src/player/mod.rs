//! Queue-driven playback.
//!
//! A [`Player`] owns an ordered queue of decoded tracks and feeds the output
//! stream through its [`Renderer`]. Control calls may come from any thread;
//! the render callback only ever `try_lock`s the queue and otherwise works
//! on atomics.

mod loader;
mod queue;
mod render;
mod state;
mod transport;
mod volume;
mod wait;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use segue_core::{gain_to_db, PlayerConfig, Result, TrackId};
use tracing::{debug, error, info};

use crate::decode::{Decode, SymphoniaDecoder};
use crate::memory::{MemoryProbe, SystemMemory};
use crate::output::AudioOutput;

use loader::LoadJob;
use state::Shared;

pub use render::Renderer;
pub use state::{Cursor, PlaybackState, PlayerEvent, QueueLoops};

/// Snapshot of one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub source: PathBuf,
    pub frames: usize,
    /// Remaining plays (0 = infinite).
    pub loops: u32,
}

/// Queue player with transport, looping, seeking and fades.
pub struct Player {
    shared: Arc<Shared>,
    load_tx: Sender<LoadJob>,
    event_rx: Receiver<PlayerEvent>,
    /// Threads joined on terminate; the loader is left to finish its job.
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Player {
    /// Create a player on the default output device.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        let player = Self::headless(
            config,
            Arc::new(SymphoniaDecoder),
            Arc::new(SystemMemory::new()),
        )?;
        player.start_output()?;
        Ok(player)
    }

    /// Create a player without an output device.
    ///
    /// Drive it through [`Player::renderer`] from any stream.
    pub fn headless(
        config: PlayerConfig,
        decoder: Arc<dyn Decode>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, event_rx) = bounded(config.event_capacity);
        let (load_tx, load_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(config, event_tx));

        let ramp_shared = Arc::clone(&shared);
        let ramp = std::thread::Builder::new()
            .name("segue-volume".to_string())
            .spawn(move || volume::run_ramp(&ramp_shared))?;

        let loader_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("segue-loader".to_string())
            .spawn(move || loader::run_loader(&loader_shared, &*decoder, &*memory, &load_rx))?;

        info!(
            "Player created: {} Hz, block size {}",
            shared.config.sample_rate, shared.config.block_size
        );

        Ok(Self {
            shared,
            load_tx,
            event_rx,
            threads: Mutex::new(vec![ramp]),
        })
    }

    /// Open the default device and keep it running until terminate.
    fn start_output(&self) -> Result<()> {
        let (ready_tx, ready_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let renderer = self.renderer();

        // cpal::Stream is not Send, so it lives and dies on its own thread
        let handle = std::thread::Builder::new()
            .name("segue-output".to_string())
            .spawn(move || match AudioOutput::new(renderer, &shared.config) {
                Ok(output) => {
                    info!(
                        "Audio output initialized: {} Hz, {} channels, device: {}",
                        output.sample_rate(),
                        output.channels(),
                        output.device_name()
                    );
                    let _ = ready_tx.send(Ok(()));
                    while shared.park(shared.config.min_delay()) {}
                    output.close();
                    debug!("Audio output closed");
                }
                Err(e) => {
                    error!("Failed to initialize audio output: {e}");
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        self.threads.lock().push(handle);

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| {
                Err(segue_core::Error::AudioOutput(
                    "Output thread exited during setup".to_string(),
                ))
            });
        if ready.is_err() {
            self.terminate();
        }
        ready
    }

    /// Handle for rendering this player's audio.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(Arc::clone(&self.shared))
    }

    /// Status channel. Events are dropped when nobody drains it.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.event_rx.clone()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.shared.state.load()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Current volume as an absolute factor.
    pub fn volume(&self) -> f32 {
        self.shared.volume.load()
    }

    /// Current volume in decibels.
    pub fn volume_db(&self) -> f32 {
        gain_to_db(self.volume())
    }

    /// Number of queued tracks.
    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the current track.
    pub fn queue_position(&self) -> Option<usize> {
        self.shared.queue.lock().cursor.queue_pos
    }

    /// Frame offset into the current track.
    pub fn frame_position(&self) -> usize {
        self.shared.queue.lock().cursor.frame_pos
    }

    pub fn cursor(&self) -> Cursor {
        self.shared.queue.lock().cursor
    }

    /// Seconds played of the current track.
    pub fn position_secs(&self) -> f64 {
        self.frame_position() as f64 / f64::from(self.shared.config.sample_rate)
    }

    /// Remaining plays of the track at `index`.
    pub fn track_loops(&self, index: usize) -> Option<u32> {
        self.shared.queue.lock().entries.get(index).map(|e| e.loops)
    }

    pub fn queue_loops(&self) -> QueueLoops {
        self.shared.queue.lock().loops
    }

    /// Snapshot of the queue in playback order.
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.shared
            .queue
            .lock()
            .entries
            .iter()
            .map(|e| TrackInfo {
                id: e.track.id,
                source: e.track.source.clone(),
                frames: e.track.len(),
                loops: e.loops,
            })
            .collect()
    }

    /// Display name of the current track.
    pub fn current_track(&self) -> Option<String> {
        self.shared
            .queue
            .lock()
            .current()
            .map(|e| e.track.display_name())
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.is_ended()
    }

    /// Stop the output stream and background threads.
    ///
    /// Waiters wake up and return; render calls already in flight finish.
    pub fn terminate(&self) {
        if self.shared.end.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Terminating player");
        self.shared.set_state(PlaybackState::Stopped);
        self.shared.notify();

        let current = std::thread::current().id();
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Player thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators for driving a headless player.

    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use segue_core::{Error, PlayerConfig, Result};

    use super::Player;
    use crate::decode::{Decode, DecodedAudio, SourceInfo};
    use crate::memory::FixedMemory;

    /// Serves constant-valued tracks by path.
    #[derive(Default)]
    pub(crate) struct StubDecoder {
        sources: HashMap<PathBuf, DecodedAudio>,
    }

    impl StubDecoder {
        pub(crate) fn with(mut self, path: &str, frames: usize, value: f32, rate: u32) -> Self {
            self.sources.insert(
                PathBuf::from(path),
                DecodedAudio {
                    frames: vec![[value, value]; frames],
                    sample_rate: rate,
                },
            );
            self
        }
    }

    impl Decode for StubDecoder {
        fn probe(&self, path: &Path) -> Result<SourceInfo> {
            let audio = self
                .sources
                .get(path)
                .ok_or_else(|| Error::NotAudioFile(path.to_path_buf()))?;
            Ok(SourceInfo {
                frames: Some(audio.frames.len() as u64),
                sample_rate: audio.sample_rate,
                channels: 2,
            })
        }

        fn decode(&self, path: &Path) -> Result<DecodedAudio> {
            self.sources
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotAudioFile(path.to_path_buf()))
        }
    }

    pub(crate) fn test_config() -> PlayerConfig {
        PlayerConfig {
            sample_rate: 1000,
            block_size: 10,
            setting_delay_ms: 5,
            min_delay_ms: 5,
            load_poll_interval_ms: 5,
            ..PlayerConfig::default()
        }
    }

    /// Headless player with tracks `a`, `b`, `c`... of the given lengths,
    /// each filled with a value identifying it (0.1, 0.2, ...).
    pub(crate) fn player_with(lengths: &[usize]) -> Player {
        let mut decoder = StubDecoder::default();
        let names: Vec<String> = (0..lengths.len())
            .map(|i| format!("{}.wav", (b'a' + i as u8) as char))
            .collect();
        for (i, (&frames, name)) in lengths.iter().zip(&names).enumerate() {
            decoder = decoder.with(name, frames, (i + 1) as f32 / 10.0, 1000);
        }

        let player = Player::headless(
            test_config(),
            Arc::new(decoder),
            Arc::new(FixedMemory(u64::MAX)),
        )
        .unwrap();
        for name in &names {
            player.queue(name).unwrap();
        }
        player
    }

    /// Render one block of `frames` frames and return the left channel.
    pub(crate) fn render_block(player: &Player, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        player.renderer().render(&mut out);
        out.chunks_exact(2).map(|f| f[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::testing::*;
    use super::*;

    #[test]
    fn test_queries_after_load() {
        let player = player_with(&[100, 50]);
        assert_eq!(player.len(), 2);
        assert!(!player.is_empty());
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.current_track().as_deref(), Some("a.wav"));
        assert_eq!(player.state(), PlaybackState::Stopped);

        let tracks = player.tracks();
        assert_eq!(tracks[1].frames, 50);
        assert_eq!(tracks[1].loops, 1);
        assert_ne!(tracks[0].id, tracks[1].id);
        assert_eq!(player.queue_loops(), QueueLoops::default());
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let player = player_with(&[10]);
        player.terminate();
        player.terminate();
        assert!(player.is_terminated());
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_events_report_loads_and_state() {
        let player = player_with(&[10]);
        let events = player.events();
        assert!(matches!(
            events.try_recv(),
            Ok(PlayerEvent::TrackLoaded { position: 0, .. })
        ));

        player.play().unwrap();
        assert_eq!(
            events.try_recv(),
            Ok(PlayerEvent::StateChanged(PlaybackState::Playing))
        );
    }

    #[test]
    fn test_headless_rejects_bad_config() {
        let config = PlayerConfig {
            sample_rate: 0,
            ..PlayerConfig::default()
        };
        let result = Player::headless(
            config,
            Arc::new(StubDecoder::default()),
            Arc::new(crate::memory::FixedMemory(0)),
        );
        assert!(result.is_err());
    }
}
