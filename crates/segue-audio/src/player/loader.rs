//! Track loading.
//!
//! Loads run one at a time on a dedicated worker thread: probe, memory
//! check, decode, resample, then append under the queue lock. A track is
//! only visible to the rest of the player once it is fully appended.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use segue_core::{display_name, Error, Result, Track, TrackId};
use tracing::{debug, info, warn};

use super::state::{PlayerEvent, Shared};
use super::Player;
use crate::decode::Decode;
use crate::memory::{ensure_capacity, MemoryProbe};
use crate::resample::resample;

/// A request to load one source.
pub(crate) struct LoadJob {
    pub(crate) source: PathBuf,
    pub(crate) reply: Sender<Result<TrackId>>,
}

impl Player {
    /// Load a file and append it to the queue, waiting for the result.
    ///
    /// Waits behind any loads already in progress.
    pub fn queue(&self, source: impl AsRef<Path>) -> Result<TrackId> {
        let name = display_name(source.as_ref());
        let reply = self.queue_async(source)?;
        let started = Instant::now();
        let mut reported = false;

        loop {
            match reply.recv_timeout(self.shared.config.load_poll_interval()) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.is_ended() {
                        return Err(Error::Terminated);
                    }
                    if !reported && started.elapsed() >= self.shared.config.load_wait_report() {
                        warn!(
                            "Still loading {} after {:.1}s",
                            name,
                            started.elapsed().as_secs_f64()
                        );
                        reported = true;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::Terminated),
            }
        }
    }

    /// Submit a load without waiting.
    ///
    /// The returned channel yields the outcome once the track has been
    /// appended or rejected. Progress is visible through
    /// [`Player::is_loading`] and the event channel.
    pub fn queue_async(&self, source: impl AsRef<Path>) -> Result<Receiver<Result<TrackId>>> {
        if self.shared.is_ended() {
            return Err(Error::Terminated);
        }

        let source = source.as_ref().to_path_buf();
        let (reply, outcome) = bounded(1);
        self.shared.loading.fetch_add(1, Ordering::AcqRel);

        debug!("Submitting load of {}", source.display());
        if self.load_tx.send(LoadJob { source, reply }).is_err() {
            self.shared.loading.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Terminated);
        }

        Ok(outcome)
    }

    /// True while any submitted load has not finished.
    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::Acquire) > 0
    }

    /// Block until every submitted load has finished.
    ///
    /// Returns false if the player was terminated first.
    pub fn wait_for_loading(&self) -> bool {
        while self.is_loading() {
            if !self.shared.park(self.shared.config.load_poll_interval()) {
                return false;
            }
        }
        true
    }
}

/// Loader thread body. Exits on terminate or when the player is dropped.
pub(super) fn run_loader(
    shared: &Shared,
    decoder: &dyn Decode,
    memory: &dyn MemoryProbe,
    jobs: &Receiver<LoadJob>,
) {
    debug!("Loader started");

    loop {
        match jobs.recv_timeout(shared.config.load_poll_interval()) {
            Ok(job) => {
                let result = if shared.is_ended() {
                    Err(Error::Terminated)
                } else {
                    load_track(shared, decoder, memory, &job.source)
                };

                if let Err(e) = &result {
                    warn!("Failed to load {}: {e}", job.source.display());
                    shared.emit(PlayerEvent::LoadFailed {
                        source: job.source.clone(),
                        error: e.to_string(),
                    });
                }

                shared.loading.fetch_sub(1, Ordering::AcqRel);
                shared.notify();
                let _ = job.reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.is_ended() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Loader stopped");
}

fn load_track(
    shared: &Shared,
    decoder: &dyn Decode,
    memory: &dyn MemoryProbe,
    source: &Path,
) -> Result<TrackId> {
    let rate = shared.config.sample_rate;
    let info = decoder.probe(source)?;

    match info.estimated_bytes() {
        Some(bytes) => ensure_capacity(memory, bytes, shared.config.ram_headroom_bytes)?,
        None => debug!(
            "Length of {} unknown, skipping memory check",
            source.display()
        ),
    }

    let decoded = decoder.decode(source)?;
    if decoded.frames.is_empty() {
        return Err(Error::AudioDecode(format!(
            "{} contains no audio",
            source.display()
        )));
    }

    let samples = resample(decoded.frames, decoded.sample_rate, rate)?;
    let track = Arc::new(Track::new(source, samples));
    let id = track.id;
    let secs = track.duration_secs(rate);
    let name = track.display_name();

    let position = shared.queue.lock().push(track);

    info!("Loaded {} at position {} ({:.1}s)", name, position, secs);
    shared.emit(PlayerEvent::TrackLoaded { id, position });
    Ok(id)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use super::super::testing::*;
    use super::*;
    use crate::memory::FixedMemory;

    fn player(decoder: StubDecoder, memory: u64) -> Player {
        Player::headless(
            test_config(),
            Arc::new(decoder),
            Arc::new(FixedMemory(memory)),
        )
        .unwrap()
    }

    #[test]
    fn test_first_load_sets_position() {
        let player = player(StubDecoder::default().with("a.wav", 100, 0.1, 1000), u64::MAX);
        assert_eq!(player.queue_position(), None);

        let id = player.queue("a.wav").unwrap();
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.tracks()[0].id, id);
        assert_eq!(player.track_loops(0), Some(1));
        assert!(!player.is_loading());
    }

    #[test]
    fn test_load_resamples_to_stream_rate() {
        let player = player(StubDecoder::default().with("half.wav", 500, 0.1, 500), u64::MAX);
        player.queue("half.wav").unwrap();
        assert_eq!(player.tracks()[0].frames, 1000);
    }

    #[test]
    fn test_insufficient_memory_leaves_queue_unchanged() {
        // 100 frames need 800 bytes; the default headroom exceeds what is free
        let player = player(StubDecoder::default().with("a.wav", 100, 0.1, 1000), 1000);
        let events = player.events();

        let err = player.queue("a.wav").unwrap_err();
        assert!(matches!(err, Error::InsufficientMemory { required: 800, .. }));
        assert!(player.is_empty());
        assert!(matches!(
            events.try_recv(),
            Ok(PlayerEvent::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_memory_check_uses_source_size() {
        // 100 frames at twice the stream rate: 800 bytes decoded, 400 after
        // resampling, with only 500 free beyond the headroom
        let headroom = test_config().ram_headroom_bytes;
        let player = player(
            StubDecoder::default().with("double.wav", 100, 0.1, 2000),
            headroom + 500,
        );

        assert!(matches!(
            player.queue("double.wav"),
            Err(Error::InsufficientMemory { required: 800, .. })
        ));
        assert!(player.is_empty());
    }

    #[test]
    fn test_missing_source_is_decode_failure() {
        let player = player(StubDecoder::default(), u64::MAX);
        let err = player.queue("nope.wav").unwrap_err();
        assert!(matches!(err, Error::NotAudioFile(_)));
        assert!(player.is_empty());
    }

    #[test]
    fn test_empty_source_rejected() {
        let player = player(StubDecoder::default().with("empty.wav", 0, 0.0, 1000), u64::MAX);
        assert!(matches!(
            player.queue("empty.wav"),
            Err(Error::AudioDecode(_))
        ));
        assert!(player.is_empty());
    }

    #[test]
    fn test_async_loads_keep_submission_order() {
        let decoder = StubDecoder::default()
            .with("a.wav", 10, 0.1, 1000)
            .with("b.wav", 10, 0.2, 1000)
            .with("c.wav", 10, 0.3, 1000);
        let player = player(decoder, u64::MAX);

        let replies: Vec<_> = ["a.wav", "b.wav", "c.wav"]
            .iter()
            .map(|name| player.queue_async(name).unwrap())
            .collect();
        assert!(player.wait_for_loading());
        assert!(!player.is_loading());

        let ids: Vec<TrackId> = replies
            .iter()
            .map(|r| r.recv_timeout(Duration::from_secs(1)).unwrap().unwrap())
            .collect();
        let queued: Vec<TrackId> = player.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, queued);
    }

    #[test]
    fn test_queue_after_terminate() {
        let player = player(StubDecoder::default().with("a.wav", 10, 0.1, 1000), u64::MAX);
        player.terminate();
        assert!(matches!(player.queue("a.wav"), Err(Error::Terminated)));
        assert!(player.wait_for_loading());
    }
}
