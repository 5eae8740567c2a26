//! State shared between the player handle, the render callback and the
//! background threads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use segue_core::{PlayerConfig, Track, TrackId};
use tracing::debug;

/// Playback state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// Events emitted by the player on its status channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback state changed.
    StateChanged(PlaybackState),
    /// A track finished all its loops; `index` is the queue position it had.
    TrackEnded { index: usize },
    /// The queue finished all its loops and playback stopped.
    QueueEnded,
    /// A track was decoded and appended at `position`.
    TrackLoaded { id: TrackId, position: usize },
    /// Loading a source failed.
    LoadFailed { source: PathBuf, error: String },
    /// A volume ramp reached its target.
    VolumeReached(f32),
}

/// Lock-free playback state cell.
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new(state: PlaybackState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> PlaybackState {
        PlaybackState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state and return the previous one.
    pub(crate) fn swap(&self, state: PlaybackState) -> PlaybackState {
        PlaybackState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    /// Move from `from` to `to`; returns false if the state was not `from`.
    pub(crate) fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// An `f32` stored as bits in an atomic.
pub(crate) struct AtomicVolume(AtomicU32);

impl AtomicVolume {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// A completion flag raised by the render path.
pub(crate) struct Marker(AtomicBool);

impl Marker {
    pub(crate) const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub(crate) fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One queued track and its remaining plays (0 = infinite).
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    pub(crate) track: Arc<Track>,
    pub(crate) loops: u32,
}

/// Where playback currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Index into the queue; `None` iff the queue is empty.
    pub queue_pos: Option<usize>,
    /// Frame offset into the current track.
    pub frame_pos: usize,
}

/// Loop counters for the whole queue (0 = infinite).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLoops {
    pub initial: u32,
    pub remaining: u32,
}

impl Default for QueueLoops {
    fn default() -> Self {
        Self {
            initial: 1,
            remaining: 1,
        }
    }
}

impl QueueLoops {
    /// Consume one pass over the queue.
    ///
    /// Returns false when the last pass just finished; the counter is then
    /// reset to its initial value for the next run.
    pub(crate) fn consume(&mut self) -> bool {
        match self.remaining {
            0 => true,
            1 => {
                self.remaining = self.initial;
                false
            }
            _ => {
                self.remaining -= 1;
                true
            }
        }
    }
}

/// What happened when the current track ran out of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// The track has plays left and restarts from frame 0.
    Repeat,
    /// The track is done; the cursor moved to the next queue position.
    Advanced { ended: usize },
    /// The track and the queue are done; the cursor is back at index 0.
    QueueEnded { ended: usize },
}

/// The track store together with the cursor and loop counters.
///
/// Guarded by one mutex; the render path only ever `try_lock`s it.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) entries: Vec<QueueEntry>,
    pub(crate) cursor: Cursor,
    pub(crate) loops: QueueLoops,
}

impl QueueState {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn current(&self) -> Option<&QueueEntry> {
        self.cursor.queue_pos.and_then(|i| self.entries.get(i))
    }

    /// Append a track with a single play; returns its position.
    pub(crate) fn push(&mut self, track: Arc<Track>) -> usize {
        self.entries.push(QueueEntry { track, loops: 1 });
        if self.cursor.queue_pos.is_none() {
            self.cursor = Cursor {
                queue_pos: Some(0),
                frame_pos: 0,
            };
        }
        self.entries.len() - 1
    }

    /// Apply the loop disposition of the current track after its last frame.
    pub(crate) fn finish_track(&mut self) -> Boundary {
        self.cursor.frame_pos = 0;

        let Some(pos) = self.cursor.queue_pos else {
            return Boundary::QueueEnded { ended: 0 };
        };
        let len = self.entries.len();
        let Some(entry) = self.entries.get_mut(pos) else {
            return Boundary::QueueEnded { ended: pos };
        };

        match entry.loops {
            0 => Boundary::Repeat,
            n if n > 1 => {
                entry.loops -= 1;
                Boundary::Repeat
            }
            _ => {
                if pos + 1 < len {
                    self.cursor.queue_pos = Some(pos + 1);
                    Boundary::Advanced { ended: pos }
                } else {
                    self.cursor.queue_pos = Some(0);
                    if self.loops.consume() {
                        Boundary::Advanced { ended: pos }
                    } else {
                        Boundary::QueueEnded { ended: pos }
                    }
                }
            }
        }
    }
}

/// A pending one-shot completion callback.
pub(crate) struct PendingCallback {
    pub(crate) generation: u64,
    pub(crate) callback: Box<dyn FnOnce() + Send>,
}

/// Which completion marker a waiter is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Track,
    Queue,
}

impl Completion {
    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Queue => "queue",
        }
    }
}

/// Current volume ramp: target level and decibels per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VolumeRamp {
    pub(crate) target: f32,
    pub(crate) step_db: f32,
}

/// Everything the player's threads share.
pub(crate) struct Shared {
    pub(crate) config: PlayerConfig,
    pub(crate) state: AtomicState,
    pub(crate) volume: AtomicVolume,
    pub(crate) ramp: Mutex<Option<VolumeRamp>>,
    pub(crate) queue: Mutex<QueueState>,
    pub(crate) track_ended: Marker,
    pub(crate) queue_ended: Marker,
    pub(crate) track_callback: Mutex<Option<PendingCallback>>,
    pub(crate) queue_callback: Mutex<Option<PendingCallback>>,
    pub(crate) callback_generation: AtomicU64,
    /// Loads submitted and not yet finished.
    pub(crate) loading: AtomicUsize,
    pub(crate) end: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
    events: Sender<PlayerEvent>,
}

impl Shared {
    pub(crate) fn new(config: PlayerConfig, events: Sender<PlayerEvent>) -> Self {
        Self {
            config,
            state: AtomicState::new(PlaybackState::Stopped),
            volume: AtomicVolume::new(1.0),
            ramp: Mutex::new(None),
            queue: Mutex::new(QueueState::default()),
            track_ended: Marker::new(),
            queue_ended: Marker::new(),
            track_callback: Mutex::new(None),
            queue_callback: Mutex::new(None),
            callback_generation: AtomicU64::new(0),
            loading: AtomicUsize::new(0),
            end: AtomicBool::new(false),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
            events,
        }
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.end.load(Ordering::Acquire)
    }

    /// Publish an event without blocking; dropped if nobody keeps up.
    pub(crate) fn emit(&self, event: PlayerEvent) {
        let _ = self.events.try_send(event);
    }

    /// Change the playback state, emitting an event if it differs.
    pub(crate) fn set_state(&self, state: PlaybackState) {
        let old = self.state.swap(state);
        if old != state {
            debug!("State changed: {:?} -> {:?}", old, state);
            self.emit(PlayerEvent::StateChanged(state));
        }
    }

    pub(crate) const fn marker(&self, which: Completion) -> &Marker {
        match which {
            Completion::Track => &self.track_ended,
            Completion::Queue => &self.queue_ended,
        }
    }

    pub(crate) const fn callback_slot(&self, which: Completion) -> &Mutex<Option<PendingCallback>> {
        match which {
            Completion::Track => &self.track_callback,
            Completion::Queue => &self.queue_callback,
        }
    }

    /// Wake every thread parked in [`Shared::park`].
    pub(crate) fn notify(&self) {
        self.wake.notify_all();
    }

    /// Sleep for up to `timeout`, waking early on [`Shared::notify`].
    ///
    /// Returns false once the player has been terminated.
    pub(crate) fn park(&self, timeout: Duration) -> bool {
        if self.is_ended() {
            return false;
        }
        let mut guard = self.wake_lock.lock();
        self.wake.wait_for(&mut guard, timeout);
        !self.is_ended()
    }
}
