//! The real-time render callback.
//!
//! Invoked by the output stream with an interleaved stereo buffer. It never
//! blocks: the queue is only `try_lock`ed, and if another thread holds it the
//! block is rendered as silence. Nothing here allocates.

use std::sync::Arc;

use tracing::trace;

use super::state::{Boundary, PlaybackState, PlayerEvent, QueueState, Shared};

/// What a single render call crossed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RenderOutcome {
    /// Queue index of the last track that finished, if any.
    pub(crate) track_ended: Option<usize>,
    pub(crate) queue_ended: bool,
}

/// Handle for driving the player from an external output stream.
#[derive(Clone)]
pub struct Renderer {
    shared: Arc<Shared>,
}

impl Renderer {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Fill `out` with interleaved stereo samples.
    ///
    /// Always writes every sample of `out`; a trailing odd sample is zeroed.
    pub fn render(&self, out: &mut [f32]) {
        let shared = &*self.shared;

        if shared.state.load() != PlaybackState::Playing {
            out.fill(0.0);
            return;
        }

        let Some(mut queue) = shared.queue.try_lock() else {
            trace!("Queue busy, rendering {} frames of silence", out.len() / 2);
            out.fill(0.0);
            return;
        };

        let outcome = fill(&mut queue, out, shared.volume.load());
        if outcome.queue_ended {
            shared.set_state(PlaybackState::Stopped);
        }
        drop(queue);

        if let Some(index) = outcome.track_ended {
            shared.track_ended.set();
            shared.emit(PlayerEvent::TrackEnded { index });
        }
        if outcome.queue_ended {
            shared.queue_ended.set();
            shared.emit(PlayerEvent::QueueEnded);
        }
        if outcome.track_ended.is_some() {
            shared.notify();
        }
    }
}

/// Copy frames from the queue into `out`, crossing as many track
/// boundaries as the buffer needs.
///
/// Stops at the end of the queue and zero-fills whatever is left.
pub(crate) fn fill(queue: &mut QueueState, out: &mut [f32], volume: f32) -> RenderOutcome {
    let frames = out.len() / 2;
    let mut written = 0;
    let mut outcome = RenderOutcome::default();

    while written < frames {
        let Some(entry) = queue.current() else {
            break;
        };
        let samples = &entry.track.samples;
        let len = samples.len();
        if len == 0 {
            // Empty tracks never load; stay silent rather than spin
            break;
        }

        let start = queue.cursor.frame_pos.min(len);
        let n = (len - start).min(frames - written);
        let dst = &mut out[written * 2..(written + n) * 2];
        for (pair, [l, r]) in dst.chunks_exact_mut(2).zip(&samples[start..start + n]) {
            pair[0] = l * volume;
            pair[1] = r * volume;
        }

        written += n;
        queue.cursor.frame_pos = start + n;
        if queue.cursor.frame_pos < len {
            break;
        }

        match queue.finish_track() {
            Boundary::Repeat => {}
            Boundary::Advanced { ended } => outcome.track_ended = Some(ended),
            Boundary::QueueEnded { ended } => {
                outcome.track_ended = Some(ended);
                outcome.queue_ended = true;
                break;
            }
        }
    }

    out[written * 2..].fill(0.0);
    outcome
}
