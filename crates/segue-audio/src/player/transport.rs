//! Transport controls: play/pause/stop, skipping, looping and seeking.

use segue_core::{Error, Result, Timecode};
use tracing::{debug, warn};

use super::state::PlaybackState;
use super::Player;

impl Player {
    /// Start or resume playback.
    ///
    /// Fails with [`Error::EmptyQueue`] and leaves the state alone if
    /// nothing is queued.
    pub fn play(&self) -> Result<()> {
        if self.shared.queue.lock().entries.is_empty() {
            warn!("Cannot play: the queue is empty, add an audio track first");
            return Err(Error::EmptyQueue);
        }
        self.shared.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Pause playback, keeping the position. Does nothing unless playing.
    pub fn pause(&self) {
        if self
            .shared
            .state
            .transition(PlaybackState::Playing, PlaybackState::Paused)
        {
            debug!("State changed: Playing -> Paused");
            self.shared
                .emit(super::PlayerEvent::StateChanged(PlaybackState::Paused));
        }
    }

    /// Stop playback and rewind the current track.
    pub fn stop(&self) {
        let mut queue = self.shared.queue.lock();
        self.shared.set_state(PlaybackState::Stopped);
        queue.cursor.frame_pos = 0;
    }

    /// Toggle between playing and paused.
    pub fn play_pause(&self) -> Result<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Skip to the start of the next track.
    ///
    /// From the last track this wraps to the first; if that used up the
    /// last queue loop, playback stops and the loop counter is reset.
    pub fn next_track(&self) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        let Some(pos) = queue.cursor.queue_pos else {
            return Err(Error::EmptyQueue);
        };
        let len = queue.len();

        queue.cursor.frame_pos = 0;
        if pos + 1 >= len && !queue.loops.consume() {
            self.shared.set_state(PlaybackState::Stopped);
        }
        queue.cursor.queue_pos = Some((pos + 1) % len);

        debug!("Skipped from track {} to {}", pos, (pos + 1) % len);
        Ok(())
    }

    /// Set the number of plays of a track (0 = forever).
    ///
    /// `track` defaults to the current one. The playback position is kept.
    pub fn loop_track(&self, track: Option<usize>, loops: u32) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        let len = queue.len();
        let index = track
            .or(queue.cursor.queue_pos)
            .ok_or(Error::EmptyQueue)?;
        let entry = queue
            .entries
            .get_mut(index)
            .ok_or(Error::QueuePosition {
                position: index,
                len,
            })?;

        entry.loops = loops;
        debug!("Track {} set to {} loops", index, loops);
        Ok(())
    }

    /// Set the number of passes over the whole queue (0 = forever).
    pub fn loop_queue(&self, loops: u32) {
        let mut queue = self.shared.queue.lock();
        queue.loops.initial = loops;
        queue.loops.remaining = loops;
        debug!("Queue set to {} loops", loops);
    }

    /// Seek within the current track.
    ///
    /// Accepts plain seconds or a parsed [`Timecode`]; positions at or past
    /// the end of the track are rejected and the position is unchanged.
    pub fn jump_to(&self, position: impl Into<Timecode>) -> Result<()> {
        let position = position.into();
        let rate = self.shared.config.sample_rate;

        let mut queue = self.shared.queue.lock();
        let len = queue.current().ok_or(Error::EmptyQueue)?.track.len();
        let frame = position.to_frames(rate);

        if frame >= len as u64 {
            return Err(Error::SeekOutOfRange {
                seconds: position.as_seconds(),
                track_secs: len as f64 / f64::from(rate),
            });
        }

        queue.cursor.frame_pos = frame as usize;
        debug!("Jumped to {} (frame {})", position, frame);
        Ok(())
    }

    /// Seek using a `"ss"`, `"mm:ss"` or `"h:mm:ss"` string.
    pub fn jump_to_str(&self, position: &str) -> Result<()> {
        self.jump_to(position.parse::<Timecode>()?)
    }
}
