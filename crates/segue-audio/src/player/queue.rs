//! Queue editing: removing and reordering tracks.

use rand::seq::SliceRandom;
use rand::Rng;
use segue_core::{Error, Result, TrackId};
use tracing::{debug, info};

use super::state::PlaybackState;
use super::Player;

impl Player {
    /// Remove the track at `position`, or the current one when `None`.
    ///
    /// Removing an earlier track keeps the current one playing. Removing the
    /// current track moves playback to the start of the track that follows
    /// it; removing the current last track wraps around and uses up a queue
    /// loop, stopping on the final one. An emptied queue stops playback.
    pub fn dequeue(&self, position: Option<usize>) -> Result<TrackId> {
        let mut queue = self.shared.queue.lock();
        let len = queue.len();
        let index = position
            .or(queue.cursor.queue_pos)
            .ok_or(Error::EmptyQueue)?;
        if index >= len {
            return Err(Error::QueuePosition {
                position: index,
                len,
            });
        }

        let removed = queue.entries.remove(index);
        let remaining = queue.len();

        if remaining == 0 {
            queue.cursor.queue_pos = None;
            queue.cursor.frame_pos = 0;
            self.shared.set_state(PlaybackState::Stopped);
        } else if let Some(pos) = queue.cursor.queue_pos {
            if index < pos {
                queue.cursor.queue_pos = Some(pos - 1);
            } else if index == pos {
                queue.cursor.frame_pos = 0;
                if index < remaining {
                    queue.cursor.queue_pos = Some(index);
                } else {
                    // Removed the last track: wrap like next_track does
                    queue.cursor.queue_pos = Some(0);
                    if !queue.loops.consume() {
                        self.shared.set_state(PlaybackState::Stopped);
                    }
                }
            }
        }
        drop(queue);

        info!(
            "Dequeued {} from position {}",
            removed.track.display_name(),
            index
        );
        Ok(removed.track.id)
    }

    /// Randomly reorder the queue.
    ///
    /// With `keep_position` the current track stays at its index and keeps
    /// playing; everything else is permuted around it.
    pub fn shuffle(&self, keep_position: bool) {
        self.shuffle_with(&mut rand::thread_rng(), keep_position);
    }

    /// [`Player::shuffle`] with a caller-supplied random source.
    pub fn shuffle_with<R: Rng + ?Sized>(&self, rng: &mut R, keep_position: bool) {
        let mut queue = self.shared.queue.lock();
        let Some(pos) = queue.cursor.queue_pos else {
            return;
        };

        if keep_position {
            let current = queue.entries.remove(pos);
            queue.entries.shuffle(rng);
            queue.entries.insert(pos, current);
        } else {
            let current = queue.entries[pos].track.id;
            queue.entries.shuffle(rng);
            if queue.entries[pos].track.id != current {
                queue.cursor.frame_pos = 0;
            }
        }

        debug!(
            "Shuffled {} tracks (keep position: {})",
            queue.len(),
            keep_position
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::super::testing::*;
    use super::super::QueueLoops;
    use super::*;

    fn names(player: &Player) -> Vec<String> {
        player
            .tracks()
            .iter()
            .map(|t| segue_core::display_name(&t.source))
            .collect()
    }

    #[test]
    fn test_dequeue_before_current() {
        let player = player_with(&[100, 100, 100]);
        player.next_track().unwrap();
        player.next_track().unwrap();
        render_block_playing(&player);

        let removed = player.dequeue(Some(1)).unwrap();
        assert_eq!(player.len(), 2);
        assert_eq!(player.queue_position(), Some(1));
        assert_eq!(player.current_track().as_deref(), Some("c.wav"));
        assert_eq!(player.frame_position(), 10);
        assert!(!player.tracks().iter().any(|t| t.id == removed));
    }

    #[test]
    fn test_dequeue_current_advances() {
        let player = player_with(&[100, 100, 100]);
        player.next_track().unwrap();
        render_block_playing(&player);

        player.dequeue(None).unwrap();
        assert_eq!(names(&player), vec!["a.wav", "c.wav"]);
        assert_eq!(player.current_track().as_deref(), Some("c.wav"));
        assert_eq!(player.frame_position(), 0);

        player.play().unwrap();
        let out = render_block(&player, 10);
        assert!(out.iter().all(|&s| s == 0.3));
        assert_eq!(player.frame_position(), 10);
    }

    #[test]
    fn test_dequeue_current_last_ends_queue() {
        let player = player_with(&[100, 100]);
        player.loop_queue(1);
        player.next_track().unwrap();
        player.play().unwrap();

        player.dequeue(None).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.queue_loops(), QueueLoops::default());
    }

    #[test]
    fn test_dequeue_current_last_with_queue_loops_continues() {
        let player = player_with(&[100, 100]);
        player.loop_queue(2);
        player.next_track().unwrap();
        player.play().unwrap();

        player.dequeue(None).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.queue_loops().remaining, 1);
    }

    #[test]
    fn test_dequeue_last_current_wraps() {
        let player = player_with(&[100, 100]);
        player.next_track().unwrap();
        player.dequeue(None).unwrap();
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.current_track().as_deref(), Some("a.wav"));
    }

    #[test]
    fn test_dequeue_after_current_keeps_position() {
        let player = player_with(&[100, 100, 100]);
        render_block_playing(&player);
        player.dequeue(Some(2)).unwrap();
        assert_eq!(player.queue_position(), Some(0));
        assert_eq!(player.frame_position(), 10);
    }

    #[test]
    fn test_dequeue_everything_stops() {
        let player = player_with(&[100]);
        player.play().unwrap();
        player.dequeue(None).unwrap();
        assert!(player.is_empty());
        assert_eq!(player.queue_position(), None);
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(matches!(player.dequeue(None), Err(Error::EmptyQueue)));
    }

    #[test]
    fn test_dequeue_out_of_range() {
        let player = player_with(&[100, 100]);
        assert!(matches!(
            player.dequeue(Some(5)),
            Err(Error::QueuePosition {
                position: 5,
                len: 2
            })
        ));
        assert_eq!(player.len(), 2);
    }

    #[test]
    fn test_shuffle_keeps_current() {
        let player = player_with(&[10, 10, 10, 10, 10, 10]);
        player.next_track().unwrap();
        player.next_track().unwrap();
        let before = names(&player);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            player.shuffle_with(&mut rng, true);
            let after = names(&player);
            assert_eq!(after[2], "c.wav");
            assert_eq!(player.queue_position(), Some(2));

            let mut sorted = after.clone();
            sorted.sort();
            assert_eq!(sorted, before);
        }
    }

    #[test]
    fn test_shuffle_without_keep_is_permutation() {
        let player = player_with(&[10, 10, 10, 10]);
        let mut rng = StdRng::seed_from_u64(42);
        player.shuffle_with(&mut rng, false);

        let mut sorted = names(&player);
        sorted.sort();
        assert_eq!(sorted, vec!["a.wav", "b.wav", "c.wav", "d.wav"]);
        assert_eq!(player.queue_position(), Some(0));
    }

    #[test]
    fn test_shuffle_empty_queue() {
        let player = player_with(&[]);
        player.shuffle(true);
        assert!(player.is_empty());
    }

    /// Play one 10-frame block, then pause.
    fn render_block_playing(player: &Player) {
        player.play().unwrap();
        render_block(player, 10);
        player.pause();
    }
}
