//! Waiting for the end of a track or of the queue.
//!
//! The render path raises a marker when a track or the whole queue
//! finishes. Waiters poll it at `min_delay`, waking early on notify and
//! returning as soon as the player is terminated.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use segue_core::{Error, Result};
use tracing::{debug, info};

use super::state::{Completion, PendingCallback, Shared};
use super::Player;

impl Player {
    /// Block until the current track finishes.
    ///
    /// Runs a pending track callback afterwards, if one is registered.
    /// Returns false if the player was terminated first. With `report` the
    /// completion is logged at info level.
    pub fn wait_for_track(&self, report: bool) -> bool {
        self.wait_for(Completion::Track, report)
    }

    /// Block until the whole queue finishes and playback stops.
    pub fn wait_for_queue(&self, report: bool) -> bool {
        self.wait_for(Completion::Queue, report)
    }

    /// Run `callback` once, when the current track finishes.
    ///
    /// Replaces any track callback that has not fired yet.
    pub fn set_callback_track(&self, callback: impl FnOnce() + Send + 'static) -> Result<()> {
        self.set_callback(Completion::Track, Box::new(callback))
    }

    /// Run `callback` once, when the queue finishes.
    ///
    /// Replaces any queue callback that has not fired yet.
    pub fn set_callback_queue(&self, callback: impl FnOnce() + Send + 'static) -> Result<()> {
        self.set_callback(Completion::Queue, Box::new(callback))
    }

    /// Async form of [`Player::wait_for_track`]. Does not run callbacks.
    pub async fn wait_for_track_async(&self) -> bool {
        self.wait_async(Completion::Track).await
    }

    /// Async form of [`Player::wait_for_queue`]. Does not run callbacks.
    pub async fn wait_for_queue_async(&self) -> bool {
        self.wait_async(Completion::Queue).await
    }

    fn wait_for(&self, which: Completion, report: bool) -> bool {
        self.shared.marker(which).reset();
        if !wait_marker(&self.shared, which, None) {
            return false;
        }
        if report {
            info!("{} finished", capitalize(which.label()));
        }
        run_pending(&self.shared, which, None);
        true
    }

    async fn wait_async(&self, which: Completion) -> bool {
        let marker = self.shared.marker(which);
        marker.reset();
        loop {
            if marker.is_set() {
                return true;
            }
            if self.shared.is_ended() {
                return false;
            }
            tokio::time::sleep(self.shared.config.min_delay()).await;
        }
    }

    fn set_callback(&self, which: Completion, callback: Box<dyn FnOnce() + Send>) -> Result<()> {
        if self.shared.is_ended() {
            return Err(Error::Terminated);
        }

        let generation = self.shared.callback_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let replaced = self
            .shared
            .callback_slot(which)
            .lock()
            .replace(PendingCallback {
                generation,
                callback,
            })
            .is_some();
        if replaced {
            debug!("Replaced pending {} callback", which.label());
        }
        self.shared.marker(which).reset();

        let shared = Arc::clone(&self.shared);
        std::thread::Builder::new()
            .name(format!("segue-{}-callback", which.label()))
            .spawn(move || {
                if wait_marker(&shared, which, Some(generation)) {
                    run_pending(&shared, which, Some(generation));
                }
            })?;
        Ok(())
    }
}

/// Poll until the marker is raised.
///
/// With a `generation`, also gives up once that callback has been replaced
/// or taken by someone else.
fn wait_marker(shared: &Shared, which: Completion, generation: Option<u64>) -> bool {
    let marker = shared.marker(which);
    loop {
        if marker.is_set() {
            return true;
        }
        if let Some(generation) = generation {
            let current = shared
                .callback_slot(which)
                .lock()
                .as_ref()
                .map(|p| p.generation);
            if current != Some(generation) {
                return false;
            }
        }
        if !shared.park(shared.config.min_delay()) {
            return false;
        }
    }
}

/// Take and run the pending callback, if it is still the expected one.
fn run_pending(shared: &Shared, which: Completion, generation: Option<u64>) {
    let pending = {
        let mut slot = shared.callback_slot(which).lock();
        match (generation, slot.as_ref()) {
            (Some(expected), Some(p)) if p.generation != expected => None,
            _ => slot.take(),
        }
    };

    if let Some(pending) = pending {
        debug!("Running {} callback", which.label());
        (pending.callback)();
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
