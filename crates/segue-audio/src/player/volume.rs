//! Volume control and the background ramp that paces fades.
//!
//! A fade is a sequence of equal decibel steps, one every `setting_delay`,
//! so it sounds linear to the ear. The ramp thread owns the stepping; the
//! control calls only install or clear a [`VolumeRamp`].

use std::time::{Duration, Instant};

use segue_core::{db_to_gain, gain_to_db, Error, Result, Volume, SILENCE_FLOOR};
use tracing::{debug, trace};

use super::state::{PlayerEvent, Shared, VolumeRamp};
use super::Player;

impl Player {
    /// Set the volume to an absolute factor, clamped to `[0, 1]`.
    ///
    /// With a zero `pace` the change is immediate and cancels any running
    /// fade; otherwise the volume ramps to the target over `pace`.
    pub fn set_volume(&self, volume: f32, pace: Duration) -> Result<()> {
        if !volume.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "Volume must be a finite number, got {volume}"
            )));
        }
        let target = Volume::new(volume);
        let mut ramp = self.shared.ramp.lock();

        if pace.is_zero() {
            *ramp = None;
            self.shared.volume.store(target.as_f32());
            debug!("Volume set to {:.3}", target.as_f32());
            return Ok(());
        }

        let current = Volume::new(self.shared.volume.load());
        let delta_db = gain_to_db(target.floored()) - gain_to_db(current.floored());
        let step_db = self.shared.config.setting_delay_secs() * delta_db / pace.as_secs_f32();

        if step_db.abs() < f32::EPSILON {
            *ramp = None;
            self.shared.volume.store(target.as_f32());
            return Ok(());
        }

        *ramp = Some(VolumeRamp {
            target: target.as_f32(),
            step_db,
        });
        debug!(
            "Fading volume {:.3} -> {:.3} over {:?} ({:+.3} dB per step)",
            current.as_f32(),
            target.as_f32(),
            pace,
            step_db
        );
        Ok(())
    }

    /// Set the volume in decibels (0 dB = full scale).
    pub fn set_volume_db(&self, db: f32, pace: Duration) -> Result<()> {
        if db.is_nan() {
            return Err(Error::InvalidArgument("Volume in dB must not be NaN".to_string()));
        }
        self.set_volume(db_to_gain(db), pace)
    }

    /// Add `delta` to the absolute volume.
    pub fn change_volume(&self, delta: f32, pace: Duration) -> Result<()> {
        self.set_volume(self.volume() + delta, pace)
    }

    /// Add `delta_db` decibels to the volume.
    pub fn change_volume_db(&self, delta_db: f32, pace: Duration) -> Result<()> {
        let current = Volume::new(self.volume());
        self.set_volume_db(gain_to_db(current.floored()) + delta_db, pace)
    }

    /// True while a fade is in progress.
    pub fn is_fading(&self) -> bool {
        self.shared.ramp.lock().is_some()
    }
}

/// Apply one ramp step to `current`.
///
/// Returns the new volume and whether the target was reached. The step
/// snaps to the exact target instead of overshooting it.
pub(crate) fn ramp_step(current: f32, ramp: VolumeRamp) -> (f32, bool) {
    let next = current.max(SILENCE_FLOOR) * db_to_gain(ramp.step_db);
    let target = ramp.target.max(SILENCE_FLOOR);

    let reached = if ramp.step_db > 0.0 {
        next >= target
    } else {
        next <= target
    };

    if reached {
        (ramp.target, true)
    } else {
        (next.clamp(0.0, 1.0), false)
    }
}

/// Ramp thread body. Ticks every `setting_delay` until terminate.
pub(super) fn run_ramp(shared: &Shared) {
    let delay = shared.config.setting_delay();
    let mut next_tick = Instant::now() + delay;
    debug!("Volume ramp started ({:?} cadence)", delay);

    loop {
        let now = Instant::now();
        if now < next_tick {
            // Woken early by an unrelated notify, keep the cadence
            if !shared.park(next_tick - now) {
                break;
            }
            continue;
        }

        tick(shared);
        next_tick = (next_tick + delay).max(now);
    }

    debug!("Volume ramp stopped");
}

fn tick(shared: &Shared) {
    let mut ramp = shared.ramp.lock();
    let Some(active) = *ramp else {
        return;
    };

    let (volume, reached) = ramp_step(shared.volume.load(), active);
    shared.volume.store(volume);
    trace!("Volume step -> {:.4}", volume);

    if reached {
        debug!("Volume reached {:.3}", volume);
        shared.emit(PlayerEvent::VolumeReached(volume));
        *ramp = None;
    }
}
