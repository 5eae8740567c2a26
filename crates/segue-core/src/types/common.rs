//! Common types shared across the player.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A position inside a track, in whole seconds.
///
/// Parses from plain seconds (`"95"`), `mm:ss` (`"1:35"`) or `h:mm:ss`
/// (`"1:02:03"`). The leading component is unbounded; every following
/// component must be below 60.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timecode(pub u64);

impl Timecode {
    pub const fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    pub const fn as_seconds(&self) -> u64 {
        self.0
    }

    /// Frame offset of this timecode at the given sample rate.
    pub const fn to_frames(&self, sample_rate: u32) -> u64 {
        self.0.saturating_mul(sample_rate as u64)
    }

    /// Format as M:SS or H:MM:SS.
    pub fn format(&self) -> String {
        let total_secs = self.0;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }
}

impl From<u64> for Timecode {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

impl From<Timecode> for u64 {
    fn from(t: Timecode) -> Self {
        t.0
    }
}

impl FromStr for Timecode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTimecode {
            input: s.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }

        let mut total: u64 = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let value: u64 = part.parse().map_err(|_| invalid())?;
            if i > 0 && value >= 60 {
                return Err(invalid());
            }
            total = total
                .checked_mul(60)
                .and_then(|t| t.checked_add(value))
                .ok_or_else(invalid)?;
        }

        Ok(Self(total))
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Lowest level used when a ratio against the current volume is needed.
///
/// Equal to -80 dB. A volume of exactly zero has no decibel value, so fades
/// out of or into silence are computed against this floor instead.
pub const SILENCE_FLOOR: f32 = 1e-4;

/// Convert decibels to an absolute gain factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert an absolute gain factor to decibels.
///
/// Returns negative infinity for a gain of zero.
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.log10()
}

/// Volume level (0.0 to 1.0).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);
    pub const DEFAULT: Self = Self(1.0);

    /// Create a volume, clamping into range. NaN maps to silence.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn from_db(db: f32) -> Self {
        Self::new(db_to_gain(db))
    }

    pub const fn as_f32(&self) -> f32 {
        self.0
    }

    pub fn as_db(&self) -> f32 {
        gain_to_db(self.0)
    }

    /// The volume raised to the silence floor, safe for log ratios.
    pub fn floored(&self) -> f32 {
        self.0.max(SILENCE_FLOOR)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_timecode_parse() {
        assert_eq!("90".parse::<Timecode>().unwrap(), Timecode(90));
        assert_eq!("1:30".parse::<Timecode>().unwrap(), Timecode(90));
        assert_eq!("01:30".parse::<Timecode>().unwrap(), Timecode(90));
        assert_eq!("1:02:03".parse::<Timecode>().unwrap(), Timecode(3723));
        assert_eq!("75:00".parse::<Timecode>().unwrap(), Timecode(4500));
    }

    #[test]
    fn test_timecode_rejects_malformed() {
        for input in ["", ":", "1:", "a:10", "1:60", "1:2:3:4", "-5", "1.5", "1:-1"] {
            assert!(
                matches!(
                    input.parse::<Timecode>(),
                    Err(Error::InvalidTimecode { .. })
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_timecode_format() {
        assert_eq!(Timecode(65).format(), "1:05");
        assert_eq!(Timecode(3661).format(), "1:01:01");
        assert_eq!(Timecode(0).to_string(), "0:00");
    }

    #[test]
    fn test_timecode_frames() {
        assert_eq!(Timecode(90).to_frames(44100), 90 * 44100);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_volume_clamping() {
        assert_eq!(Volume::new(1.5).as_f32(), 1.0);
        assert_eq!(Volume::new(-0.5).as_f32(), 0.0);
        assert_eq!(Volume::new(0.5).as_f32(), 0.5);
        assert_eq!(Volume::new(f32::NAN).as_f32(), 0.0);
        assert_eq!(Volume::from_db(12.0).as_f32(), 1.0);
    }

    #[test]
    fn test_db_conversions() {
        assert!((db_to_gain(-6.0) - 0.501_187).abs() < 1e-5);
        assert!(gain_to_db(1.0).abs() < 1e-6);
        assert!(gain_to_db(0.0).is_infinite());
        assert!((gain_to_db(SILENCE_FLOOR) + 80.0).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_timecode_format_roundtrip(secs in 0u64..1_000_000) {
            let tc = Timecode(secs);
            prop_assert_eq!(tc.format().parse::<Timecode>().unwrap(), tc);
        }

        #[test]
        fn prop_volume_db_roundtrip(db in -40.0f32..=0.0) {
            let v = Volume::from_db(db);
            prop_assert!((v.as_db() - db).abs() < 1e-3);
        }
    }
}
