//! Track type representing one decoded, queued audio item.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stereo frame: left and right amplitude, nominally in [-1, 1].
pub type Frame = [f32; 2];

/// Unique identifier of a queued track.
///
/// Two queue entries decoded from the same file get different ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A fully decoded track at the engine sample rate.
///
/// The samples are immutable once loaded; loop counters live with the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Identity of this queue entry.
    pub id: TrackId,
    /// Path the track was decoded from.
    pub source: PathBuf,
    /// Interleaved stereo frames.
    pub samples: Vec<Frame>,
}

impl Track {
    pub fn new(source: impl Into<PathBuf>, samples: Vec<Frame>) -> Self {
        Self {
            id: TrackId::new(),
            source: source.into(),
            samples,
        }
    }

    /// Number of frames in the track.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the given sample rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / f64::from(sample_rate)
    }

    /// Display name derived from the source file name.
    pub fn display_name(&self) -> String {
        display_name(&self.source)
    }
}

/// File name of a path, or the whole path if it has none.
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_creation() {
        let track = Track::new("/music/intro.flac", vec![[0.0, 0.0]; 441]);
        assert_eq!(track.len(), 441);
        assert!(!track.is_empty());
        assert!((track.duration_secs(44100) - 0.01).abs() < 1e-9);
        assert_eq!(track.display_name(), "intro.flac");
    }

    #[test]
    fn test_track_ids_are_unique() {
        let a = Track::new("same.wav", Vec::new());
        let b = Track::new("same.wav", Vec::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_display_name_without_file_name() {
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
