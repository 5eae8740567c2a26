//! Error types for Segue.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using Segue's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Segue.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid timecode {input:?}: expected seconds, mm:ss or h:mm:ss")]
    InvalidTimecode { input: String },

    #[error("The queue is empty, add an audio track first")]
    EmptyQueue,

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Range errors
    #[error("Queue position {position} is out of range for a queue of {len} tracks")]
    QueuePosition { position: usize, len: usize },

    #[error("Seek position {seconds}s is outside the current track ({track_secs:.2}s)")]
    SeekOutOfRange { seconds: u64, track_secs: f64 },

    // Resource errors
    #[error(
        "Not enough memory to load track: needs {required} bytes, {available} available \
         with {headroom} bytes reserved"
    )]
    InsufficientMemory {
        required: u64,
        available: u64,
        headroom: u64,
    },

    // Audio errors
    #[error("{} is not a valid audio file", .0.display())]
    NotAudioFile(PathBuf),

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Resample error: {0}")]
    Resample(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Player has been terminated")]
    Terminated,
}

/// Broad classes of failure, independent of the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Argument had the wrong shape; nothing was changed.
    InputValidation,
    /// Not enough memory to hold a decoded track.
    ResourceExhaustion,
    /// Source missing, corrupt or unsupported.
    DecodeFailure,
    /// Index or seek target outside the valid range.
    OutOfBounds,
    /// Audio device or stream failure.
    Output,
    /// The player was shut down.
    Shutdown,
}

impl Error {
    /// Classify this error.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidTimecode { .. }
            | Self::EmptyQueue
            | Self::Config(_) => ErrorCategory::InputValidation,
            Self::QueuePosition { .. } | Self::SeekOutOfRange { .. } => {
                ErrorCategory::OutOfBounds
            }
            Self::InsufficientMemory { .. } => ErrorCategory::ResourceExhaustion,
            Self::NotAudioFile(_) | Self::AudioDecode(_) | Self::Resample(_) | Self::Io(_) => {
                ErrorCategory::DecodeFailure
            }
            Self::AudioOutput(_) => ErrorCategory::Output,
            Self::Terminated => ErrorCategory::Shutdown,
        }
    }

    /// Returns true if the operation was rejected before touching any state.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::InputValidation | ErrorCategory::OutOfBounds
        )
    }
}
