//! # segue-audio
//!
//! Queue-driven audio playback engine for Segue.
//!
//! Features:
//! - Real-time render callback that never blocks on the queue
//! - Per-track and per-queue looping, seeking and shuffling
//! - Decibel-paced volume fades
//! - Symphonia decoding with rubato resampling to the stream rate
//! - Low-latency cpal output

pub mod decode;
pub mod memory;
pub mod output;
pub mod player;
pub mod resample;

pub use decode::{Decode, SymphoniaDecoder};
pub use memory::{FixedMemory, MemoryProbe, SystemMemory};
pub use player::{Cursor, PlaybackState, Player, PlayerEvent, QueueLoops, Renderer, TrackInfo};
