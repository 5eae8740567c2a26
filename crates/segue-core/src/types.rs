//! Core domain types for Segue.

pub mod common;
pub mod track;

pub use common::{db_to_gain, gain_to_db, Timecode, Volume, SILENCE_FLOOR};
pub use track::{display_name, Frame, Track, TrackId};
