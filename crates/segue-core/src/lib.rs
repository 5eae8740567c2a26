//! # segue-core
//!
//! Core types, configuration, and error handling for the Segue queue player.

pub mod config;
pub mod error;
pub mod types;

pub use config::{PlayerConfig, CHANNELS};
pub use error::{Error, ErrorCategory, Result};
pub use types::*;
