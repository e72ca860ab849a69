//! Tour Player Library
//!
//! Plays a tour document, walking its stops in order or along their links
//! and keeping overlay media and engine settings in step with the stop
//! being shown.

pub mod player;

pub use player::{PlayerConfig, PlayerEvent, PlayerState, TourPlayer};

/// Result type for tour-player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tour-player operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tour core error: {0}")]
    Core(#[from] tour_core::Error),

    #[error("Tour has no stops")]
    EmptyTour,

    #[error("Player is not running")]
    NotPlaying,
}
