//! Tour Editor Library
//!
//! Non-destructive editing for tour documents: an undo/redo history and a
//! command layer that records it automatically, plus the image work an
//! editor needs (overlay sizing and stop thumbnails).

pub mod editor;
pub mod media;
pub mod undo;

pub use editor::{EditorConfig, TourEditor};
pub use undo::{Direction, UndoManager, UndoStep};

/// Result type for tour-editor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tour-editor operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tour core error: {0}")]
    Core(#[from] tour_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Cannot redo '{0}' before it has been undone")]
    RedoBeforeUndo(String),

    #[error("Tour stop not found: {0}")]
    StopNotFound(String),

    #[error("Overlay not found: {0}")]
    OverlayNotFound(String),
}
