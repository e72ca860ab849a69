//! WWT Tour Core Library
//!
//! This library provides the document model and file formats for
//! WorldWide Telescope guided tours: the tour XML, the per-stop settings
//! snapshot, overlay variants and the "file cabinet" archive container.

pub mod cabinet;
pub mod color;
pub mod context;
pub mod interpolation;
pub mod layers;
pub mod loader;
pub mod overlay;
pub mod place;
pub mod settings;
pub mod tour_document;
pub mod tour_stop;
pub mod util;
pub mod xml;

pub use cabinet::{ExtractMode, FileBlob, FileCabinet, FileEntry};
pub use color::Color;
pub use context::{EngineContext, ViewSnapshot};
pub use interpolation::InterpolationType;
pub use layers::{Layer, LayerRegistry, ReferenceFrame, ReferenceFrameRegistry};
pub use loader::{Fetcher, FsFetcher, LoadOptions, LoadStatus, LoadSummary};
pub use overlay::{Overlay, OverlayAnchor, OverlayKind};
pub use place::{CameraParameters, ImageSetRef, ImageSetType, Place};
pub use settings::Settings;
pub use tour_document::{TourDocument, TourProperties, UserLevel};
pub use tour_stop::{LayerInfo, SlideLink, TourStop, TransitionType};

/// Result type for tour-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tour-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Invalid value for {attribute}: '{value}'")]
    InvalidValue { attribute: String, value: String },

    #[error("Archive header size token not found")]
    MissingHeaderSize,

    #[error("Archive header size {header_size} exceeds archive length {len}")]
    HeaderOutOfRange { header_size: usize, len: usize },

    #[error("Archive truncated: {filename} ends at byte {end} but the archive has {len}")]
    Truncated {
        filename: String,
        end: usize,
        len: usize,
    },

    #[error("Archive entry {0} has a size past the end of addressable memory")]
    SizeOverflow(String),

    #[error("File not found in archive: {0}")]
    FileNotFound(String),

    #[error("Tour stop index out of range: {0}")]
    StopIndexOutOfRange(usize),

    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },
}
