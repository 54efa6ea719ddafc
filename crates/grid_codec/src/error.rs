//! See [`Error`].

use miette::Diagnostic;
use thiserror::Error;

/// Error types for this crate.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(
        "Invalid grid geometry: {cells_x}x{cells_y} cells over a {image_width}x{image_height} image"
    )]
    #[diagnostic(
        code(grid_codec::invalid_grid),
        help("the number of cells and the image size must all be greater than zero")
    )]
    InvalidGrid {
        cells_x: usize,
        cells_y: usize,
        image_width: u32,
        image_height: u32,
    },

    #[error("Invalid box geometry: {reason}")]
    #[diagnostic(code(grid_codec::invalid_geometry))]
    InvalidGeometry { reason: String },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(grid_codec::invalid_argument))]
    InvalidArgument(String),

    #[error("Expected a tensor of shape {expected}, got {actual:?}")]
    #[diagnostic(
        code(grid_codec::shape_mismatch),
        help("the encoder and decoder must be configured with the same grid geometry")
    )]
    ShapeMismatch { expected: String, actual: Vec<usize> },

    #[error("Failed to parse COCO annotations")]
    Annotations(#[from] serde_json::Error),
}

/// Type alias for [`Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;
