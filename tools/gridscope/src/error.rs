use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`std::result::Result`] containing a gridscope [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Enum describing the possible errors that can occur in gridscope.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{}` is not a valid prediction tensor", path.display())]
    #[diagnostic(help("predictions are stored as serialized ndarray arrays of rank 3 or 4"))]
    Predictions {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize output")]
    Output(#[from] serde_json::Error),

    #[error("Failed to render config")]
    Render(#[from] toml::ser::Error),

    #[error("No image with id {0} in the annotations")]
    #[diagnostic(code(gridscope::unknown_image))]
    UnknownImage(u64),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] grid_config::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] grid_codec::Error),
}
