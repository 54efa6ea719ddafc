//! Result and Error types for the crate.
use std::{fmt, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two config files an error originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Main,
    Overlay,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::Main => write!(f, "main"),
            ConfigKind::Overlay => write!(f, "overlay"),
        }
    }
}

/// Failure to load or store the config `name`.
#[derive(Error, Diagnostic, Debug)]
#[error("Failed to handle config `{name}`")]
pub struct Error {
    /// The [`Config::PATH`](crate::Config::PATH) of the config.
    pub name: &'static str,
    #[source]
    #[diagnostic_source]
    pub kind: ErrorKind,
}

/// Configuration error variants
#[derive(Error, Diagnostic, Debug)]
pub enum ErrorKind {
    /// The file could not be read.
    #[error("Failed to read {config_kind} config from `{}`", path.display())]
    #[diagnostic(help("is the config directory correct?"))]
    Load {
        path: PathBuf,
        config_kind: ConfigKind,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("Failed to parse {config_kind} config `{}`", path.display())]
    Parse {
        path: PathBuf,
        config_kind: ConfigKind,
        #[source]
        source: toml::de::Error,
    },

    /// The (merged) TOML does not match the config struct.
    #[error("Config does not match the expected layout")]
    Deserialize(#[source] toml::de::Error),

    #[error("Failed to serialize config")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config serialized to a {0} instead of a table")]
    NotATable(&'static str),

    #[error("Failed to write config to `{}`", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
