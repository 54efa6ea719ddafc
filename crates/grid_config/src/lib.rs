//! Loading of TOML configuration files, with optional overlays.
//!
//! A config lives in a main directory under [`Config::PATH`]. An overlay directory may
//! contain a file with the same name that overrides a subset of the keys in the main
//! file, for example to run the detector on a different backbone resolution.

mod detector;
mod error;

use std::{fs, path::Path};

use serde::{Serialize, de::DeserializeOwned};
use toml::{Table, Value};

pub use detector::{DecodeConfig, DetectorConfig, EncodeConfig};
pub use error::{ConfigKind, Error, ErrorKind, Result};

/// A configuration struct that can be loaded from a TOML file.
///
/// ```no_run
/// use grid_config::Config;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Deserialize, Serialize)]
/// #[serde(deny_unknown_fields)]
/// pub struct MeowConfig {
///     count: u32,
/// }
///
/// impl Config for MeowConfig {
///     const PATH: &'static str = "meow.toml";
/// }
///
/// // This will load the configuration from `config/meow.toml`
/// let config = MeowConfig::load("config").unwrap();
/// ```
pub trait Config: Serialize + DeserializeOwned {
    /// Path of the config file, relative to the config directory.
    const PATH: &'static str;

    /// Load the config from the main directory.
    fn load(main_dir: impl AsRef<Path>) -> Result<Self> {
        let main = read_table::<Self>(main_dir.as_ref(), ConfigKind::Main)?;
        from_table(main)
    }

    /// Load the config from the main directory, with the overlay applied on top.
    ///
    /// The overlay can only override keys that already exist in the main config.
    fn load_with_overlay(main_dir: impl AsRef<Path>, overlay_dir: impl AsRef<Path>) -> Result<Self> {
        let main = read_table::<Self>(main_dir.as_ref(), ConfigKind::Main)?;
        let overlay = read_table::<Self>(overlay_dir.as_ref(), ConfigKind::Overlay)?;

        from_table(merge_tables(&main, &overlay, false))
    }

    /// Load the config with the overlay applied, or only the main config if the overlay
    /// file cannot be read.
    fn load_or_main(main_dir: impl AsRef<Path>, overlay_dir: impl AsRef<Path>) -> Result<Self> {
        let main_dir = main_dir.as_ref();
        match Self::load_with_overlay(main_dir, overlay_dir) {
            Err(Error {
                name,
                kind:
                    ErrorKind::Load {
                        path,
                        config_kind: ConfigKind::Overlay,
                        ..
                    },
            }) => {
                tracing::debug!("`{name}`: Failed to read overlay from `{}`", path.display());
                Self::load(main_dir)
            }
            result => result,
        }
    }

    /// Write the complete config to the given directory.
    fn store(&self, dir: impl AsRef<Path>) -> Result<()> {
        let table = to_table(self)?;
        write_table::<Self>(dir.as_ref(), &table)
    }

    /// Write only the keys that differ from `main` to the overlay directory.
    fn save_as_overlay(&self, main: &Self, overlay_dir: impl AsRef<Path>) -> Result<()> {
        let diff = extract_diff(&to_table(main)?, &to_table(self)?);
        write_table::<Self>(overlay_dir.as_ref(), &diff)
    }
}

/// Merge `overlay` on top of `main`, recursing into nested tables.
///
/// Keys that only exist in the overlay are ignored unless `add_keys` is set. A nested
/// overlay table that shares no keys with its main table replaces it as a whole, so an
/// overlay can switch an enum such as `{ top_k = 100 }` to `{ threshold = 0.5 }`.
#[must_use]
pub fn merge_tables(main: &Table, overlay: &Table, add_keys: bool) -> Table {
    let mut merged = Table::new();

    for (key, value) in main {
        let value = match (value, overlay.get(key)) {
            (Value::Table(main_table), Some(Value::Table(overlay_table)))
                if shares_keys(main_table, overlay_table) =>
            {
                Value::Table(merge_tables(main_table, overlay_table, add_keys))
            }
            (_, Some(overlay_value)) => overlay_value.clone(),
            (main_value, None) => main_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    if add_keys {
        for (key, value) in overlay {
            if !main.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

/// Whether `overlay` is empty or overrides at least one key of `main`.
fn shares_keys(main: &Table, overlay: &Table) -> bool {
    overlay.is_empty() || overlay.keys().any(|key| main.contains_key(key))
}

/// The keys of `changed` that differ from `main`, recursing into nested tables.
#[must_use]
pub fn extract_diff(main: &Table, changed: &Table) -> Table {
    let mut diff = Table::new();

    for (key, value) in changed {
        match (main.get(key), value) {
            (Some(Value::Table(main_table)), Value::Table(changed_table)) => {
                let nested = extract_diff(main_table, changed_table);
                if !nested.is_empty() {
                    diff.insert(key.clone(), Value::Table(nested));
                }
            }
            (Some(main_value), changed_value) if main_value == changed_value => {}
            _ => {
                diff.insert(key.clone(), value.clone());
            }
        }
    }

    diff
}

fn read_table<T: Config>(dir: &Path, config_kind: ConfigKind) -> Result<Table> {
    let path = dir.join(T::PATH);
    let content = fs::read_to_string(&path).map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Load {
            path: path.clone(),
            config_kind,
            source,
        },
    })?;

    content.parse::<Table>().map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Parse {
            path,
            config_kind,
            source,
        },
    })
}

fn write_table<T: Config>(dir: &Path, table: &Table) -> Result<()> {
    let path = dir.join(T::PATH);
    let content = toml::to_string_pretty(table).map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Serialize(source),
    })?;

    fs::write(&path, content).map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Store { path, source },
    })
}

fn from_table<T: Config>(table: Table) -> Result<T> {
    Value::Table(table).try_into::<T>().map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Deserialize(source),
    })
}

fn to_table<T: Config>(config: &T) -> Result<Table> {
    let value = Value::try_from(config).map_err(|source| Error {
        name: T::PATH,
        kind: ErrorKind::Serialize(source),
    })?;

    match value {
        Value::Table(table) => Ok(table),
        other => Err(Error {
            name: T::PATH,
            kind: ErrorKind::NotATable(other.type_str()),
        }),
    }
}
