use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use clap::Parser;
use serde::Serialize;

use crate::error::{Error, Result};

pub mod config;
pub mod decode;
pub mod encode;

/// `gridscope` - Inspect the targets and outputs of the grid detector
///
/// `gridscope` turns COCO annotations into the per-cell training targets of the detector,
/// and turns raw detector outputs back into bounding boxes.
///
/// # Encoding annotations
/// ```sh
/// gridscope encode --annotations instances.json --image-id 42
/// ```
/// Boxes are resampled onto the image size of the grid before they are encoded.
///
/// # Decoding predictions
/// ```sh
/// gridscope decode --predictions output.json --top-k 10
/// ```
///
/// # Configuration
/// The grid and the encode and decode settings are read from `detector.toml` in the config
/// directory. Use `--overlay hd` to apply `config/overlay/hd/detector.toml` on top.
#[derive(Parser)]
#[clap(name = "gridscope", version)]
pub struct Cli {
    #[clap(flatten)]
    pub config: config::ConfigOpts,

    #[clap(subcommand)]
    pub action: Commands,
}

/// All possible commands for the cli, used for clap derive macros.
#[derive(Parser)]
pub enum Commands {
    Encode(encode::Encode),
    Decode(decode::Decode),
    Config(config::ShowConfig),
}

/// Write `value` as pretty JSON to `output`, or to stdout if no path is given.
pub(crate) fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    match output {
        Some(path) => fs::write(path, json).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").map_err(|source| Error::Write {
                path: "<stdout>".into(),
                source,
            })
        }
    }
}

pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
