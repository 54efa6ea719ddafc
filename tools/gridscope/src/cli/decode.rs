use std::path::PathBuf;

use clap::Parser;
use grid_codec::{BoundingBox, Selection};
use grid_config::DetectorConfig;
use ndarray::ArrayD;
use tracing::info;

use crate::{
    cli::{read_to_string, write_json},
    error::{Error, Result},
};

/// Decode raw detector outputs into bounding boxes.
#[derive(Clone, Debug, Parser)]
#[clap(name = "decode")]
pub struct Decode {
    /// JSON file with a `(5, cells_y, cells_x)` or `(N, 5, cells_y, cells_x)` array
    #[clap(short, long)]
    pub predictions: PathBuf,

    /// Keep every cell with at least this confidence
    #[clap(short, long, conflicts_with = "top_k")]
    pub threshold: Option<f32>,

    /// Keep the k most confident cells [default: set in `detector.toml`]
    #[clap(short = 'k', long)]
    pub top_k: Option<usize>,
}

impl Decode {
    pub fn decode(self, config: &DetectorConfig) -> Result<()> {
        let output: ArrayD<f32> = serde_json::from_str(&read_to_string(&self.predictions)?)
            .map_err(|source| Error::Predictions {
                path: self.predictions.clone(),
                source,
            })?;

        let boxes = decode_predictions(&output, config, self.selection(config))?;
        info!(
            "decoded {} boxes from {} images",
            boxes.iter().map(Vec::len).sum::<usize>(),
            boxes.len()
        );

        write_json(&boxes, None)
    }

    /// The selection given on the command line, or the configured one.
    #[must_use]
    pub fn selection(&self, config: &DetectorConfig) -> Selection {
        match (self.threshold, self.top_k) {
            (Some(threshold), _) => Selection::Threshold(threshold),
            (None, Some(k)) => Selection::TopK(k),
            (None, None) => config.decode.selection,
        }
    }
}

/// Decode a single prediction or a batch of predictions, one list of boxes per image.
pub fn decode_predictions(
    output: &ArrayD<f32>,
    config: &DetectorConfig,
    selection: Selection,
) -> Result<Vec<Vec<BoundingBox>>> {
    Ok(config.decoder().decode(output.view(), selection)?)
}
