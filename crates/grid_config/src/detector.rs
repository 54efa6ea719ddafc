use grid_codec::{
    CollisionPolicy, GridGeometry, OutputDecoder, Selection, TargetEncoder, annotation::Resampler,
};
use serde::{Deserialize, Serialize};

use crate::Config;

/// Configuration of the target encoder and output decoder of the detector.
///
/// Both directions share the same [`GridGeometry`], so they can never disagree on the
/// layout of the tensor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorConfig {
    pub grid: GridGeometry,
    #[serde(default)]
    pub encode: EncodeConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
}

impl Config for DetectorConfig {
    const PATH: &'static str = "detector.toml";
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EncodeConfig {
    /// Which box owns a cell when several box centers fall into it.
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// Resampled boxes with a smaller area in pixels are dropped.
    #[serde(default = "default_min_box_area")]
    pub min_box_area: f32,
    /// Resampled boxes with a smaller fraction inside the image are dropped.
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
}

fn default_min_box_area() -> f32 {
    1024.0
}

fn default_min_visibility() -> f32 {
    0.1
}

impl Default for EncodeConfig {
    fn default() -> Self {
        EncodeConfig {
            collision_policy: CollisionPolicy::default(),
            min_box_area: default_min_box_area(),
            min_visibility: default_min_visibility(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecodeConfig {
    #[serde(default)]
    pub selection: Selection,
}

impl DetectorConfig {
    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> grid_codec::Result<()> {
        self.decode.selection.validate()?;

        if !(0.0..=1.0).contains(&self.encode.min_visibility) {
            return Err(grid_codec::Error::InvalidArgument(format!(
                "min_visibility must be in [0, 1], got {}",
                self.encode.min_visibility
            )));
        }

        if self.encode.min_box_area.is_nan() || self.encode.min_box_area < 0.0 {
            return Err(grid_codec::Error::InvalidArgument(format!(
                "min_box_area must be non-negative, got {}",
                self.encode.min_box_area
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn encoder(&self) -> TargetEncoder {
        TargetEncoder::new(self.grid).with_policy(self.encode.collision_policy)
    }

    #[must_use]
    pub fn decoder(&self) -> OutputDecoder {
        OutputDecoder::new(self.grid)
    }

    #[must_use]
    pub fn resampler(&self) -> Resampler {
        Resampler::new(self.grid)
            .with_min_area(self.encode.min_box_area)
            .with_min_visibility(self.encode.min_visibility)
    }
}
