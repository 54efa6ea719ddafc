use std::path::PathBuf;

use clap::{Args, Parser};
use grid_config::{Config, DetectorConfig};

use crate::error::Result;

/// Where the detector config is read from.
#[derive(Clone, Debug, Args)]
pub struct ConfigOpts {
    /// Directory containing `detector.toml`
    #[clap(long, global = true, default_value = "config")]
    pub config_dir: PathBuf,

    /// Name of the overlay in `<config-dir>/overlay` to apply on top of the main config
    #[clap(long, global = true)]
    pub overlay: Option<String>,
}

impl ConfigOpts {
    /// Load and validate the detector config, with the overlay applied if one is selected.
    pub fn load(&self) -> Result<DetectorConfig> {
        let config = match &self.overlay {
            Some(overlay) => DetectorConfig::load_or_main(
                &self.config_dir,
                self.config_dir.join("overlay").join(overlay),
            )?,
            None => DetectorConfig::load(&self.config_dir)?,
        };
        config.validate()?;

        tracing::debug!(
            "using a {}x{} grid over {}x{} images",
            config.grid.cells_x(),
            config.grid.cells_y(),
            config.grid.image_width(),
            config.grid.image_height()
        );
        Ok(config)
    }
}

/// Print the resolved detector config
#[derive(Parser)]
#[clap(name = "config")]
pub struct ShowConfig {}

impl ShowConfig {
    pub fn show(self, config: &DetectorConfig) -> Result<()> {
        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use grid_codec::Selection;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn load_applies_overlay() {
        let temp_dir = tempdir().unwrap();
        DetectorConfig::default().store(temp_dir.path()).unwrap();

        let overlay_dir = temp_dir.path().join("overlay/fast");
        fs::create_dir_all(&overlay_dir).unwrap();
        fs::write(
            overlay_dir.join(DetectorConfig::PATH),
            "[decode]\nselection = { top_k = 3 }\n",
        )
        .unwrap();

        let opts = ConfigOpts {
            config_dir: temp_dir.path().to_path_buf(),
            overlay: Some("fast".to_string()),
        };

        assert_eq!(opts.load().unwrap().decode.selection, Selection::TopK(3));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let temp_dir = tempdir().unwrap();
        let mut config = DetectorConfig::default();
        config.encode.min_visibility = 1.5;
        config.store(temp_dir.path()).unwrap();

        let opts = ConfigOpts {
            config_dir: temp_dir.path().to_path_buf(),
            overlay: None,
        };

        assert!(opts.load().is_err());
    }
}
