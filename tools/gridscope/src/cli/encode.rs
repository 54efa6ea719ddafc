use std::path::PathBuf;

use clap::Parser;
use grid_codec::annotation::CocoDataset;
use grid_config::DetectorConfig;
use ndarray::{Array4, Axis};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    cli::{read_to_string, write_json},
    error::{Error, Result},
};

/// Resample COCO annotations onto the grid and encode them into training targets.
#[derive(Clone, Debug, Parser)]
#[clap(name = "encode")]
pub struct Encode {
    /// COCO annotation file
    #[clap(short, long)]
    pub annotations: PathBuf,

    /// Only encode the image with this id [default: all images]
    #[clap(short, long)]
    pub image_id: Option<u64>,

    /// Write the stacked `(N, 5, cells_y, cells_x)` targets as JSON to this file
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

/// The encoded targets of a set of images.
#[derive(Debug, Serialize)]
pub struct EncodedTargets {
    /// Image ids, in the order of the first axis of `targets`.
    pub image_ids: Vec<u64>,
    pub targets: Array4<f32>,
}

impl Encode {
    pub fn encode(self, config: &DetectorConfig) -> Result<()> {
        let dataset = CocoDataset::from_json(&read_to_string(&self.annotations)?)?;
        let targets = encode_dataset(&dataset, config, self.image_id)?;

        if let Some(output) = self.output.as_deref() {
            write_json(&targets, Some(output))?;
            info!(
                "wrote targets of {} images to `{}`",
                targets.image_ids.len(),
                output.display()
            );
        }

        Ok(())
    }
}

/// Resample and encode the images of `dataset`, or only `image_id` if given.
///
/// Annotations that refer to an image missing from the dataset are skipped, unless that
/// image was requested explicitly.
pub fn encode_dataset(
    dataset: &CocoDataset,
    config: &DetectorConfig,
    image_id: Option<u64>,
) -> Result<EncodedTargets> {
    let mut boxes_per_image = dataset.boxes_per_image();
    let images: Vec<_> = match image_id {
        Some(id) => {
            let image = dataset.image(id).ok_or(Error::UnknownImage(id))?;
            vec![(image, boxes_per_image.remove(&id).unwrap_or_default())]
        }
        None => boxes_per_image
            .into_iter()
            .filter_map(|(id, boxes)| match dataset.image(id) {
                Some(image) => Some((image, boxes)),
                None => {
                    warn!("skipping {} annotations of unknown image {id}", boxes.len());
                    None
                }
            })
            .collect(),
    };

    let resampler = config.resampler();
    let encoder = config.encoder();
    let (channels, rows, columns) = config.grid.target_shape();
    let mut targets = Array4::zeros((images.len(), channels, rows, columns));
    let mut image_ids = Vec::with_capacity(images.len());

    for (mut slot, (image, boxes)) in targets.axis_iter_mut(Axis(0)).zip(images) {
        let resampled = resampler.resample(&boxes, image.width, image.height)?;
        let (target, report) = encoder.encode_with_report(&resampled);

        info!(
            "image {}: {} of {} boxes assigned, {} collisions, {} skipped",
            image.id,
            report.assigned.len(),
            boxes.len(),
            report.collisions.len(),
            report.skipped.len()
        );

        slot.assign(&target.view());
        image_ids.push(image.id);
    }

    Ok(EncodedTargets { image_ids, targets })
}

#[cfg(test)]
mod tests {
    use grid_codec::Channel;

    use super::*;

    const DATASET: &str = r#"{
        "images": [
            {"id": 7, "width": 1280, "height": 960},
            {"id": 3, "width": 640, "height": 480}
        ],
        "annotations": [
            {"image_id": 7, "category_id": 1, "bbox": [600.0, 440.0, 80.0, 80.0]},
            {"image_id": 3, "category_id": 1, "bbox": [0.0, 0.0, 64.0, 64.0]},
            {"image_id": 3, "category_id": 2, "bbox": [4.0, 4.0, 8.0, 8.0]}
        ]
    }"#;

    #[test]
    fn encode_all_images_in_id_order() {
        let dataset = CocoDataset::from_json(DATASET).unwrap();
        let encoded = encode_dataset(&dataset, &DetectorConfig::default(), None).unwrap();

        assert_eq!(encoded.image_ids, vec![3, 7]);
        assert_eq!(encoded.targets.shape(), &[2, 5, 15, 20]);

        let objectness = Channel::Objectness.index();
        // the 8x8 box is below the minimum area
        assert_eq!(encoded.targets[[0, objectness, 1, 1]], 1.0);
        assert_eq!(encoded.targets[[0, objectness, 0, 0]], 0.0);
        assert_eq!(encoded.targets[[1, objectness, 7, 10]], 1.0);
    }

    #[test]
    fn encode_single_image() {
        let dataset = CocoDataset::from_json(DATASET).unwrap();
        let encoded = encode_dataset(&dataset, &DetectorConfig::default(), Some(7)).unwrap();

        assert_eq!(encoded.image_ids, vec![7]);
        assert_eq!(encoded.targets.shape(), &[1, 5, 15, 20]);
    }

    #[test]
    fn annotations_of_unknown_images_are_skipped() {
        let dataset = CocoDataset::from_json(
            &DATASET.replace(r#""image_id": 7"#, r#""image_id": 8"#),
        )
        .unwrap();
        let encoded = encode_dataset(&dataset, &DetectorConfig::default(), None).unwrap();

        // image 7 has no annotations left, image 8 does not exist
        assert_eq!(encoded.image_ids, vec![3, 7]);
        assert_eq!(encoded.targets.shape(), &[2, 5, 15, 20]);
        assert_eq!(
            encoded.targets[[1, Channel::Objectness.index(), 7, 10]],
            0.0
        );
    }

    #[test]
    fn unknown_image_is_an_error() {
        let dataset = CocoDataset::from_json(DATASET).unwrap();

        assert!(matches!(
            encode_dataset(&dataset, &DetectorConfig::default(), Some(99)),
            Err(Error::UnknownImage(99))
        ));
    }
}
