//! COCO annotations and their resampling onto the reference image size.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    bbox::BoundingBox,
    error::{Error, Result},
    geometry::GridGeometry,
};

/// The subset of a COCO annotation file needed to build targets.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoImage {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoAnnotation {
    pub image_id: u64,
    #[serde(default)]
    pub category_id: u32,
    /// `[x, y, width, height]` in pixels of the source image.
    pub bbox: [f32; 4],
}

impl CocoAnnotation {
    #[must_use]
    pub fn to_bbox(&self) -> BoundingBox {
        let [x, y, width, height] = self.bbox;
        BoundingBox::xywh(x, y, width, height).with_category(self.category_id)
    }
}

impl CocoDataset {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn image(&self, id: u64) -> Option<&CocoImage> {
        self.images.iter().find(|image| image.id == id)
    }

    /// The ground-truth boxes of every image, keyed by image id.
    ///
    /// Images without annotations map to an empty list.
    #[must_use]
    pub fn boxes_per_image(&self) -> BTreeMap<u64, Vec<BoundingBox>> {
        let mut boxes: BTreeMap<u64, Vec<BoundingBox>> = self
            .images
            .iter()
            .map(|image| (image.id, Vec::new()))
            .collect();

        for annotation in &self.annotations {
            boxes
                .entry(annotation.image_id)
                .or_default()
                .push(annotation.to_bbox());
        }

        boxes
    }
}

/// Maps boxes from their source image onto the reference image size of a grid.
///
/// Boxes are scaled with the image, clipped to its border, and dropped when too little of
/// them is left.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    grid: GridGeometry,
    /// Minimum area in pixels of a resampled box.
    min_area: f32,
    /// Minimum fraction of a resampled box that has to lie inside the image.
    min_visibility: f32,
}

impl Resampler {
    #[must_use]
    pub fn new(grid: GridGeometry) -> Self {
        Resampler {
            grid,
            min_area: 0.0,
            min_visibility: 0.0,
        }
    }

    #[must_use]
    pub fn with_min_area(mut self, min_area: f32) -> Self {
        self.min_area = min_area;
        self
    }

    #[must_use]
    pub fn with_min_visibility(mut self, min_visibility: f32) -> Self {
        self.min_visibility = min_visibility;
        self
    }

    /// Resample the boxes of an image of `source_width` by `source_height` pixels.
    ///
    /// Malformed boxes are passed through unchanged, so that the encoder can report them.
    pub fn resample(
        &self,
        boxes: &[BoundingBox],
        source_width: u32,
        source_height: u32,
    ) -> Result<Vec<BoundingBox>> {
        if source_width == 0 || source_height == 0 {
            return Err(Error::InvalidArgument(format!(
                "source image size must be non-zero, got {source_width}x{source_height}"
            )));
        }

        let sx = self.grid.image_width() / source_width as f32;
        let sy = self.grid.image_height() / source_height as f32;

        let resampled: Vec<_> = boxes
            .iter()
            .filter_map(|bbox| {
                if bbox.validate().is_err() {
                    return Some(*bbox);
                }

                let scaled = bbox.scaled(sx, sy);
                let clipped = scaled.clipped(self.grid.image_width(), self.grid.image_height());

                if clipped.area() < self.min_area {
                    return None;
                }

                let visibility = if scaled.area() > 0.0 {
                    clipped.area() / scaled.area()
                } else {
                    1.0
                };
                (visibility >= self.min_visibility).then_some(clipped)
            })
            .collect();

        debug!(
            "resampled {} of {} boxes from {source_width}x{source_height}",
            resampled.len(),
            boxes.len()
        );
        Ok(resampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "info": {"description": "test"},
        "images": [
            {"id": 1, "width": 1280, "height": 960, "file_name": "a.jpg"},
            {"id": 2, "width": 640, "height": 480, "file_name": "b.jpg"}
        ],
        "annotations": [
            {"id": 10, "image_id": 1, "category_id": 3, "bbox": [600.0, 440.0, 80.0, 80.0], "area": 6400},
            {"id": 11, "image_id": 1, "category_id": 1, "bbox": [0.0, 0.0, 20.0, 20.0], "area": 400}
        ]
    }"#;

    #[test]
    fn parse_and_group() {
        let dataset = CocoDataset::from_json(DATASET).unwrap();
        let boxes = dataset.boxes_per_image();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[&1].len(), 2);
        assert!(boxes[&2].is_empty());
        assert_eq!(boxes[&1][0].category, Some(3));
        assert_eq!(dataset.image(2).unwrap().file_name, "b.jpg");
    }

    #[test]
    fn reject_invalid_json() {
        assert!(matches!(
            CocoDataset::from_json("{\"images\": 3}"),
            Err(Error::Annotations(_))
        ));
    }

    #[test]
    fn resample_scales_and_filters() {
        let dataset = CocoDataset::from_json(DATASET).unwrap();
        let boxes = &dataset.boxes_per_image()[&1];

        let resampled = Resampler::new(GridGeometry::REFERENCE)
            .with_min_area(1024.0)
            .resample(boxes, 1280, 960)
            .unwrap();

        // the 10x10 box is below the minimum area after scaling
        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled[0].xyxy(), (300.0, 220.0, 340.0, 260.0));
        assert_eq!(resampled[0].category, Some(3));
    }

    #[test]
    fn resample_drops_mostly_hidden_boxes() {
        let boxes = [
            BoundingBox::xywh(630.0, 100.0, 100.0, 100.0),
            BoundingBox::xywh(600.0, 100.0, 100.0, 100.0),
        ];

        let resampled = Resampler::new(GridGeometry::REFERENCE)
            .with_min_visibility(0.2)
            .resample(&boxes, 640, 480)
            .unwrap();

        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled[0].xyxy(), (600.0, 100.0, 640.0, 200.0));
    }

    #[test]
    fn resample_keeps_malformed_boxes() {
        let boxes = [BoundingBox::xywh(10.0, 10.0, -4.0, 4.0)];

        let resampled = Resampler::new(GridGeometry::REFERENCE)
            .with_min_area(1024.0)
            .resample(&boxes, 640, 480)
            .unwrap();

        assert_eq!(resampled, boxes);
    }

    #[test]
    fn resample_rejects_empty_source() {
        assert!(Resampler::new(GridGeometry::REFERENCE)
            .resample(&[], 0, 480)
            .is_err());
    }
}
