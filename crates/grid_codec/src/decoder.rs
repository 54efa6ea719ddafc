use itertools::Itertools;
use ndarray::{ArrayView2, ArrayView3, ArrayView4, ArrayViewD, Axis, Ix3, Ix4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    bbox::BoundingBox,
    error::{Error, Result},
    geometry::GridGeometry,
    target::Channel,
};

/// The number of boxes returned when no selection is configured.
pub const DEFAULT_TOP_K: usize = 100;

/// How the decoder picks the cells that contain a box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Every cell with an objectness of at least the threshold, in row-major order.
    Threshold(f32),
    /// The `k` cells with the highest objectness, in descending order.
    TopK(usize),
}

impl Selection {
    /// Check that the selection parameter is usable.
    ///
    /// A threshold must lie in `[0, 1]` and `k` must be at least one.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Selection::Threshold(t) if !(0.0..=1.0).contains(&t) => Err(Error::InvalidArgument(
                format!("threshold must be in [0, 1], got {t}"),
            )),
            Selection::TopK(0) => Err(Error::InvalidArgument(
                "top-k selection needs k > 0".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::TopK(DEFAULT_TOP_K)
    }
}

/// Decodes per-cell predictions back into bounding boxes in image coordinates.
///
/// This is the inverse of [`TargetEncoder`](crate::TargetEncoder). For a selected cell
/// `(ix, iy)` with prediction `(ox, oy, rw, rh, conf)` the decoded box is
///
/// ```text
/// width    = image_width * |rw|
/// height   = image_height * |rh|
/// center_x = cell_width * (ix + ox)
/// center_y = cell_height * (iy + oy)
/// score    = conf
/// ```
///
/// Offsets are not clamped to their cell and boxes are not clipped to the image.
#[derive(Debug, Clone, Copy)]
pub struct OutputDecoder {
    grid: GridGeometry,
}

impl OutputDecoder {
    #[must_use]
    pub fn new(grid: GridGeometry) -> Self {
        OutputDecoder { grid }
    }

    #[must_use]
    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    /// Decode either a single `(5, cells_y, cells_x)` prediction or a
    /// `(N, 5, cells_y, cells_x)` batch.
    ///
    /// A single prediction is treated as a batch of one image.
    pub fn decode(
        &self,
        output: ArrayViewD<'_, f32>,
        selection: Selection,
    ) -> Result<Vec<Vec<BoundingBox>>> {
        let shape = output.shape().to_vec();
        match shape.len() {
            3 => {
                let output = output
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| self.batch_shape_mismatch(&shape))?;
                Ok(vec![self.decode_image(output, selection)?])
            }
            4 => {
                let output = output
                    .into_dimensionality::<Ix4>()
                    .map_err(|_| self.batch_shape_mismatch(&shape))?;
                self.decode_batch(output, selection)
            }
            _ => Err(self.batch_shape_mismatch(&shape)),
        }
    }

    /// Decode a `(N, 5, cells_y, cells_x)` batch, one list of boxes per image.
    ///
    /// Images are decoded in parallel, the output preserves the batch order.
    pub fn decode_batch(
        &self,
        output: ArrayView4<'_, f32>,
        selection: Selection,
    ) -> Result<Vec<Vec<BoundingBox>>> {
        selection.validate()?;

        let (_, channels, rows, columns) = output.dim();
        if (channels, rows, columns) != self.grid.target_shape() {
            return Err(self.batch_shape_mismatch(output.shape()));
        }

        output
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|image| self.decode_image(image, selection))
            .collect()
    }

    /// Decode the `(5, cells_y, cells_x)` prediction of a single image.
    pub fn decode_image(
        &self,
        output: ArrayView3<'_, f32>,
        selection: Selection,
    ) -> Result<Vec<BoundingBox>> {
        selection.validate()?;

        if output.dim() != self.grid.target_shape() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", self.grid.target_shape()),
                actual: output.shape().to_vec(),
            });
        }

        let cells = select_cells(
            output.index_axis(Axis(0), Channel::Objectness.index()),
            selection,
        );
        let boxes: Vec<_> = cells
            .into_iter()
            .map(|(iy, ix)| self.decode_cell(&output, iy, ix))
            .collect();

        debug!("decoded {} boxes using {selection:?}", boxes.len());
        Ok(boxes)
    }

    fn decode_cell(&self, output: &ArrayView3<'_, f32>, iy: usize, ix: usize) -> BoundingBox {
        let value = |channel: Channel| output[[channel.index(), iy, ix]];

        let width = self.grid.image_width() * value(Channel::Width).abs();
        let height = self.grid.image_height() * value(Channel::Height).abs();
        let center_x = self.grid.cell_width() * (ix as f32 + value(Channel::OffsetX));
        let center_y = self.grid.cell_height() * (iy as f32 + value(Channel::OffsetY));

        let bbox = BoundingBox {
            x: center_x - width / 2.0,
            y: center_y - height / 2.0,
            width,
            height,
            score: value(Channel::Objectness),
            category: None,
        };
        trace!(?bbox, "decoded cell ({ix}, {iy})");

        bbox
    }

    fn batch_shape_mismatch(&self, actual: &[usize]) -> Error {
        let (channels, rows, columns) = self.grid.target_shape();
        Error::ShapeMismatch {
            expected: format!("({channels}, {rows}, {columns}) or (N, {channels}, {rows}, {columns})"),
            actual: actual.to_vec(),
        }
    }
}

/// Pick the cells holding a box from the objectness plane, as `(iy, ix)` pairs.
fn select_cells(objectness: ArrayView2<'_, f32>, selection: Selection) -> Vec<(usize, usize)> {
    match selection {
        Selection::Threshold(threshold) => objectness
            .indexed_iter()
            .filter(|&(_, &score)| score >= threshold)
            .map(|(cell, _)| cell)
            .collect(),
        Selection::TopK(k) => objectness
            .indexed_iter()
            .enumerate()
            .k_smallest_by(k, |(a_index, (_, a)), (b_index, (_, b))| {
                // highest score first, ties go to the lower row-major index
                rank(**b)
                    .total_cmp(&rank(**a))
                    .then(a_index.cmp(b_index))
            })
            .map(|(_, (cell, _))| cell)
            .collect(),
    }
}

/// Orders NaN scores below every other score.
fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, Array4};

    use super::*;
    use crate::TargetEncoder;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4 * a.abs().max(1.0)
    }

    fn assert_box_eq(actual: &BoundingBox, expected: &BoundingBox) {
        assert!(
            close(actual.x, expected.x)
                && close(actual.y, expected.y)
                && close(actual.width, expected.width)
                && close(actual.height, expected.height),
            "{actual:?} != {expected:?}"
        );
    }

    fn scores(values: &[((usize, usize), f32)]) -> Array3<f32> {
        let mut output = Array3::zeros(GridGeometry::REFERENCE.target_shape());
        for &((iy, ix), score) in values {
            output[[Channel::Objectness.index(), iy, ix]] = score;
        }
        output
    }

    #[test]
    fn decode_reference_box() {
        let grid = GridGeometry::REFERENCE;
        let target = TargetEncoder::new(grid).encode(&[BoundingBox::xywh(300.0, 220.0, 40.0, 40.0)]);

        let boxes = OutputDecoder::new(grid)
            .decode_image(target.view(), Selection::Threshold(0.5))
            .unwrap();

        assert_eq!(boxes.len(), 1);
        assert_box_eq(&boxes[0], &BoundingBox::xywh(300.0, 220.0, 40.0, 40.0));
        assert_eq!(boxes[0].score, 1.0);
        assert_eq!(boxes[0].category, None);
    }

    #[test]
    fn decode_zero_is_empty() {
        let output = Array3::zeros(GridGeometry::REFERENCE.target_shape());
        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::Threshold(0.5))
            .unwrap();

        assert!(boxes.is_empty());
    }

    #[test]
    fn negative_size_is_mirrored() {
        let mut output = scores(&[((2, 3), 0.9)]);
        output[[Channel::OffsetX.index(), 2, 3]] = 0.5;
        output[[Channel::OffsetY.index(), 2, 3]] = 0.5;
        output[[Channel::Width.index(), 2, 3]] = -0.1;
        output[[Channel::Height.index(), 2, 3]] = -0.2;

        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::Threshold(0.5))
            .unwrap();

        assert_box_eq(&boxes[0], &BoundingBox::cxcywh(112.0, 80.0, 64.0, 96.0));
    }

    #[test]
    fn offsets_outside_cell_are_kept() {
        let mut output = scores(&[((0, 0), 0.9)]);
        output[[Channel::OffsetX.index(), 0, 0]] = -1.0;
        output[[Channel::OffsetY.index(), 0, 0]] = 2.5;

        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::Threshold(0.5))
            .unwrap();

        assert_eq!(boxes[0].center(), (-32.0, 80.0));
    }

    #[test]
    fn threshold_is_row_major() {
        let output = scores(&[((3, 1), 0.6), ((0, 5), 0.7), ((3, 0), 0.9), ((9, 9), 0.2)]);

        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::Threshold(0.5))
            .unwrap();

        let scores: Vec<_> = boxes.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![0.7, 0.9, 0.6]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let output = scores(&[((1, 1), 0.5)]);

        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::Threshold(0.5))
            .unwrap();

        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn top_k_descending_with_stable_ties() {
        let output = scores(&[((3, 1), 0.6), ((0, 5), 0.6), ((3, 0), 0.9), ((9, 9), f32::NAN)]);

        let boxes = OutputDecoder::new(GridGeometry::REFERENCE)
            .decode_image(output.view(), Selection::TopK(3))
            .unwrap();

        let centers: Vec<_> = boxes.iter().map(BoundingBox::center).collect();
        // (3, 0) first, then the tie between (0, 5) and (3, 1) in row-major order
        assert_eq!(centers, vec![(0.0, 96.0), (160.0, 0.0), (32.0, 96.0)]);
    }

    #[test]
    fn top_k_larger_than_grid_returns_all_cells() {
        let grid = GridGeometry::new(2, 2, 64, 64).unwrap();
        let mut output = Array3::zeros(grid.target_shape());
        output[[Channel::Objectness.index(), 1, 1]] = 0.8;

        let boxes = OutputDecoder::new(grid)
            .decode_image(output.view(), Selection::TopK(10))
            .unwrap();

        let scores: Vec<_> = boxes.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![0.8, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_selection_fails() {
        let output = Array3::zeros(GridGeometry::REFERENCE.target_shape());
        let decoder = OutputDecoder::new(GridGeometry::REFERENCE);

        for selection in [
            Selection::TopK(0),
            Selection::Threshold(-0.1),
            Selection::Threshold(1.5),
            Selection::Threshold(f32::NAN),
        ] {
            assert!(matches!(
                decoder.decode_image(output.view(), selection),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn shape_mismatch_fails() {
        let decoder = OutputDecoder::new(GridGeometry::REFERENCE);

        let wrong_grid = Array3::<f32>::zeros((5, 23, 40));
        assert!(matches!(
            decoder.decode(wrong_grid.view().into_dyn(), Selection::default()),
            Err(Error::ShapeMismatch { .. })
        ));

        let wrong_channels = Array4::<f32>::zeros((2, 4, 15, 20));
        assert!(matches!(
            decoder.decode(wrong_channels.view().into_dyn(), Selection::default()),
            Err(Error::ShapeMismatch { .. })
        ));

        let flat = ndarray::Array2::<f32>::zeros((15, 20));
        assert!(matches!(
            decoder.decode(flat.view().into_dyn(), Selection::default()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn batch_preserves_order() {
        let grid = GridGeometry::REFERENCE;
        let encoder = TargetEncoder::new(grid);
        let batch = vec![
            vec![BoundingBox::xywh(300.0, 220.0, 40.0, 40.0)],
            vec![],
            vec![
                BoundingBox::cxcywh(48.0, 48.0, 16.0, 16.0),
                BoundingBox::cxcywh(592.0, 432.0, 32.0, 64.0),
            ],
        ];
        let targets = encoder.encode_batch(&batch);

        let decoded = OutputDecoder::new(grid)
            .decode(targets.view().into_dyn(), Selection::Threshold(0.5))
            .unwrap();

        assert_eq!(decoded.len(), 3);
        for (boxes, expected) in decoded.iter().zip(&batch) {
            assert_eq!(boxes.len(), expected.len());
            for (actual, expected) in boxes.iter().zip(expected) {
                assert_box_eq(actual, expected);
            }
        }
    }

    #[test]
    fn single_image_is_a_batch_of_one() {
        let grid = GridGeometry::REFERENCE;
        let target = TargetEncoder::new(grid).encode(&[BoundingBox::xywh(300.0, 220.0, 40.0, 40.0)]);

        let decoded = OutputDecoder::new(grid)
            .decode(target.view().into_dyn(), Selection::TopK(1))
            .unwrap();

        assert_eq!(decoded.len(), 1);
        assert_box_eq(&decoded[0][0], &BoundingBox::xywh(300.0, 220.0, 40.0, 40.0));
    }

    #[test]
    fn default_selection_is_top_100() {
        assert_eq!(Selection::default(), Selection::TopK(100));
    }
}
