use ndarray::{Array4, Axis};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::{
    bbox::BoundingBox,
    error::{Error, Result},
    geometry::GridGeometry,
    policy::{Assignment, AssignmentPolicy, CollisionPolicy, Resolution},
    target::TargetTensor,
};

/// Two boxes whose centers fell into the same cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultipleAssignment {
    /// The contested cell, `(ix, iy)`.
    pub cell: (usize, usize),
    /// Input index of the box that owns the cell after the collision.
    pub kept: usize,
    /// Input index of the box that was dropped from the target.
    pub discarded: usize,
    /// Overlap between the two boxes.
    pub iou: f32,
}

/// A box that could not be encoded.
#[derive(Debug)]
pub struct SkippedBox {
    pub index: usize,
    pub error: Error,
}

/// Everything that happened while encoding a single image.
#[derive(Debug, Default)]
pub struct EncodeReport {
    /// The boxes present in the target, in row-major cell order.
    pub assigned: Vec<Assignment>,
    pub collisions: Vec<MultipleAssignment>,
    pub skipped: Vec<SkippedBox>,
}

/// Encodes ground-truth boxes into the dense per-cell target the detector is trained on.
///
/// Every box is owned by the cell its center falls into. That cell stores the position of the
/// center inside the cell and the size of the box relative to the image:
///
/// | channel | value                           |
/// |---------|---------------------------------|
/// | 0       | `cx - ix`                       |
/// | 1       | `cy - iy`                       |
/// | 2       | `width / image_width`           |
/// | 3       | `height / image_height`         |
/// | 4       | `1.0`                           |
///
/// where `(cx, cy)` is the box center in cell units and `(ix, iy)` the owning cell.
/// Centers on or outside the image border are clamped into the closest edge cell.
///
/// When multiple boxes fall into the same cell the [`AssignmentPolicy`] decides which one
/// is kept, by default the last one wins.
#[derive(Debug, Clone)]
pub struct TargetEncoder<P = CollisionPolicy> {
    grid: GridGeometry,
    policy: P,
}

impl TargetEncoder {
    /// Create an encoder using the last-write-wins collision policy.
    #[must_use]
    pub fn new(grid: GridGeometry) -> Self {
        TargetEncoder {
            grid,
            policy: CollisionPolicy::default(),
        }
    }
}

impl<P: AssignmentPolicy> TargetEncoder<P> {
    /// Replace the collision policy of this encoder.
    #[must_use]
    pub fn with_policy<Q: AssignmentPolicy>(self, policy: Q) -> TargetEncoder<Q> {
        TargetEncoder {
            grid: self.grid,
            policy,
        }
    }

    #[must_use]
    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    /// Map a single box onto its owning cell.
    pub fn locate(&self, index: usize, bbox: &BoundingBox) -> Result<Assignment> {
        bbox.validate()?;

        let (center_x, center_y) = bbox.center();
        let (cx, cy) = self.grid.to_cell_coordinates(center_x, center_y);
        let (ix, iy) = self.grid.clamp_cell(cx, cy);

        Ok(Assignment {
            index,
            bbox: *bbox,
            cell: (ix, iy),
            offset: (cx - ix as f32, cy - iy as f32),
        })
    }

    /// Encode the boxes of a single image.
    ///
    /// Malformed boxes are skipped, see [`TargetEncoder::encode_with_report`] to find out
    /// which.
    #[must_use]
    pub fn encode(&self, boxes: &[BoundingBox]) -> TargetTensor {
        self.encode_with_report(boxes).0
    }

    /// Encode the boxes of a single image, reporting skipped boxes and cell collisions.
    pub fn encode_with_report(&self, boxes: &[BoundingBox]) -> (TargetTensor, EncodeReport) {
        let mut report = EncodeReport::default();
        let mut owners: Vec<Option<Assignment>> = vec![None; self.grid.num_cells()];

        for (index, bbox) in boxes.iter().enumerate() {
            let incoming = match self.locate(index, bbox) {
                Ok(assignment) => assignment,
                Err(error) => {
                    warn!("skipping box {index}: {error}");
                    report.skipped.push(SkippedBox { index, error });
                    continue;
                }
            };

            let (ix, iy) = incoming.cell;
            let owner = &mut owners[iy * self.grid.cells_x() + ix];

            let Some(current) = owner else {
                trace!(?incoming, "assigned box to empty cell");
                *owner = Some(incoming);
                continue;
            };

            let (kept, discarded) = match self.policy.resolve(current, &incoming) {
                Resolution::Keep => (*current, incoming),
                Resolution::Replace => (incoming, *current),
            };

            warn!(
                "boxes {} and {} share cell ({ix}, {iy}), keeping box {}",
                current.index, incoming.index, kept.index
            );
            report.collisions.push(MultipleAssignment {
                cell: (ix, iy),
                kept: kept.index,
                discarded: discarded.index,
                iou: kept.bbox.iou(&discarded.bbox),
            });
            *owner = Some(kept);
        }

        let mut target = TargetTensor::zeros(&self.grid);
        for assignment in owners.into_iter().flatten() {
            let (ix, iy) = assignment.cell;
            let (offset_x, offset_y) = assignment.offset;
            target.assign(
                ix,
                iy,
                [
                    offset_x,
                    offset_y,
                    assignment.bbox.width / self.grid.image_width(),
                    assignment.bbox.height / self.grid.image_height(),
                ],
            );
            report.assigned.push(assignment);
        }

        debug!(
            "encoded {} of {} boxes into {} cells ({} collisions)",
            boxes.len() - report.skipped.len(),
            boxes.len(),
            report.assigned.len(),
            report.collisions.len()
        );

        (target, report)
    }

    /// Encode the boxes of a batch of images into a `(N, 5, cells_y, cells_x)` array.
    ///
    /// Images are encoded in parallel.
    #[must_use]
    pub fn encode_batch(&self, batch: &[Vec<BoundingBox>]) -> Array4<f32> {
        let (channels, rows, columns) = self.grid.target_shape();
        let mut targets = Array4::zeros((batch.len(), channels, rows, columns));

        targets
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(batch.par_iter())
            .for_each(|(mut target, boxes)| {
                target.assign(&self.encode(boxes).view());
            });

        targets
    }
}
