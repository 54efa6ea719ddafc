use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::geometry::GridGeometry;

/// Number of channels predicted per cell.
pub const NUM_CHANNELS: usize = 5;

/// The channels of a target or prediction tensor, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Channel {
    /// Horizontal offset of the box center inside its cell.
    OffsetX = 0,
    /// Vertical offset of the box center inside its cell.
    OffsetY = 1,
    /// Box width relative to the image width.
    Width = 2,
    /// Box height relative to the image height.
    Height = 3,
    /// Whether a box center falls inside the cell.
    Objectness = 4,
}

impl Channel {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Dense supervision target for a single image, with shape `(5, cells_y, cells_x)`.
///
/// Only cells with an objectness of `1.0` carry a box, the other four channels of all
/// remaining cells are zero and carry no meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTensor {
    data: Array3<f32>,
}

impl TargetTensor {
    /// Create an all-zero target for the given grid.
    #[must_use]
    pub fn zeros(grid: &GridGeometry) -> Self {
        TargetTensor {
            data: Array3::zeros(grid.target_shape()),
        }
    }

    /// Write a box encoding into cell `(ix, iy)` and mark it as occupied.
    pub(crate) fn assign(&mut self, ix: usize, iy: usize, values: [f32; 4]) {
        for (channel, value) in values.into_iter().enumerate() {
            self.data[[channel, iy, ix]] = value;
        }
        self.data[[Channel::Objectness.index(), iy, ix]] = 1.0;
    }

    /// The objectness plane, with shape `(cells_y, cells_x)`.
    #[must_use]
    pub fn objectness(&self) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), Channel::Objectness.index())
    }

    /// Returns `true` if a box is assigned to cell `(ix, iy)`.
    #[must_use]
    pub fn is_assigned(&self, ix: usize, iy: usize) -> bool {
        self.data[[Channel::Objectness.index(), iy, ix]] == 1.0
    }

    /// Number of cells that have a box assigned to them.
    #[must_use]
    pub fn num_assigned(&self) -> usize {
        self.objectness().iter().filter(|&&v| v == 1.0).count()
    }

    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    #[must_use]
    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }
}

impl AsRef<Array3<f32>> for TargetTensor {
    fn as_ref(&self) -> &Array3<f32> {
        &self.data
    }
}

impl From<TargetTensor> for Array3<f32> {
    fn from(target: TargetTensor) -> Self {
        target.data
    }
}
