use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::target::NUM_CHANNELS;

/// The fixed grid that both the encoder and the decoder are defined against.
///
/// A grid of `cells_x` columns and `cells_y` rows covers an image of
/// `image_width` by `image_height` pixels. Every cell therefore spans
/// `image_width / cells_x` by `image_height / cells_y` pixels.
///
/// A [`GridGeometry`] can only be constructed through [`GridGeometry::new`] (or by
/// deserializing one), which guarantees that all four dimensions are non-zero.
///
/// ```
/// use grid_codec::GridGeometry;
///
/// let grid = GridGeometry::new(20, 15, 640, 480).unwrap();
///
/// assert_eq!(grid.cell_width(), 32.0);
/// assert_eq!(grid.cell_height(), 32.0);
/// assert_eq!(grid.target_shape(), (5, 15, 20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGridGeometry", into = "RawGridGeometry")]
pub struct GridGeometry {
    cells_x: usize,
    cells_y: usize,
    image_width: u32,
    image_height: u32,
}

impl GridGeometry {
    /// The geometry of the reference backbone: a 20x15 grid over 640x480 images.
    pub const REFERENCE: GridGeometry = GridGeometry {
        cells_x: 20,
        cells_y: 15,
        image_width: 640,
        image_height: 480,
    };

    /// Create a new [`GridGeometry`], failing if any dimension is zero.
    pub fn new(cells_x: usize, cells_y: usize, image_width: u32, image_height: u32) -> Result<Self> {
        if cells_x == 0 || cells_y == 0 || image_width == 0 || image_height == 0 {
            return Err(Error::InvalidGrid {
                cells_x,
                cells_y,
                image_width,
                image_height,
            });
        }

        Ok(GridGeometry {
            cells_x,
            cells_y,
            image_width,
            image_height,
        })
    }

    /// Number of cells along the horizontal axis.
    #[must_use]
    pub const fn cells_x(&self) -> usize {
        self.cells_x
    }

    /// Number of cells along the vertical axis.
    #[must_use]
    pub const fn cells_y(&self) -> usize {
        self.cells_y
    }

    /// Total number of cells in the grid.
    #[must_use]
    pub const fn num_cells(&self) -> usize {
        self.cells_x * self.cells_y
    }

    #[must_use]
    pub fn image_width(&self) -> f32 {
        self.image_width as f32
    }

    #[must_use]
    pub fn image_height(&self) -> f32 {
        self.image_height as f32
    }

    /// Width of a single cell in pixels.
    #[must_use]
    pub fn cell_width(&self) -> f32 {
        self.image_width() / self.cells_x as f32
    }

    /// Height of a single cell in pixels.
    #[must_use]
    pub fn cell_height(&self) -> f32 {
        self.image_height() / self.cells_y as f32
    }

    /// Shape of a single target or prediction tensor, `(channels, rows, columns)`.
    #[must_use]
    pub const fn target_shape(&self) -> (usize, usize, usize) {
        (NUM_CHANNELS, self.cells_y, self.cells_x)
    }

    /// Map a pixel position to continuous cell coordinates.
    ///
    /// The integer part of the result is the cell index, the fractional part the
    /// position inside that cell.
    #[must_use]
    pub fn to_cell_coordinates(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x / self.image_width() * self.cells_x as f32,
            y / self.image_height() * self.cells_y as f32,
        )
    }

    /// The cell containing the continuous cell coordinates `(cx, cy)`, clamped to the grid.
    ///
    /// Coordinates on or beyond the border of the grid are assigned to the closest edge cell.
    #[must_use]
    pub fn clamp_cell(&self, cx: f32, cy: f32) -> (usize, usize) {
        // `as` saturates, so negative coordinates end up in the first row/column
        let ix = (cx.floor() as usize).min(self.cells_x - 1);
        let iy = (cy.floor() as usize).min(self.cells_y - 1);
        (ix, iy)
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Unchecked serialized form of a [`GridGeometry`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGridGeometry {
    cells_x: usize,
    cells_y: usize,
    image_width: u32,
    image_height: u32,
}

impl TryFrom<RawGridGeometry> for GridGeometry {
    type Error = Error;

    fn try_from(raw: RawGridGeometry) -> Result<Self> {
        GridGeometry::new(raw.cells_x, raw.cells_y, raw.image_width, raw.image_height)
    }
}

impl From<GridGeometry> for RawGridGeometry {
    fn from(grid: GridGeometry) -> Self {
        RawGridGeometry {
            cells_x: grid.cells_x,
            cells_y: grid.cells_y,
            image_width: grid.image_width,
            image_height: grid.image_height,
        }
    }
}
