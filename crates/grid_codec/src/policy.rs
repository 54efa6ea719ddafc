//! Policies deciding which box owns a cell when several box centers fall into it.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// A box that has been mapped onto a grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Position of the box in the encoder input.
    pub index: usize,
    pub bbox: BoundingBox,
    /// The owning cell, `(ix, iy)`.
    pub cell: (usize, usize),
    /// Position of the box center inside the cell, in cell units.
    pub offset: (f32, f32),
}

impl Assignment {
    /// Squared distance between the box center and the center of its cell, in cell units.
    #[must_use]
    pub fn distance_to_cell_center(&self) -> f32 {
        let (ox, oy) = self.offset;
        (ox - 0.5).powi(2) + (oy - 0.5).powi(2)
    }
}

/// Outcome of a cell collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the box that already owns the cell.
    Keep,
    /// Replace it with the incoming box.
    Replace,
}

/// Decides which of two boxes mapped to the same cell ends up in the target.
///
/// Implement this to plug a custom policy into [`TargetEncoder`](crate::TargetEncoder).
pub trait AssignmentPolicy: Send + Sync {
    fn resolve(&self, current: &Assignment, incoming: &Assignment) -> Resolution;
}

/// The box that comes last in the input wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriteWins;

impl AssignmentPolicy for LastWriteWins {
    fn resolve(&self, _current: &Assignment, _incoming: &Assignment) -> Resolution {
        Resolution::Replace
    }
}

/// The box with the largest area wins, equal areas fall back to last-write-wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepLarger;

impl AssignmentPolicy for KeepLarger {
    fn resolve(&self, current: &Assignment, incoming: &Assignment) -> Resolution {
        if incoming.bbox.area() >= current.bbox.area() {
            Resolution::Replace
        } else {
            Resolution::Keep
        }
    }
}

/// The box whose center is closest to the center of the cell wins, equal distances fall
/// back to last-write-wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestToCenter;

impl AssignmentPolicy for ClosestToCenter {
    fn resolve(&self, current: &Assignment, incoming: &Assignment) -> Resolution {
        if incoming.distance_to_cell_center() <= current.distance_to_cell_center() {
            Resolution::Replace
        } else {
            Resolution::Keep
        }
    }
}

/// The built-in policies, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    LastWriteWins,
    KeepLarger,
    ClosestToCenter,
}

impl AssignmentPolicy for CollisionPolicy {
    fn resolve(&self, current: &Assignment, incoming: &Assignment) -> Resolution {
        match self {
            CollisionPolicy::LastWriteWins => LastWriteWins.resolve(current, incoming),
            CollisionPolicy::KeepLarger => KeepLarger.resolve(current, incoming),
            CollisionPolicy::ClosestToCenter => ClosestToCenter.resolve(current, incoming),
        }
    }
}
