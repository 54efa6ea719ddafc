use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An axis-aligned bounding box in pixel coordinates.
///
/// The box is stored as its top-left corner and its extent, the same layout COCO uses for
/// its `bbox` field.
///
/// ```
/// use grid_codec::BoundingBox;
///
/// let bbox = BoundingBox::xywh(300.0, 220.0, 40.0, 40.0);
///
/// assert_eq!(bbox.center(), (320.0, 240.0));
/// assert_eq!(bbox.area(), 1600.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Column of the top-left corner.
    pub x: f32,
    /// Row of the top-left corner.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Confidence of the box.
    ///
    /// Ground-truth boxes have a score of `1.0`, decoded boxes carry the raw objectness value.
    pub score: f32,
    /// Class id of the box, decoded boxes never have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<u32>,
}

impl BoundingBox {
    /// Create a ground-truth box from its top-left corner and size.
    #[must_use]
    pub fn xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
            score: 1.0,
            category: None,
        }
    }

    /// Create a box from its center and size.
    #[must_use]
    pub fn cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::xywh(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: u32) -> Self {
        self.category = Some(category);
        self
    }

    /// Center of the box, `(x, y)`.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Coordinates of the top-left and bottom-right corners, `(x1, y1, x2, y2)`.
    #[must_use]
    pub fn xyxy(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Compute the intersection area between two bounding boxes.
    ///
    /// If the bounding boxes do not overlap, the intersection area is `0.0`.
    #[must_use]
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let (x1, y1, x2, y2) = self.xyxy();
        let (x3, y3, x4, y4) = other.xyxy();

        let x1 = x1.max(x3);
        let y1 = y1.max(y3);
        let x2 = x2.min(x4);
        let y2 = y2.min(y4);

        if x2 < x1 || y2 < y1 {
            0.0
        } else {
            (x2 - x1) * (y2 - y1)
        }
    }

    /// Compute the union area between two bounding boxes.
    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    /// Compute the intersection over union (IoU) between two bounding boxes.
    ///
    /// Two empty boxes have an IoU of `0.0`.
    #[must_use]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union > 0.0 {
            self.intersection(other) / union
        } else {
            0.0
        }
    }

    /// Scale the box by independent horizontal and vertical factors.
    #[must_use]
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            ..*self
        }
    }

    /// Clip the box to an image of the given width and height.
    #[must_use]
    pub fn clipped(&self, width: f32, height: f32) -> Self {
        let (x1, y1, x2, y2) = self.xyxy();
        let x1 = x1.clamp(0.0, width);
        let y1 = y1.clamp(0.0, height);
        let x2 = x2.clamp(0.0, width);
        let y2 = y2.clamp(0.0, height);

        BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            ..*self
        }
    }

    /// Check that the box can be encoded.
    ///
    /// A box must have finite coordinates and a non-negative width and height.
    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(Error::InvalidGeometry {
                reason: format!("box {self:?} has non-finite coordinates"),
            });
        }

        if self.width < 0.0 || self.height < 0.0 {
            return Err(Error::InvalidGeometry {
                reason: format!(
                    "box has a negative size ({} x {})",
                    self.width, self.height
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_overlapping() {
        let bbox1 = BoundingBox::xywh(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::xywh(5.0, 5.0, 10.0, 10.0);

        assert_eq!(bbox1.intersection(&bbox2), 25.0);
        assert_eq!(bbox1.union(&bbox2), 175.0);
        assert_eq!(bbox1.iou(&bbox2), 25.0 / 175.0);
    }

    #[test]
    fn iou_disjoint_and_empty() {
        let bbox1 = BoundingBox::xywh(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::xywh(20.0, 20.0, 10.0, 10.0);
        assert_eq!(bbox1.iou(&bbox2), 0.0);

        let empty = BoundingBox::xywh(3.0, 3.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn center_roundtrip() {
        let bbox = BoundingBox::cxcywh(320.0, 240.0, 40.0, 20.0);

        assert_eq!(bbox.xyxy(), (300.0, 230.0, 340.0, 250.0));
        assert_eq!(bbox.center(), (320.0, 240.0));
    }

    #[test]
    fn clip_to_image() {
        let bbox = BoundingBox::xywh(-10.0, 470.0, 30.0, 20.0).clipped(640.0, 480.0);

        assert_eq!(bbox.xyxy(), (0.0, 470.0, 20.0, 480.0));
    }

    #[test]
    fn validate_rejects_malformed() {
        assert!(BoundingBox::xywh(0.0, 0.0, 0.0, 0.0).validate().is_ok());
        assert!(BoundingBox::xywh(0.0, 0.0, -1.0, 4.0).validate().is_err());
        assert!(BoundingBox::xywh(0.0, 0.0, 4.0, -1.0).validate().is_err());
        assert!(BoundingBox::xywh(f32::NAN, 0.0, 4.0, 4.0).validate().is_err());
        assert!(BoundingBox::xywh(0.0, 0.0, f32::INFINITY, 4.0).validate().is_err());
    }
}
