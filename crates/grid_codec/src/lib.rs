//! Encoding of ground-truth boxes into the dense per-cell targets of a grid detector, and
//! decoding of the detector output back into boxes.
//!
//! Both directions are defined against an explicit [`GridGeometry`]:
//!
//! ```
//! use grid_codec::{BoundingBox, GridGeometry, OutputDecoder, Selection, TargetEncoder};
//!
//! let grid = GridGeometry::new(20, 15, 640, 480).unwrap();
//!
//! let target = TargetEncoder::new(grid).encode(&[BoundingBox::xywh(300.0, 220.0, 40.0, 40.0)]);
//! assert!(target.is_assigned(10, 7));
//!
//! let boxes = OutputDecoder::new(grid)
//!     .decode_image(target.view(), Selection::Threshold(0.5))
//!     .unwrap();
//! assert_eq!(boxes.len(), 1);
//! ```

pub mod annotation;
pub mod bbox;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod policy;
pub mod target;

pub use bbox::BoundingBox;
pub use decoder::{OutputDecoder, Selection};
pub use encoder::{EncodeReport, MultipleAssignment, TargetEncoder};
pub use error::{Error, Result};
pub use geometry::GridGeometry;
pub use policy::{AssignmentPolicy, CollisionPolicy};
pub use target::{Channel, TargetTensor};
