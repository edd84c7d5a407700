//! Common imports for working with component trees.

pub use crate::core::attributes::Attribute;
pub use crate::core::attributes::AttributeSet;
pub use crate::core::image::Image;
pub use crate::core::neighborhood::Neighborhood;
pub use crate::core::node::{BoundingBox, Node, NodeId};
pub use crate::core::number::Number;
pub use crate::core::reconstruct::Rule;
pub use crate::core::tree::ComponentTree;
