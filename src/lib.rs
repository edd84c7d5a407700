//! Component-tree (max-tree) construction and attribute computation for
//! grayscale images.
//!
//! Given an image of discrete intensities and a pixel connectivity, the
//! builder floods the image once (Salembier's hierarchical queues) into a
//! rooted tree whose nodes are the connected components of the upper level
//! sets, annotated with a configurable attribute bundle. The tree supports
//! attribute filtering and reconstruction of a filtered image under
//! MIN / MAX / DIRECT rules.

pub mod constants;
mod core;
pub mod io;
pub mod prelude;
mod utils;

pub use crate::core::attributes::{Attribute, AttributeSet};
pub use crate::core::image::Image;
pub use crate::core::neighborhood::Neighborhood;
pub use crate::core::node::{BoundingBox, Node, NodeId};
pub use crate::core::number::Number;
pub use crate::core::reconstruct::Rule;
pub use crate::core::tree::ComponentTree;

/// The current version of the crate.
pub const VERSION: &str = "0.2.0";
