//! Deferred computation graph for scella.
//!
//! Operations on a virtual matrix (selection, elementwise transforms,
//! reordering) are recorded as immutable nodes in an arena; nothing
//! touches storage until an explicit realization call. At realization
//! time the recorded ancestry is composed into the minimal extraction
//! plus one pass of (possibly fused) elementwise transforms.

pub mod fusion;
pub mod graph;
pub mod realize;
pub mod transform;

// Re-export commonly used types
pub use fusion::{fuse, FusedPass};
pub use graph::{GraphHandle, GraphNode, LazyGraph, NodeOp};
pub use realize::{Realizer, Window};
pub use transform::TransformOp;
