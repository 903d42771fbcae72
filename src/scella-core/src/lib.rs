//! Core data model for the scella sparse-matrix engine.
//!
//! This crate provides the fundamental types shared by the query and lazy
//! layers:
//! - `Value` for typed entity attributes
//! - `Entity` records for cells (rows) and genes (columns)
//! - `Selector` and `AttrExpr` for describing which entities to include
//! - `SparseEntry` and `RealizedMatrix` for sparse data
//! - `TokenizedBatch` for model-input batches

pub mod batch;
pub mod entity;
pub mod matrix;
pub mod selector;
pub mod value;

// Re-export commonly used types
pub use batch::TokenizedBatch;
pub use entity::{Axis, Entity, EntityId};
pub use matrix::{MatrixEntry, RealizedMatrix, SparseEntry};
pub use selector::{attr, lit, AttrExpr, CompareOp, Selector};
pub use value::Value;
