//! Triplet store access and query planning for scella.
//!
//! This crate owns the storage-facing half of the engine:
//! - [`TripletStore`] is the read-only contract over the three logical
//!   tables (cells, genes, expression triples), with an in-memory backend
//!   and a SQL-rendering backend over an external query engine.
//! - [`RangePlanner`] turns arbitrary identifier sets into range and
//!   enumerated predicate fragments.
//! - [`SubmatrixExtractor`] resolves selectors, batches fragment queries,
//!   and assembles caller-ordered sparse submatrices.

pub mod extract;
pub mod planner;
pub mod predicate;
pub mod sql;
pub mod store;

// Re-export commonly used types
pub use extract::SubmatrixExtractor;
pub use planner::RangePlanner;
pub use predicate::{AxisConstraint, EntryQuery, PredicateFragment};
pub use sql::{SqlExecutor, SqlStore, TableLayout};
pub use store::{MemoryStore, TripletStore};
