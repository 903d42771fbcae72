//! scella: a lazy storage-and-query engine for very large sparse
//! single-cell expression matrices.
//!
//! The facade crate re-exports the workspace members:
//! - [`core`]: entities, selectors, sparse matrices, tokenized batches
//! - [`query`]: triplet stores, range planning, submatrix extraction
//! - [`lazy`]: the deferred computation graph and realization
//! - [`loader`]: the streaming tokenized batch producer
//! - [`error`], [`config`], [`runtime`]: the shared foundations

pub use common_config as config;
pub use common_error as error;
pub use common_runtime as runtime;
pub use scella_core as core;
pub use scella_lazy as lazy;
pub use scella_loader as loader;
pub use scella_query as query;

pub use common_error::{ScellaError, ScellaResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
