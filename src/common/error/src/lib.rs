//! Error types and result aliases for scella.
//!
//! This module provides the core error handling infrastructure shared by
//! every crate in the workspace.

mod error;

pub use error::{GenericError, ScellaError, ScellaResult};
