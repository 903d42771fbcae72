//! Entity records for the two matrix axes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Dense integer identifier for an entity, assigned once at ingest and
/// never renumbered.
pub type EntityId = u64;

/// Matrix axis. Rows are cells, columns are genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Row axis (cells).
    Rows,
    /// Column axis (genes).
    Cols,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows => write!(f, "cells"),
            Self::Cols => write!(f, "genes"),
        }
    }
}

/// An immutable row or column entity: a cell or a gene.
///
/// Each entity carries a dense integer id, a stable external key (e.g. a
/// cell barcode or gene symbol), and typed metadata attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Dense integer identifier, stable for the lifetime of the store.
    pub id: EntityId,
    /// Stable external string key.
    pub key: String,
    /// Metadata attributes.
    pub attributes: HashMap<String, Value>,
}

impl Entity {
    /// Create an entity with no attributes.
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Check if this entity has an attribute.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}
