//! Triplet store trait and in-memory backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use common_error::{param_err, ScellaResult};
use scella_core::{AttrExpr, Axis, Entity, EntityId, SparseEntry, Value};

use crate::predicate::EntryQuery;

/// Read-only contract over the three logical tables: cell entities, gene
/// entities, and the sparse (cell, gene, value) association table.
///
/// Stores must support concurrent readers; no write path exists from this
/// core's perspective.
#[async_trait]
pub trait TripletStore: Send + Sync {
    /// All identifiers on an axis, ascending.
    async fn all_ids(&self, axis: Axis) -> ScellaResult<Vec<EntityId>>;

    /// Resolve an attribute predicate against entity metadata only (no
    /// association-table access). Returns matching identifiers ascending.
    ///
    /// Referencing an unknown attribute is a `SelectorResolution` error.
    async fn resolve_attr(&self, axis: Axis, expr: &AttrExpr) -> ScellaResult<Vec<EntityId>>;

    /// Query association entries matching both axis constraints.
    async fn query_entries(&self, query: &EntryQuery) -> ScellaResult<Vec<SparseEntry>>;
}

/// In-memory triplet store for tests and small datasets.
///
/// Entries are kept sorted by (row, col) for scan locality, mirroring the
/// physical layout of the columnar format.
pub struct MemoryStore {
    cells: Vec<Entity>,
    genes: Vec<Entity>,
    entries: Vec<SparseEntry>,
    cell_attrs: HashSet<String>,
    gene_attrs: HashSet<String>,
}

impl MemoryStore {
    /// Build a store. Rejects duplicate (row, col) pairs and duplicate
    /// entity identifiers.
    pub fn new(
        cells: Vec<Entity>,
        genes: Vec<Entity>,
        mut entries: Vec<SparseEntry>,
    ) -> ScellaResult<Self> {
        let mut seen = HashSet::new();
        for cell in &cells {
            if !seen.insert(cell.id) {
                param_err!("duplicate cell id {}", cell.id);
            }
        }
        seen.clear();
        for gene in &genes {
            if !seen.insert(gene.id) {
                param_err!("duplicate gene id {}", gene.id);
            }
        }

        entries.sort_by_key(|e| (e.row_id, e.col_id));
        for pair in entries.windows(2) {
            if pair[0].row_id == pair[1].row_id && pair[0].col_id == pair[1].col_id {
                param_err!(
                    "duplicate entry at (row {}, col {})",
                    pair[0].row_id,
                    pair[0].col_id
                );
            }
        }

        let cell_attrs = collect_attr_names(&cells);
        let gene_attrs = collect_attr_names(&genes);

        Ok(Self {
            cells,
            genes,
            entries,
            cell_attrs,
            gene_attrs,
        })
    }

    /// Convenience constructor: `n_rows x n_cols` matrix populated from
    /// (row, col, value) triples, entities named `cell_{i}` / `gene_{j}`.
    pub fn from_triples(
        n_rows: usize,
        n_cols: usize,
        triples: Vec<(EntityId, EntityId, f64)>,
    ) -> ScellaResult<Self> {
        let cells = (0..n_rows as EntityId)
            .map(|i| Entity::new(i, format!("cell_{i}")))
            .collect();
        let genes = (0..n_cols as EntityId)
            .map(|j| Entity::new(j, format!("gene_{j}")))
            .collect();
        let entries = triples
            .into_iter()
            .map(|(r, c, v)| SparseEntry::new(r, c, v))
            .collect();
        Self::new(cells, genes, entries)
    }

    fn axis_entities(&self, axis: Axis) -> &[Entity] {
        match axis {
            Axis::Rows => &self.cells,
            Axis::Cols => &self.genes,
        }
    }

    fn axis_attrs(&self, axis: Axis) -> &HashSet<String> {
        match axis {
            Axis::Rows => &self.cell_attrs,
            Axis::Cols => &self.gene_attrs,
        }
    }

    /// Entity metadata lookup by id.
    pub fn entity(&self, axis: Axis, id: EntityId) -> Option<&Entity> {
        self.axis_entities(axis).iter().find(|e| e.id == id)
    }

    /// Entity lookup by external key.
    pub fn entity_by_key(&self, axis: Axis, key: &str) -> Option<&Entity> {
        self.axis_entities(axis).iter().find(|e| e.key == key)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

fn collect_attr_names(entities: &[Entity]) -> HashSet<String> {
    let mut names = HashSet::new();
    for entity in entities {
        for name in entity.attributes.keys() {
            names.insert(name.clone());
        }
    }
    names
}

#[async_trait]
impl TripletStore for MemoryStore {
    async fn all_ids(&self, axis: Axis) -> ScellaResult<Vec<EntityId>> {
        let mut ids: Vec<EntityId> = self.axis_entities(axis).iter().map(|e| e.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn resolve_attr(&self, axis: Axis, expr: &AttrExpr) -> ScellaResult<Vec<EntityId>> {
        let known = self.axis_attrs(axis);
        let known_fn = |name: &str| known.contains(name);

        let mut ids = Vec::new();
        for entity in self.axis_entities(axis) {
            if expr.evaluate(entity, &known_fn)? == Value::Bool(true) {
                ids.push(entity.id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn query_entries(&self, query: &EntryQuery) -> ScellaResult<Vec<SparseEntry>> {
        // Position maps keep membership checks cheap for large
        // enumerated constraints.
        let row_set: Option<HashSet<EntityId>> = constraint_set(&query.rows);
        let col_set: Option<HashSet<EntityId>> = constraint_set(&query.cols);

        Ok(self
            .entries
            .iter()
            .filter(|e| {
                let row_ok = match &row_set {
                    Some(set) => set.contains(&e.row_id),
                    None => query.rows.contains(e.row_id),
                };
                let col_ok = match &col_set {
                    Some(set) => set.contains(&e.col_id),
                    None => query.cols.contains(e.col_id),
                };
                row_ok && col_ok
            })
            .copied()
            .collect())
    }
}

fn constraint_set(constraint: &crate::predicate::AxisConstraint) -> Option<HashSet<EntityId>> {
    use crate::predicate::{AxisConstraint, PredicateFragment};
    match constraint {
        AxisConstraint::All => None,
        AxisConstraint::Fragments(frags) => {
            // Only worth materializing when everything is enumerated.
            let mut set = HashSet::new();
            for frag in frags {
                match frag {
                    PredicateFragment::Enumerated(ids) => set.extend(ids.iter().copied()),
                    PredicateFragment::Range { .. } => return None,
                }
            }
            Some(set)
        }
    }
}

/// Attribute value lookup across a whole axis, used by stores layered on
/// top of `MemoryStore` in tests.
pub fn attr_map(entities: &[Entity], name: &str) -> HashMap<EntityId, Value> {
    entities
        .iter()
        .filter_map(|e| e.attr(name).map(|v| (e.id, v.clone())))
        .collect()
}
