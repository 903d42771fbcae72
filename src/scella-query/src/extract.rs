//! Submatrix extraction.
//!
//! The extractor turns selector pairs into realized sparse submatrices:
//! it resolves selectors to identifier sets, plans predicate fragments,
//! batches them under the per-query predicate budget, runs the batched
//! queries with bounded retry, and reassembles the results in the
//! caller's original order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use common_config::QueryConfig;
use common_error::{param_err, ScellaError, ScellaResult};
use scella_core::{Axis, EntityId, MatrixEntry, RealizedMatrix, Selector, SparseEntry};

use crate::planner::RangePlanner;
use crate::predicate::{AxisConstraint, EntryQuery, PredicateFragment};
use crate::store::TripletStore;

/// Extracts caller-ordered sparse submatrices from a triplet store.
pub struct SubmatrixExtractor {
    store: Arc<dyn TripletStore>,
    config: QueryConfig,
}

impl SubmatrixExtractor {
    /// Create an extractor with default configuration.
    pub fn new(store: Arc<dyn TripletStore>) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    /// Create an extractor with explicit configuration.
    pub fn with_config(store: Arc<dyn TripletStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Resolve a selector to a concrete identifier list.
    ///
    /// `ByIds` keeps the caller's order (first occurrence wins on
    /// duplicates); `All` and `ByAttr` come back in ascending identifier
    /// order. An empty result is valid.
    pub async fn resolve(&self, axis: Axis, selector: &Selector) -> ScellaResult<Vec<EntityId>> {
        match selector {
            Selector::All => self.store.all_ids(axis).await,
            Selector::ByIds(ids) => Ok(dedup_preserving_order(ids.clone())),
            Selector::ByAttr(expr) => self.store.resolve_attr(axis, expr).await,
        }
    }

    /// Extract the submatrix selected by a row selector and a column
    /// selector.
    ///
    /// The realized matrix's row and column order matches the selectors'
    /// order exactly. A selection matching nothing yields an empty matrix,
    /// not an error.
    pub async fn extract(&self, rows: &Selector, cols: &Selector) -> ScellaResult<RealizedMatrix> {
        let row_ids = self.resolve(Axis::Rows, rows).await?;
        let col_ids = self.resolve(Axis::Cols, cols).await?;
        self.extract_resolved(row_ids, rows.is_all(), col_ids, cols.is_all())
            .await
    }

    /// Extract over explicit identifier lists, preserving their order.
    pub async fn extract_ids(
        &self,
        rows: &[EntityId],
        cols: &[EntityId],
    ) -> ScellaResult<RealizedMatrix> {
        let row_ids = self
            .resolve(Axis::Rows, &Selector::by_ids(rows.to_vec()))
            .await?;
        let col_ids = self
            .resolve(Axis::Cols, &Selector::by_ids(cols.to_vec()))
            .await?;
        self.extract_resolved(row_ids, false, col_ids, false).await
    }

    /// Extract over already-resolved identifier lists. The `*_all` flags
    /// mark an axis as covering the full table, which lets the predicate
    /// on that axis be omitted entirely. Duplicate identifiers collapse
    /// to their first occurrence, matching selector resolution.
    pub async fn extract_resolved(
        &self,
        row_ids: Vec<EntityId>,
        rows_all: bool,
        col_ids: Vec<EntityId>,
        cols_all: bool,
    ) -> ScellaResult<RealizedMatrix> {
        if self.config.max_predicates_per_query == 0 {
            param_err!("max_predicates_per_query must be at least 1");
        }
        let row_ids = dedup_preserving_order(row_ids);
        let col_ids = dedup_preserving_order(col_ids);
        if row_ids.is_empty() || col_ids.is_empty() {
            return Ok(RealizedMatrix::empty(row_ids, col_ids));
        }

        let row_chunks = self.axis_chunks(&row_ids, rows_all)?;
        let col_chunks = self.axis_chunks(&col_ids, cols_all)?;
        debug!(
            "extracting {}x{} submatrix in {} queries",
            row_ids.len(),
            col_ids.len(),
            row_chunks.len() * col_chunks.len()
        );

        let row_pos: HashMap<EntityId, usize> =
            row_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let col_pos: HashMap<EntityId, usize> =
            col_ids.iter().enumerate().map(|(j, id)| (*id, j)).collect();

        let mut entries = Vec::new();
        for row_chunk in &row_chunks {
            for col_chunk in &col_chunks {
                let query = EntryQuery::new(row_chunk.clone(), col_chunk.clone());
                let found = self.query_with_retry(&query).await?;
                for entry in found {
                    // Entries outside the requested sets can come back
                    // when an axis is unconstrained; only keep what was
                    // asked for.
                    if let (Some(&row), Some(&col)) =
                        (row_pos.get(&entry.row_id), col_pos.get(&entry.col_id))
                    {
                        entries.push(MatrixEntry {
                            row,
                            col,
                            value: entry.value,
                        });
                    }
                }
            }
        }

        Ok(RealizedMatrix::new(row_ids, col_ids, entries))
    }

    /// Plan an axis into constraint chunks, each within the predicate
    /// budget. An unconstrained axis is a single `All` chunk.
    fn axis_chunks(&self, ids: &[EntityId], all: bool) -> ScellaResult<Vec<AxisConstraint>> {
        if all {
            return Ok(vec![AxisConstraint::All]);
        }
        let planner = RangePlanner::from_config(&self.config);
        let fragments = planner.plan(ids)?;
        Ok(chunk_fragments(
            fragments,
            self.config.max_predicates_per_query,
        ))
    }

    /// Run one query, retrying transient failures with exponential
    /// backoff. Non-retryable errors surface immediately.
    async fn query_with_retry(&self, query: &EntryQuery) -> ScellaResult<Vec<SparseEntry>> {
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.store.query_entries(query).await {
                Ok(entries) => return Ok(entries),
                Err(err) if err.is_retryable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    warn!(
                        "query failed (attempt {attempt}/{}), retrying in {:?}: {err}",
                        self.config.retry_attempts, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(ScellaError::StorageQuery { fragment, message }) => {
                    // Keep the original fragment context if the store
                    // attached one.
                    return Err(ScellaError::StorageQuery { fragment, message });
                }
                Err(err) if err.is_retryable() => {
                    return Err(ScellaError::storage(query.describe(), err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn dedup_preserving_order(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Greedily pack fragments into chunks whose total predicate cost stays
/// within `budget`. A single fragment over budget gets its own chunk
/// (the planner's IN-clause cap bounds how large that can be).
fn chunk_fragments(fragments: Vec<PredicateFragment>, budget: usize) -> Vec<AxisConstraint> {
    let mut chunks = Vec::new();
    let mut current: Vec<PredicateFragment> = Vec::new();
    let mut current_cost = 0;

    for fragment in fragments {
        let cost = fragment.cost();
        if !current.is_empty() && current_cost + cost > budget {
            chunks.push(AxisConstraint::Fragments(std::mem::take(&mut current)));
            current_cost = 0;
        }
        current_cost += cost;
        current.push(fragment);
    }
    if !current.is_empty() {
        chunks.push(AxisConstraint::Fragments(current));
    }
    chunks
}
