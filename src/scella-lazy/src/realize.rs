//! Graph realization.
//!
//! Walks a handle's ancestry back to its source, composes the cumulative
//! row/column narrowing into one resolved scope, extracts exactly the
//! requested window, and applies the recorded transforms in declaration
//! order.

use std::collections::HashSet;
use std::ops::Range;

use log::debug;

use common_error::{ScellaError, ScellaResult};
use scella_core::{Axis, EntityId, RealizedMatrix, Selector};
use scella_query::SubmatrixExtractor;

use crate::fusion::fuse;
use crate::graph::{GraphHandle, LazyGraph, NodeOp};
use crate::transform::TransformOp;

/// Optional positional window over the realized row/column order.
#[derive(Debug, Clone, Default)]
pub struct Window {
    /// Row positions to realize, if restricted.
    pub rows: Option<Range<usize>>,
    /// Column positions to realize, if restricted.
    pub cols: Option<Range<usize>>,
}

impl Window {
    /// The unrestricted window.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a row position range.
    pub fn rows(range: Range<usize>) -> Self {
        Self {
            rows: Some(range),
            cols: None,
        }
    }

    /// Restrict to a column position range.
    pub fn cols(range: Range<usize>) -> Self {
        Self {
            rows: None,
            cols: Some(range),
        }
    }
}

/// The fully composed scope of a handle: resolved identifier order per
/// axis, full-table flags for pushdown, and the pending transforms.
struct Scope {
    row_ids: Vec<EntityId>,
    rows_all: bool,
    col_ids: Vec<EntityId>,
    cols_all: bool,
    transforms: Vec<TransformOp>,
}

/// Realizes graph handles against an extractor.
pub struct Realizer<'a> {
    extractor: &'a SubmatrixExtractor,
    fusion: bool,
}

impl<'a> Realizer<'a> {
    /// Create a realizer. Transform fusion is on by default.
    pub fn new(extractor: &'a SubmatrixExtractor) -> Self {
        Self {
            extractor,
            fusion: true,
        }
    }

    /// Toggle transform fusion. Results are identical either way; the
    /// toggle exists so that can be checked.
    pub fn with_fusion(mut self, enabled: bool) -> Self {
        self.fusion = enabled;
        self
    }

    /// Realize a handle, optionally restricted to a positional window.
    ///
    /// Only the window's rows and columns are requested from storage.
    /// Realizing the same handle and window twice yields identical
    /// matrices.
    pub async fn realize(
        &self,
        graph: &LazyGraph,
        handle: GraphHandle,
        window: &Window,
    ) -> ScellaResult<RealizedMatrix> {
        let mut scope = self.compose(graph, handle).await?;

        if let Some(range) = &window.rows {
            scope.rows_all = scope.rows_all && range.start == 0 && range.end >= scope.row_ids.len();
            scope.row_ids = slice_window(&scope.row_ids, range);
        }
        if let Some(range) = &window.cols {
            scope.cols_all = scope.cols_all && range.start == 0 && range.end >= scope.col_ids.len();
            scope.col_ids = slice_window(&scope.col_ids, range);
        }

        self.extract_and_transform(scope).await
    }

    /// Realize an explicit row subset of a handle's scope, with the
    /// handle's full column scope. Rows must come from
    /// [`Realizer::row_domain`]; order is preserved.
    pub async fn realize_rows(
        &self,
        graph: &LazyGraph,
        handle: GraphHandle,
        rows: &[EntityId],
    ) -> ScellaResult<RealizedMatrix> {
        let mut scope = self.compose(graph, handle).await?;
        scope.row_ids = rows.to_vec();
        scope.rows_all = false;
        self.extract_and_transform(scope).await
    }

    /// The handle's composed row identifier order, without extracting
    /// any values.
    pub async fn row_domain(
        &self,
        graph: &LazyGraph,
        handle: GraphHandle,
    ) -> ScellaResult<Vec<EntityId>> {
        Ok(self.compose(graph, handle).await?.row_ids)
    }

    async fn extract_and_transform(&self, scope: Scope) -> ScellaResult<RealizedMatrix> {
        let mut matrix = self
            .extractor
            .extract_resolved(scope.row_ids, scope.rows_all, scope.col_ids, scope.cols_all)
            .await?;

        if self.fusion {
            for pass in fuse(&scope.transforms) {
                pass.apply(&mut matrix);
            }
        } else {
            for op in &scope.transforms {
                op.apply(&mut matrix);
            }
        }
        Ok(matrix)
    }

    /// Fold the ancestry chain, source first, into a resolved scope.
    /// Selection resolves through the extractor; reindex nodes are pure
    /// permutation bookkeeping and never touch storage.
    async fn compose(&self, graph: &LazyGraph, handle: GraphHandle) -> ScellaResult<Scope> {
        let chain = graph.ancestry(handle)?;

        // ancestry guarantees the chain is rooted at a source.
        let (mut scope, rest) = match &graph.node(chain[0])?.op {
            NodeOp::Source { rows, cols } => {
                let row_ids = self.extractor.resolve(Axis::Rows, rows).await?;
                let col_ids = self.extractor.resolve(Axis::Cols, cols).await?;
                (
                    Scope {
                        row_ids,
                        rows_all: rows.is_all(),
                        col_ids,
                        cols_all: cols.is_all(),
                        transforms: Vec::new(),
                    },
                    &chain[1..],
                )
            }
            op => {
                return Err(ScellaError::internal(format!(
                    "ancestry not rooted at a source: {op}"
                )))
            }
        };

        for h in rest {
            match &graph.node(*h)?.op {
                NodeOp::Source { .. } => {
                    return Err(ScellaError::graph(format!(
                        "source node {} has a predecessor",
                        h.index()
                    )))
                }
                NodeOp::Select { rows, cols } => {
                    if let Some(sel) = rows {
                        let (ids, all) = self.narrow(Axis::Rows, sel, &scope.row_ids).await?;
                        scope.row_ids = ids;
                        scope.rows_all = scope.rows_all && all;
                    }
                    if let Some(sel) = cols {
                        let (ids, all) = self.narrow(Axis::Cols, sel, &scope.col_ids).await?;
                        scope.col_ids = ids;
                        scope.cols_all = scope.cols_all && all;
                    }
                }
                NodeOp::Transform(op) => scope.transforms.push(*op),
                NodeOp::Reindex { rows, cols } => {
                    if let Some(perm) = rows {
                        scope.row_ids = permute(&scope.row_ids, perm, "row")?;
                    }
                    if let Some(perm) = cols {
                        scope.col_ids = permute(&scope.col_ids, perm, "column")?;
                    }
                }
            }
        }

        debug!(
            "composed scope: {} rows (all={}), {} cols (all={}), {} transforms",
            scope.row_ids.len(),
            scope.rows_all,
            scope.col_ids.len(),
            scope.cols_all,
            scope.transforms.len()
        );
        Ok(scope)
    }

    /// Intersect the current scope with a narrowing selector. The result
    /// follows the *newer* selector's order; identifiers it names that
    /// are already out of scope are dropped.
    async fn narrow(
        &self,
        axis: Axis,
        selector: &Selector,
        current: &[EntityId],
    ) -> ScellaResult<(Vec<EntityId>, bool)> {
        if selector.is_all() {
            return Ok((current.to_vec(), true));
        }
        let resolved = self.extractor.resolve(axis, selector).await?;
        let in_scope: HashSet<EntityId> = current.iter().copied().collect();
        let ids = resolved
            .into_iter()
            .filter(|id| in_scope.contains(id))
            .collect();
        Ok((ids, false))
    }
}

fn slice_window(ids: &[EntityId], range: &Range<usize>) -> Vec<EntityId> {
    let start = range.start.min(ids.len());
    let end = range.end.min(ids.len());
    ids[start..end].to_vec()
}

fn permute(ids: &[EntityId], perm: &[usize], axis: &str) -> ScellaResult<Vec<EntityId>> {
    if perm.len() != ids.len() {
        return Err(ScellaError::graph(format!(
            "{axis} permutation has {} positions but the scope has {}",
            perm.len(),
            ids.len()
        )));
    }
    Ok(perm.iter().map(|&pos| ids[pos]).collect())
}
