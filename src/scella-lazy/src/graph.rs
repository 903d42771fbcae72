//! The computation graph arena.
//!
//! Nodes are immutable, appended once, and referenced by index through
//! [`GraphHandle`] rather than by direct links, so the whole graph is
//! freely shareable across threads and serializable as a value.

use serde::{Deserialize, Serialize};

use common_error::{ScellaError, ScellaResult};
use scella_core::Selector;

use crate::transform::TransformOp;

/// Opaque reference to one node in a [`LazyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphHandle(pub(crate) usize);

impl GraphHandle {
    /// Arena index of the referenced node.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeOp {
    /// Root of a chain: the initial row/column scope over the store.
    Source {
        /// Row selector.
        rows: Selector,
        /// Column selector.
        cols: Selector,
    },
    /// Narrow the row and/or column scope. `None` leaves an axis as-is.
    /// The effective scope is the intersection with the predecessor's,
    /// ordered by this node's selector.
    Select {
        /// Row narrowing, if any.
        rows: Option<Selector>,
        /// Column narrowing, if any.
        cols: Option<Selector>,
    },
    /// Elementwise transform of stored values.
    Transform(TransformOp),
    /// Positional permutation of the row and/or column order. Pure
    /// bookkeeping: never adds, removes, or queries anything.
    Reindex {
        /// Row permutation over current row positions, if any.
        rows: Option<Vec<usize>>,
        /// Column permutation over current column positions, if any.
        cols: Option<Vec<usize>>,
    },
}

impl std::fmt::Display for NodeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn sel(s: &Selector) -> String {
            match s {
                Selector::All => "*".to_string(),
                Selector::ByIds(ids) => format!("[{} ids]", ids.len()),
                Selector::ByAttr(expr) => expr.to_string(),
            }
        }
        fn opt_sel(s: &Option<Selector>) -> String {
            s.as_ref().map_or_else(|| "-".to_string(), sel)
        }
        match self {
            Self::Source { rows, cols } => {
                write!(f, "Source: rows={}, cols={}", sel(rows), sel(cols))
            }
            Self::Select { rows, cols } => {
                write!(f, "Select: rows={}, cols={}", opt_sel(rows), opt_sel(cols))
            }
            Self::Transform(op) => write!(f, "Transform: {op}"),
            Self::Reindex { rows, cols } => write!(
                f,
                "Reindex: rows={}, cols={}",
                rows.as_ref().map_or_else(|| "-".to_string(), |p| format!("[{} positions]", p.len())),
                cols.as_ref().map_or_else(|| "-".to_string(), |p| format!("[{} positions]", p.len())),
            ),
        }
    }
}

/// One node: an operation plus its predecessor, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// The recorded operation.
    pub op: NodeOp,
    /// Predecessor node; `None` only for `Source`.
    pub input: Option<GraphHandle>,
}

/// Arena of recorded operations. Declaring is pure and performs no I/O;
/// nodes are never removed or mutated once appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LazyGraph {
    nodes: Vec<GraphNode>,
}

impl LazyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes have been declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declare a source scope. The root of every chain.
    pub fn source(&mut self, rows: Selector, cols: Selector) -> GraphHandle {
        self.push(NodeOp::Source { rows, cols }, None)
    }

    /// Declare a narrowing selection under `input`.
    pub fn select(
        &mut self,
        input: GraphHandle,
        rows: Option<Selector>,
        cols: Option<Selector>,
    ) -> ScellaResult<GraphHandle> {
        self.check_handle(input)?;
        if rows.is_none() && cols.is_none() {
            return Err(ScellaError::graph(
                "select must narrow at least one axis".to_string(),
            ));
        }
        Ok(self.push(NodeOp::Select { rows, cols }, Some(input)))
    }

    /// Declare an elementwise transform under `input`.
    pub fn transform(&mut self, input: GraphHandle, op: TransformOp) -> ScellaResult<GraphHandle> {
        self.check_handle(input)?;
        Ok(self.push(NodeOp::Transform(op), Some(input)))
    }

    /// Declare a positional reorder under `input`. Each permutation must
    /// contain every position `0..len` exactly once.
    pub fn reindex(
        &mut self,
        input: GraphHandle,
        rows: Option<Vec<usize>>,
        cols: Option<Vec<usize>>,
    ) -> ScellaResult<GraphHandle> {
        self.check_handle(input)?;
        if rows.is_none() && cols.is_none() {
            return Err(ScellaError::graph(
                "reindex must reorder at least one axis".to_string(),
            ));
        }
        if let Some(perm) = &rows {
            check_permutation(perm, "row")?;
        }
        if let Some(perm) = &cols {
            check_permutation(perm, "column")?;
        }
        Ok(self.push(NodeOp::Reindex { rows, cols }, Some(input)))
    }

    /// Look up a node.
    pub fn node(&self, handle: GraphHandle) -> ScellaResult<&GraphNode> {
        self.nodes
            .get(handle.0)
            .ok_or_else(|| ScellaError::graph(format!("no node at index {}", handle.0)))
    }

    /// The chain from the source down to `handle`, source first.
    pub fn ancestry(&self, handle: GraphHandle) -> ScellaResult<Vec<GraphHandle>> {
        let mut chain = Vec::new();
        let mut cursor = Some(handle);
        while let Some(h) = cursor {
            chain.push(h);
            cursor = self.node(h)?.input;
        }
        chain.reverse();
        match self.node(chain[0])?.op {
            NodeOp::Source { .. } => Ok(chain),
            _ => Err(ScellaError::graph(format!(
                "chain of node {} is not rooted at a source",
                handle.0
            ))),
        }
    }

    /// Render the ancestry of a handle as an indented tree, requested
    /// node first.
    pub fn explain(&self, handle: GraphHandle) -> ScellaResult<String> {
        let chain = self.ancestry(handle)?;
        let mut out = String::new();
        for (depth, h) in chain.iter().rev().enumerate() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&self.node(*h)?.op.to_string());
            out.push('\n');
        }
        Ok(out)
    }

    fn push(&mut self, op: NodeOp, input: Option<GraphHandle>) -> GraphHandle {
        self.nodes.push(GraphNode { op, input });
        GraphHandle(self.nodes.len() - 1)
    }

    fn check_handle(&self, handle: GraphHandle) -> ScellaResult<()> {
        if handle.0 >= self.nodes.len() {
            return Err(ScellaError::graph(format!(
                "handle {} does not reference a declared node",
                handle.0
            )));
        }
        Ok(())
    }
}

fn check_permutation(perm: &[usize], axis: &str) -> ScellaResult<()> {
    let mut seen = vec![false; perm.len()];
    for &pos in perm {
        if pos >= perm.len() || seen[pos] {
            return Err(ScellaError::graph(format!(
                "{axis} permutation is not a bijection over 0..{}",
                perm.len()
            )));
        }
        seen[pos] = true;
    }
    Ok(())
}
