//! Sparse matrix representations.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// One stored association: a (cell, gene, value) triple as held by the
/// triplet store. No duplicate (row, col) pairs exist in a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparseEntry {
    /// Row (cell) identifier.
    pub row_id: EntityId,
    /// Column (gene) identifier.
    pub col_id: EntityId,
    /// Stored value.
    pub value: f64,
}

impl SparseEntry {
    /// Create a new entry.
    pub fn new(row_id: EntityId, col_id: EntityId, value: f64) -> Self {
        Self {
            row_id,
            col_id,
            value,
        }
    }
}

/// One nonzero inside a realized matrix, addressed by *position* within
/// the realized row/column order rather than by global identifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Row position in `RealizedMatrix::row_ids`.
    pub row: usize,
    /// Column position in `RealizedMatrix::col_ids`.
    pub col: usize,
    /// Value.
    pub value: f64,
}

/// A materialized submatrix, scoped to exactly the rows and columns that
/// were requested, in the order they were requested.
///
/// This is the only type in the system that owns numeric data. It is
/// created by a realization call, exclusively owned by the caller, and
/// never mutated after it is handed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedMatrix {
    /// Row identifiers, in caller-requested order.
    pub row_ids: Vec<EntityId>,
    /// Column identifiers, in caller-requested order.
    pub col_ids: Vec<EntityId>,
    /// Nonzero entries, sorted row-major over positions.
    entries: Vec<MatrixEntry>,
}

impl RealizedMatrix {
    /// Build a matrix from positional entries. Entries are sorted
    /// row-major; positions must be in range.
    pub fn new(
        row_ids: Vec<EntityId>,
        col_ids: Vec<EntityId>,
        mut entries: Vec<MatrixEntry>,
    ) -> Self {
        entries.sort_by(|a, b| (a.row, a.col).cmp(&(b.row, b.col)));
        Self {
            row_ids,
            col_ids,
            entries,
        }
    }

    /// An empty matrix over the given axes (a valid empty selection
    /// result, not an error).
    pub fn empty(row_ids: Vec<EntityId>, col_ids: Vec<EntityId>) -> Self {
        Self {
            row_ids,
            col_ids,
            entries: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.col_ids.len()
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stored entries, row-major.
    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    /// Iterate the nonzeros of one row as (column position, value) pairs.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.entries.partition_point(|e| e.row < row);
        self.entries[start..]
            .iter()
            .take_while(move |e| e.row == row)
            .map(|e| (e.col, e.value))
    }

    /// Sum of stored values per row.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_rows()];
        for e in &self.entries {
            sums[e.row] += e.value;
        }
        sums
    }

    /// Apply a function to every stored value in place.
    pub fn map_values<F: Fn(f64) -> f64>(&mut self, f: F) {
        for e in &mut self.entries {
            e.value = f(e.value);
        }
    }

    /// Scale each row's stored values by a per-row factor.
    pub fn scale_rows(&mut self, factors: &[f64]) {
        for e in &mut self.entries {
            e.value *= factors[e.row];
        }
    }

    /// Densify into a flat row-major buffer of `n_rows * n_cols` values.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_rows() * self.n_cols()];
        let width = self.n_cols();
        for e in &self.entries {
            dense[e.row * width + e.col] = e.value;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RealizedMatrix {
        RealizedMatrix::new(
            vec![7, 2, 9],
            vec![0, 1],
            vec![
                MatrixEntry {
                    row: 1,
                    col: 0,
                    value: 2.0,
                },
                MatrixEntry {
                    row: 0,
                    col: 1,
                    value: 5.0,
                },
                MatrixEntry {
                    row: 2,
                    col: 0,
                    value: 1.0,
                },
            ],
        )
    }

    #[test]
    fn test_entries_sorted_row_major() {
        let m = sample();
        let order: Vec<(usize, usize)> = m.entries().iter().map(|e| (e.row, e.col)).collect();
        assert_eq!(order, vec![(0, 1), (1, 0), (2, 0)]);
    }

    #[test]
    fn test_row_iteration() {
        let m = sample();
        assert_eq!(m.row(0).collect::<Vec<_>>(), vec![(1, 5.0)]);
        assert_eq!(m.row(1).collect::<Vec<_>>(), vec![(0, 2.0)]);
    }

    #[test]
    fn test_to_dense() {
        let m = sample();
        assert_eq!(m.to_dense(), vec![0.0, 5.0, 2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_row_sums_and_scaling() {
        let mut m = sample();
        assert_eq!(m.row_sums(), vec![5.0, 2.0, 1.0]);
        m.scale_rows(&[2.0, 0.5, 1.0]);
        assert_eq!(m.row_sums(), vec![10.0, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_is_valid() {
        let m = RealizedMatrix::empty(vec![1, 2], vec![3]);
        assert!(m.is_empty());
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.to_dense(), vec![0.0, 0.0]);
    }
}
