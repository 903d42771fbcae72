//! Row tokenization.
//!
//! The tokenizer contract is supplied per model family; the gene-rank
//! tokenizer here covers the common rank-value encoding used for
//! expression data.

use common_error::{ScellaError, ScellaResult};
use scella_core::EntityId;

/// One row's nonzeros, handed to the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    /// Row (cell) identifier.
    pub row_id: EntityId,
    /// Gene identifiers with a stored value, aligned with `values`.
    pub genes: Vec<EntityId>,
    /// Stored values, aligned with `genes`.
    pub values: Vec<f64>,
}

/// Converts one sparse row into a fixed-length token sequence.
///
/// Implementations return exactly `max_tokens` ids and mask entries
/// (1 = real token, 0 = padding). A failure carries the row identifier
/// so the loader can apply its skip-or-abort policy.
pub trait Tokenizer: Send + Sync {
    /// Tokenize one row into `(ids, mask)` of length `max_tokens`.
    fn tokenize(&self, row: &SparseRow, max_tokens: usize) -> ScellaResult<(Vec<u32>, Vec<u8>)>;
}

/// Rank-value tokenizer: genes ordered by descending value (ties broken
/// by ascending gene id), encoded as `gene_id + 2` after a leading CLS
/// token, truncated or padded to the token budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneRankTokenizer;

impl GeneRankTokenizer {
    /// Padding token id.
    pub const PAD: u32 = 0;
    /// Sequence-start token id.
    pub const CLS: u32 = 1;
    /// Offset applied to gene identifiers.
    pub const GENE_OFFSET: u64 = 2;
}

impl Tokenizer for GeneRankTokenizer {
    fn tokenize(&self, row: &SparseRow, max_tokens: usize) -> ScellaResult<(Vec<u32>, Vec<u8>)> {
        if max_tokens == 0 {
            return Err(ScellaError::tokenization(
                row.row_id,
                "token budget must be at least 1",
            ));
        }

        let mut ranked: Vec<(EntityId, f64)> = row
            .genes
            .iter()
            .copied()
            .zip(row.values.iter().copied())
            .collect();
        ranked.sort_by(|(gene_a, val_a), (gene_b, val_b)| {
            val_b
                .partial_cmp(val_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(gene_a.cmp(gene_b))
        });

        let mut ids = Vec::with_capacity(max_tokens);
        ids.push(Self::CLS);
        for (gene, _) in ranked {
            if ids.len() == max_tokens {
                break;
            }
            let token = gene.checked_add(Self::GENE_OFFSET).and_then(|t| u32::try_from(t).ok());
            match token {
                Some(token) => ids.push(token),
                None => {
                    return Err(ScellaError::tokenization(
                        row.row_id,
                        format!("gene id {gene} exceeds the token id space"),
                    ))
                }
            }
        }

        let mut mask = vec![1u8; ids.len()];
        ids.resize(max_tokens, Self::PAD);
        mask.resize(max_tokens, 0);
        Ok((ids, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(genes: Vec<EntityId>, values: Vec<f64>) -> SparseRow {
        SparseRow {
            row_id: 42,
            genes,
            values,
        }
    }

    #[test]
    fn test_rank_ordering_with_ties() {
        let t = GeneRankTokenizer;
        // Gene 5 has the highest value; genes 1 and 9 tie, lower id first.
        let (ids, mask) = t
            .tokenize(&row(vec![9, 5, 1], vec![2.0, 7.0, 2.0]), 6)
            .unwrap();
        assert_eq!(ids, vec![1, 7, 3, 11, 0, 0]);
        assert_eq!(mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_truncation() {
        let t = GeneRankTokenizer;
        let (ids, mask) = t
            .tokenize(&row(vec![0, 1, 2, 3], vec![4.0, 3.0, 2.0, 1.0]), 3)
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(mask, vec![1, 1, 1]);
    }

    #[test]
    fn test_empty_row_is_cls_plus_padding() {
        let t = GeneRankTokenizer;
        let (ids, mask) = t.tokenize(&row(vec![], vec![]), 4).unwrap();
        assert_eq!(ids, vec![1, 0, 0, 0]);
        assert_eq!(mask, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_gene_id_fails_with_row_context() {
        let t = GeneRankTokenizer;
        let err = t
            .tokenize(&row(vec![u64::from(u32::MAX)], vec![1.0]), 4)
            .unwrap_err();
        assert!(matches!(err, ScellaError::Tokenization { row: 42, .. }));
    }
}
