//! Tokenized batch structure produced by the streaming loader.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// A fixed-shape tokenized batch ready for model input.
///
/// Every row holds exactly `max_tokens` token ids and mask values.
/// Ownership transfers to the consumer on receipt; the producer never
/// touches a batch after sending it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedBatch {
    /// Token ids, one fixed-length sequence per row.
    pub input_ids: Vec<Vec<u32>>,
    /// Attention mask (1 = real token, 0 = padding), aligned with
    /// `input_ids`.
    pub attention_mask: Vec<Vec<u8>>,
    /// Row (cell) identifiers for the rows in this batch, in batch order.
    pub row_ids: Vec<EntityId>,
    /// Fixed per-row token budget.
    pub max_tokens: usize,
}

impl TokenizedBatch {
    /// Create an empty batch with the given token budget.
    pub fn with_capacity(rows: usize, max_tokens: usize) -> Self {
        Self {
            input_ids: Vec::with_capacity(rows),
            attention_mask: Vec::with_capacity(rows),
            row_ids: Vec::with_capacity(rows),
            max_tokens,
        }
    }

    /// Append one tokenized row. `ids` and `mask` must already be padded
    /// to the batch's token budget.
    pub fn push_row(&mut self, row_id: EntityId, ids: Vec<u32>, mask: Vec<u8>) {
        debug_assert_eq!(ids.len(), self.max_tokens);
        debug_assert_eq!(mask.len(), self.max_tokens);
        self.input_ids.push(ids);
        self.attention_mask.push(mask);
        self.row_ids.push(row_id);
    }

    /// Number of rows in the batch.
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Whether the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}
