//! Streaming tokenized batch producer for scella.
//!
//! Turns a (possibly filtered, possibly sharded) row domain into a
//! finite, restartable sequence of fixed-shape [`TokenizedBatch`] values
//! (`scella_core::TokenizedBatch`), prefetched by a bounded pool of
//! worker tasks and delivered strictly in window order.

pub mod producer;
pub mod tokenize;
pub mod window;

pub use scella_core::TokenizedBatch;

// Re-export commonly used types
pub use producer::{BatchProducer, RowSource};
pub use tokenize::{GeneRankTokenizer, SparseRow, Tokenizer};
pub use window::{shard_rows, split_windows};
