//! Configuration management for scella.
//!
//! Provides runtime configuration for query planning, extraction, and the
//! streaming batch loader.

use serde::{Deserialize, Serialize};

/// Global scella configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScellaConfig {
    /// Query planning and extraction configuration.
    #[serde(default)]
    pub query: QueryConfig,
    /// Streaming batch loader configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Query planning and extraction configuration.
///
/// These knobs bound how identifier sets are translated into predicate
/// fragments and how fragments are batched into storage queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of identifiers in a single enumerated (`IN`-style)
    /// predicate fragment. Larger sets are split into multiple fragments.
    pub max_in_clause_size: usize,
    /// Minimum run length (exclusive) of consecutive identifiers before a
    /// run is expressed as a range predicate instead of an enumeration.
    pub contiguity_threshold: usize,
    /// Upper bound on the total predicate cost (enumerated ids plus
    /// ranges) handed to the query engine in one sub-query. Scattered
    /// identifier sets exceeding this are split into sequential
    /// sub-queries whose results are unioned.
    pub max_predicates_per_query: usize,
    /// Number of retry attempts for transient storage failures.
    pub retry_attempts: usize,
    /// Initial backoff between retries, in milliseconds. Doubles per
    /// attempt.
    pub retry_backoff_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_in_clause_size: 1000,
            contiguity_threshold: 10,
            max_predicates_per_query: 5000,
            retry_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl QueryConfig {
    /// Set the enumerated-fragment cap.
    pub fn with_max_in_clause_size(mut self, size: usize) -> Self {
        self.max_in_clause_size = size;
        self
    }

    /// Set the contiguity threshold.
    pub fn with_contiguity_threshold(mut self, threshold: usize) -> Self {
        self.contiguity_threshold = threshold;
        self
    }

    /// Set the per-query predicate budget.
    pub fn with_max_predicates_per_query(mut self, max: usize) -> Self {
        self.max_predicates_per_query = max;
        self
    }

    /// Set the retry policy.
    pub fn with_retries(mut self, attempts: usize, backoff_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff_ms = backoff_ms;
        self
    }
}

/// Shard assignment for distributed consumers.
///
/// The row domain is partitioned by `row_id % count == index`, so shards
/// are disjoint and cover the domain with no gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// This consumer's shard index, in `0..count`.
    pub index: usize,
    /// Total number of shards.
    pub count: usize,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self { index: 0, count: 1 }
    }
}

impl ShardConfig {
    /// Create a shard assignment.
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    /// Whether this is the trivial single-shard assignment.
    pub fn is_single(&self) -> bool {
        self.count <= 1
    }
}

/// Policy for handling a per-row tokenizer failure.
///
/// This is an explicit configuration choice, never a silent default: the
/// loader either drops the failing row and continues, or fails the whole
/// batch containing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TokenizeErrorPolicy {
    /// Drop the failing row, log it, and continue with the batch.
    SkipRow,
    /// Surface the error for the batch containing the failing row.
    #[default]
    AbortBatch,
}

/// Streaming batch loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Rows per emitted batch.
    pub batch_size: usize,
    /// Fixed token budget per row; tokenized rows are truncated or padded
    /// to exactly this length.
    pub max_tokens: usize,
    /// Number of windows prefetched ahead of consumption. Also the worker
    /// count and the capacity of the delivery queue.
    pub prefetch_depth: usize,
    /// Shard assignment for distributed consumers.
    #[serde(default)]
    pub shard: ShardConfig,
    /// What to do when the tokenizer fails for a row.
    #[serde(default)]
    pub on_tokenize_error: TokenizeErrorPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_tokens: 2048,
            prefetch_depth: 4,
            shard: ShardConfig::default(),
            on_tokenize_error: TokenizeErrorPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the per-row token budget.
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the prefetch depth.
    pub fn with_prefetch_depth(mut self, depth: usize) -> Self {
        self.prefetch_depth = depth;
        self
    }

    /// Set the shard assignment.
    pub fn with_shard(mut self, shard: ShardConfig) -> Self {
        self.shard = shard;
        self
    }

    /// Set the tokenizer error policy.
    pub fn with_tokenize_error_policy(mut self, policy: TokenizeErrorPolicy) -> Self {
        self.on_tokenize_error = policy;
        self
    }
}
