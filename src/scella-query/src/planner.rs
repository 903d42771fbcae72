//! Identifier range planning.
//!
//! Translates arbitrary identifier sets into range and enumerated
//! predicate fragments. The decision policy is purely a function of
//! (sortedness, run length, cap): identical inputs always produce
//! identical plans.

use common_error::{param_err, ScellaResult};
use common_config::QueryConfig;
use log::debug;
use scella_core::EntityId;

use crate::predicate::PredicateFragment;

/// Plans predicate fragments for identifier sets.
///
/// A maximal run of consecutive identifiers strictly longer than the
/// contiguity threshold collapses into a single `Range` fragment,
/// independent of its length. Shorter runs are enumerated; enumerated
/// fragments never span a gap and are split at the `IN`-clause cap.
#[derive(Debug, Clone)]
pub struct RangePlanner {
    max_in_clause_size: usize,
    contiguity_threshold: usize,
}

impl RangePlanner {
    /// Create a planner from explicit knobs.
    pub fn new(max_in_clause_size: usize, contiguity_threshold: usize) -> Self {
        Self {
            max_in_clause_size,
            contiguity_threshold,
        }
    }

    /// Create a planner from configuration.
    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.max_in_clause_size, config.contiguity_threshold)
    }

    /// Plan predicate fragments for an identifier set.
    ///
    /// The input order does not affect the plan: ids are sorted and
    /// deduplicated first (result ordering is the extractor's concern,
    /// not the planner's). Fragments come out in ascending identifier
    /// order.
    pub fn plan(&self, ids: &[EntityId]) -> ScellaResult<Vec<PredicateFragment>> {
        if self.max_in_clause_size == 0 {
            param_err!("max_in_clause_size must be at least 1");
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sorted: Vec<EntityId> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut fragments = Vec::new();
        let mut run_start = 0;
        for i in 1..=sorted.len() {
            let run_ended = i == sorted.len() || sorted[i] != sorted[i - 1] + 1;
            if !run_ended {
                continue;
            }
            let run = &sorted[run_start..i];
            if run.len() > self.contiguity_threshold {
                fragments.push(PredicateFragment::Range {
                    low: run[0],
                    high: run[run.len() - 1],
                });
            } else {
                for chunk in run.chunks(self.max_in_clause_size) {
                    fragments.push(PredicateFragment::Enumerated(chunk.to_vec()));
                }
            }
            run_start = i;
        }

        debug!(
            "planned {} fragments for {} ids (threshold={}, cap={})",
            fragments.len(),
            sorted.len(),
            self.contiguity_threshold,
            self.max_in_clause_size
        );
        Ok(fragments)
    }
}
