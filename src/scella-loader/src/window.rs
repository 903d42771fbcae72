//! Row domain sharding and window splitting.

use common_config::ShardConfig;
use common_error::{param_err, ScellaResult};
use scella_core::EntityId;

/// Restrict a row domain to one shard.
///
/// Shards partition by `row_id % count == index`, so for any count the
/// shards are disjoint and their union is the full domain. Ordering
/// within the shard follows the input ordering.
pub fn shard_rows(ids: &[EntityId], shard: &ShardConfig) -> ScellaResult<Vec<EntityId>> {
    if shard.count == 0 {
        param_err!("shard count must be at least 1");
    }
    if shard.index >= shard.count {
        param_err!(
            "shard index {} out of range for {} shards",
            shard.index,
            shard.count
        );
    }
    if shard.is_single() {
        return Ok(ids.to_vec());
    }
    Ok(ids
        .iter()
        .copied()
        .filter(|id| id % shard.count as u64 == shard.index as u64)
        .collect())
}

/// Split a row domain into contiguous windows of `batch_size` rows; the
/// final window holds the remainder.
pub fn split_windows(ids: &[EntityId], batch_size: usize) -> ScellaResult<Vec<Vec<EntityId>>> {
    if batch_size == 0 {
        param_err!("batch_size must be at least 1");
    }
    Ok(ids.chunks(batch_size).map(<[EntityId]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_windows_cover_domain_with_remainder() {
        let ids: Vec<EntityId> = (0..100).collect();
        let windows = split_windows(&ids, 32).unwrap();
        let sizes: Vec<usize> = windows.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 32, 32, 4]);

        let flat: Vec<EntityId> = windows.into_iter().flatten().collect();
        assert_eq!(flat, ids);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(split_windows(&[1, 2], 0).is_err());
    }

    #[test]
    fn test_shards_partition_the_domain() {
        let ids: Vec<EntityId> = (0..103).collect();
        for count in 1..=5 {
            let mut seen = HashSet::new();
            for index in 0..count {
                let shard = shard_rows(&ids, &ShardConfig::new(index, count)).unwrap();
                for id in shard {
                    // Disjoint across shards.
                    assert!(seen.insert(id), "id {id} in two shards");
                }
            }
            // No gaps.
            assert_eq!(seen.len(), ids.len());
        }
    }

    #[test]
    fn test_bad_shard_config_rejected() {
        assert!(shard_rows(&[1], &ShardConfig::new(0, 0)).is_err());
        assert!(shard_rows(&[1], &ShardConfig::new(3, 3)).is_err());
    }
}
