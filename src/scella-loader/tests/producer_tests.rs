//! End-to-end loader tests: window coverage, ordering, sharding,
//! cancellation, and tokenizer error policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common_config::{LoaderConfig, ShardConfig, TokenizeErrorPolicy};
use common_error::{ScellaError, ScellaResult};
use scella_core::{AttrExpr, Axis, EntityId, Selector, SparseEntry};
use scella_lazy::{LazyGraph, TransformOp};
use scella_loader::{BatchProducer, GeneRankTokenizer, RowSource, SparseRow, Tokenizer};
use scella_query::{EntryQuery, MemoryStore, SubmatrixExtractor, TripletStore};

/// 100 cells x 5 genes, entry (i, i % 5) = i + 1.
fn sample_store() -> MemoryStore {
    let triples = (0..100u64).map(|i| (i, i % 5, (i + 1) as f64)).collect();
    MemoryStore::from_triples(100, 5, triples).unwrap()
}

fn extractor() -> Arc<SubmatrixExtractor> {
    Arc::new(SubmatrixExtractor::new(Arc::new(sample_store())))
}

async fn collect_row_ids(producer: &mut BatchProducer) -> Vec<Vec<EntityId>> {
    let mut batches = Vec::new();
    while let Some(result) = producer.next_batch().await {
        batches.push(result.unwrap().row_ids);
    }
    batches
}

#[tokio::test]
async fn test_batches_cover_domain_in_window_order() {
    let config = LoaderConfig::default().with_batch_size(32).with_max_tokens(8);
    let mut producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    assert_eq!(producer.n_batches(), 4);
    let batches = collect_row_ids(&mut producer).await;
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![32, 32, 32, 4]);

    // Ascending window order, every row id exactly once.
    let flat: Vec<EntityId> = batches.into_iter().flatten().collect();
    let expected: Vec<EntityId> = (0..100).collect();
    assert_eq!(flat, expected);

    producer.shutdown().await;
}

#[tokio::test]
async fn test_batch_shape_is_fixed() {
    let config = LoaderConfig::default().with_batch_size(10).with_max_tokens(4);
    let mut producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    let batch = producer.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.n_rows(), 10);
    for (ids, mask) in batch.input_ids.iter().zip(&batch.attention_mask) {
        assert_eq!(ids.len(), 4);
        assert_eq!(mask.len(), 4);
        assert_eq!(ids[0], GeneRankTokenizer::CLS);
    }
    producer.shutdown().await;
}

#[tokio::test]
async fn test_sharded_producers_partition_the_domain() {
    let mut seen = HashSet::new();
    for index in 0..3 {
        let config = LoaderConfig::default()
            .with_batch_size(16)
            .with_max_tokens(8)
            .with_shard(ShardConfig::new(index, 3));
        let mut producer = BatchProducer::start(
            RowSource::Selector(Selector::All),
            extractor(),
            Arc::new(GeneRankTokenizer),
            config,
        )
        .await
        .unwrap();

        for row_id in collect_row_ids(&mut producer).await.into_iter().flatten() {
            assert_eq!(row_id % 3, index as u64);
            assert!(seen.insert(row_id), "row {row_id} in two shards");
        }
        producer.shutdown().await;
    }
    assert_eq!(seen.len(), 100);
}

#[tokio::test]
async fn test_stream_adapter_yields_every_batch() {
    use futures::StreamExt;

    let config = LoaderConfig::default().with_batch_size(32).with_max_tokens(8);
    let producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    let batches: Vec<_> = producer.into_stream().collect().await;
    assert_eq!(batches.len(), 4);
    assert!(batches.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_restart_yields_identical_sequence() {
    let config = LoaderConfig::default().with_batch_size(7).with_max_tokens(8);
    let mut first = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(GeneRankTokenizer),
        config.clone(),
    )
    .await
    .unwrap();
    let mut second = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    assert_eq!(
        collect_row_ids(&mut first).await,
        collect_row_ids(&mut second).await
    );
}

struct CountingStore {
    inner: MemoryStore,
    queries: AtomicUsize,
}

#[async_trait]
impl TripletStore for CountingStore {
    async fn all_ids(&self, axis: Axis) -> ScellaResult<Vec<EntityId>> {
        self.inner.all_ids(axis).await
    }

    async fn resolve_attr(&self, axis: Axis, expr: &AttrExpr) -> ScellaResult<Vec<EntityId>> {
        self.inner.resolve_attr(axis, expr).await
    }

    async fn query_entries(&self, query: &EntryQuery) -> ScellaResult<Vec<SparseEntry>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_entries(query).await
    }
}

#[tokio::test]
async fn test_cancellation_bounds_window_requests() {
    let store = Arc::new(CountingStore {
        inner: sample_store(),
        queries: AtomicUsize::new(0),
    });
    let prefetch_depth = 2;
    let config = LoaderConfig::default()
        .with_batch_size(10)
        .with_max_tokens(8)
        .with_prefetch_depth(prefetch_depth);
    let mut producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        Arc::new(SubmatrixExtractor::new(store.clone())),
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    let first = producer.next_batch().await.unwrap().unwrap();
    assert_eq!(first.row_ids, (0..10).collect::<Vec<_>>());
    producer.stop();
    assert!(producer.next_batch().await.is_none());
    producer.shutdown().await;

    // One delivered batch plus at most one in-flight window per permit.
    assert!(
        store.queries.load(Ordering::SeqCst) <= prefetch_depth + 1,
        "requested {} windows",
        store.queries.load(Ordering::SeqCst)
    );
}

/// Tokenizer that fails for one specific row.
struct FailingTokenizer {
    bad_row: EntityId,
}

impl Tokenizer for FailingTokenizer {
    fn tokenize(&self, row: &SparseRow, max_tokens: usize) -> ScellaResult<(Vec<u32>, Vec<u8>)> {
        if row.row_id == self.bad_row {
            return Err(ScellaError::tokenization(row.row_id, "unmappable gene"));
        }
        GeneRankTokenizer.tokenize(row, max_tokens)
    }
}

#[tokio::test]
async fn test_skip_row_policy_drops_only_the_failing_row() {
    let config = LoaderConfig::default()
        .with_batch_size(10)
        .with_max_tokens(8)
        .with_tokenize_error_policy(TokenizeErrorPolicy::SkipRow);
    let mut producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(FailingTokenizer { bad_row: 3 }),
        config,
    )
    .await
    .unwrap();

    let first = producer.next_batch().await.unwrap().unwrap();
    assert_eq!(first.n_rows(), 9);
    assert!(!first.row_ids.contains(&3));

    // Later batches are unaffected.
    let second = producer.next_batch().await.unwrap().unwrap();
    assert_eq!(second.n_rows(), 10);
    producer.shutdown().await;
}

#[tokio::test]
async fn test_abort_batch_policy_fails_the_containing_batch() {
    let config = LoaderConfig::default()
        .with_batch_size(10)
        .with_max_tokens(8)
        .with_tokenize_error_policy(TokenizeErrorPolicy::AbortBatch);
    let mut producer = BatchProducer::start(
        RowSource::Selector(Selector::All),
        extractor(),
        Arc::new(FailingTokenizer { bad_row: 13 }),
        config,
    )
    .await
    .unwrap();

    // Window 0 is clean.
    assert!(producer.next_batch().await.unwrap().is_ok());
    // Window 1 contains row 13 and fails with its position attached.
    let err = producer.next_batch().await.unwrap().unwrap_err();
    assert!(matches!(err, ScellaError::Tokenization { row: 13, .. }));
    producer.shutdown().await;
}

#[tokio::test]
async fn test_graph_source_applies_filter_and_transforms() {
    let ext = extractor();
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let sel = graph
        .select(src, Some(Selector::by_ids([5, 1, 9])), None)
        .unwrap();
    let scaled = graph.transform(sel, TransformOp::Scale(2.0)).unwrap();

    let config = LoaderConfig::default().with_batch_size(2).with_max_tokens(4);
    let mut producer = BatchProducer::start(
        RowSource::Graph {
            graph: Arc::new(graph),
            handle: scaled,
        },
        ext,
        Arc::new(GeneRankTokenizer),
        config,
    )
    .await
    .unwrap();

    let batches = collect_row_ids(&mut producer).await;
    assert_eq!(batches, vec![vec![5, 1], vec![9]]);
}
