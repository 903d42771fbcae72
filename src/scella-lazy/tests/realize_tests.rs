//! Realization tests: composition, windows, fusion transparency, and
//! query behavior of reindex nodes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common_error::ScellaResult;
use scella_core::{AttrExpr, Axis, EntityId, Selector, SparseEntry};
use scella_lazy::{GraphHandle, LazyGraph, Realizer, TransformOp, Window};
use scella_query::{EntryQuery, MemoryStore, SubmatrixExtractor, TripletStore};

/// 10 cells x 4 genes, entry (i, i % 4) = i + 1.
fn sample_store() -> MemoryStore {
    let triples = (0..10u64).map(|i| (i, i % 4, (i + 1) as f64)).collect();
    MemoryStore::from_triples(10, 4, triples).unwrap()
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

fn counting_extractor() -> (Arc<CountingStore>, SubmatrixExtractor) {
    let store = Arc::new(CountingStore {
        inner: sample_store(),
        queries: AtomicUsize::new(0),
    });
    (store.clone(), SubmatrixExtractor::new(store))
}

fn filtered_graph() -> (LazyGraph, GraphHandle) {
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let sel = graph
        .select(src, Some(Selector::by_ids([7, 2, 9, 4])), None)
        .unwrap();
    (graph, sel)
}

#[tokio::test]
async fn test_select_narrows_in_selector_order() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let (graph, handle) = filtered_graph();

    let m = Realizer::new(&extractor)
        .realize(&graph, handle, &Window::all())
        .await
        .unwrap();
    assert_eq!(m.row_ids, vec![7, 2, 9, 4]);
    assert_eq!(m.col_ids, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_realization_is_idempotent() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let t = graph.transform(src, TransformOp::Log1p).unwrap();

    let realizer = Realizer::new(&extractor);
    let a = realizer.realize(&graph, t, &Window::all()).await.unwrap();
    let b = realizer.realize(&graph, t, &Window::all()).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_window_realizes_only_requested_rows() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let (graph, handle) = filtered_graph();

    let m = Realizer::new(&extractor)
        .realize(&graph, handle, &Window::rows(1..3))
        .await
        .unwrap();
    assert_eq!(m.row_ids, vec![2, 9]);

    // A window past the end clamps to an empty scope.
    let m = Realizer::new(&extractor)
        .realize(&graph, handle, &Window::rows(10..20))
        .await
        .unwrap();
    assert_eq!(m.n_rows(), 0);
    assert_eq!(m.nnz(), 0);
}

#[tokio::test]
async fn test_fusion_is_transparent() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let a = graph.transform(src, TransformOp::Scale(3.0)).unwrap();
    let b = graph.transform(a, TransformOp::Shift(0.5)).unwrap();
    let c = graph.transform(b, TransformOp::Log1p).unwrap();

    let fused = Realizer::new(&extractor)
        .realize(&graph, c, &Window::all())
        .await
        .unwrap();
    let unfused = Realizer::new(&extractor)
        .with_fusion(false)
        .realize(&graph, c, &Window::all())
        .await
        .unwrap();

    assert_eq!(fused.row_ids, unfused.row_ids);
    for (x, y) in fused.entries().iter().zip(unfused.entries()) {
        assert_eq!((x.row, x.col), (y.row, y.col));
        assert!((x.value - y.value).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_reindex_is_pure_bookkeeping() {
    let (store, extractor) = counting_extractor();
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::by_ids([0, 1, 2]), Selector::All);
    let reordered = graph.reindex(src, Some(vec![2, 0, 1]), None).unwrap();

    let m = Realizer::new(&extractor)
        .realize(&graph, reordered, &Window::all())
        .await
        .unwrap();
    assert_eq!(m.row_ids, vec![2, 0, 1]);
    // One extraction, nothing extra for the reorder.
    assert_eq!(store.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_permutation_length_checked_at_realize() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::by_ids([0, 1, 2]), Selector::All);
    // Valid permutation of length 2, but the scope has 3 rows.
    let bad = graph.reindex(src, Some(vec![1, 0]), None).unwrap();

    let err = Realizer::new(&extractor)
        .realize(&graph, bad, &Window::all())
        .await
        .unwrap_err();
    assert!(matches!(err, common_error::ScellaError::GraphError(_)));
}

#[tokio::test]
async fn test_normalize_total_uses_window_columns() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let n = graph
        .transform(src, TransformOp::NormalizeTotal { target_sum: 100.0 })
        .unwrap();

    let m = Realizer::new(&extractor)
        .realize(&graph, n, &Window::all())
        .await
        .unwrap();
    for sum in m.row_sums() {
        assert!((sum - 100.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_row_domain_and_realize_rows() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let (graph, handle) = filtered_graph();
    let realizer = Realizer::new(&extractor);

    let domain = realizer.row_domain(&graph, handle).await.unwrap();
    assert_eq!(domain, vec![7, 2, 9, 4]);

    let m = realizer
        .realize_rows(&graph, handle, &domain[2..])
        .await
        .unwrap();
    assert_eq!(m.row_ids, vec![9, 4]);
}

#[test]
fn test_realization_drives_from_sync_code() {
    // Blocking callers reach realization through the runtime bridge.
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let (graph, handle) = filtered_graph();

    let m = common_runtime::block_on(async {
        Realizer::new(&extractor)
            .realize(&graph, handle, &Window::all())
            .await
    })
    .unwrap()
    .unwrap();
    assert_eq!(m.row_ids, vec![7, 2, 9, 4]);
}

#[tokio::test]
async fn test_sequential_selects_intersect() {
    let extractor = SubmatrixExtractor::new(Arc::new(sample_store()));
    let mut graph = LazyGraph::new();
    let src = graph.source(Selector::All, Selector::All);
    let first = graph
        .select(src, Some(Selector::by_ids([1, 3, 5, 7])), None)
        .unwrap();
    // Names 8, which the first selection already dropped.
    let second = graph
        .select(first, Some(Selector::by_ids([7, 8, 3])), None)
        .unwrap();

    let m = Realizer::new(&extractor)
        .realize(&graph, second, &Window::all())
        .await
        .unwrap();
    assert_eq!(m.row_ids, vec![7, 3]);
}
