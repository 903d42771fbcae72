//! The prefetching batch producer.
//!
//! Worker tasks claim monotonically increasing window indices and
//! realize+tokenize each window independently. Claims are gated by a
//! semaphore whose permits are released only when the consumer takes a
//! batch, so at any point the number of windows ever requested is at
//! most `delivered + prefetch_depth`. Completed batches are delivered
//! strictly in window order through a bounded channel and a small
//! reorder buffer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use common_config::{LoaderConfig, TokenizeErrorPolicy};
use common_error::{param_err, ScellaResult};
use common_runtime::JoinSet;
use scella_core::{Axis, EntityId, Selector, TokenizedBatch};
use scella_lazy::{GraphHandle, LazyGraph, Realizer};
use scella_query::SubmatrixExtractor;

use crate::tokenize::{SparseRow, Tokenizer};
use crate::window::{shard_rows, split_windows};

/// Where the producer's row domain comes from.
#[derive(Clone)]
pub enum RowSource {
    /// The composed row scope of a graph handle; window realization goes
    /// through the graph so recorded transforms apply.
    Graph {
        /// The graph holding the handle.
        graph: Arc<LazyGraph>,
        /// The node whose scope to iterate.
        handle: GraphHandle,
    },
    /// A raw row selector over the store, full column scope.
    Selector(Selector),
}

type WindowMessage = (usize, ScellaResult<TokenizedBatch>, OwnedSemaphorePermit);

/// How a worker realizes one window of rows.
enum WindowScope {
    Graph {
        graph: Arc<LazyGraph>,
        handle: GraphHandle,
    },
    Plain {
        col_ids: Arc<Vec<EntityId>>,
        cols_all: bool,
    },
}

/// Streaming producer of tokenized batches.
///
/// Finite and restartable: constructing a new producer over the same
/// source and configuration yields the identical batch sequence.
pub struct BatchProducer {
    rx: mpsc::Receiver<WindowMessage>,
    reorder: BTreeMap<usize, (ScellaResult<TokenizedBatch>, OwnedSemaphorePermit)>,
    next_index: usize,
    n_windows: usize,
    stopped: bool,
    stop: Arc<AtomicBool>,
    claims: Arc<Semaphore>,
    workers: JoinSet<()>,
}

impl BatchProducer {
    /// Resolve the row domain, apply sharding, split windows, and start
    /// the prefetch workers.
    pub async fn start(
        source: RowSource,
        extractor: Arc<SubmatrixExtractor>,
        tokenizer: Arc<dyn Tokenizer>,
        config: LoaderConfig,
    ) -> ScellaResult<Self> {
        if config.max_tokens == 0 {
            param_err!("max_tokens must be at least 1");
        }
        if config.prefetch_depth == 0 {
            param_err!("prefetch_depth must be at least 1");
        }

        let (domain, scope) = match source {
            RowSource::Graph { graph, handle } => {
                let domain = Realizer::new(&extractor).row_domain(&graph, handle).await?;
                (domain, WindowScope::Graph { graph, handle })
            }
            RowSource::Selector(selector) => {
                let domain = extractor.resolve(Axis::Rows, &selector).await?;
                let col_ids = extractor.resolve(Axis::Cols, &Selector::All).await?;
                (
                    domain,
                    WindowScope::Plain {
                        col_ids: Arc::new(col_ids),
                        cols_all: true,
                    },
                )
            }
        };

        let sharded = shard_rows(&domain, &config.shard)?;
        let windows = Arc::new(split_windows(&sharded, config.batch_size)?);
        debug!(
            "loader: {} rows in {} windows (shard {}/{}, batch_size={})",
            sharded.len(),
            windows.len(),
            config.shard.index,
            config.shard.count,
            config.batch_size
        );

        let stop = Arc::new(AtomicBool::new(false));
        let claims = Arc::new(Semaphore::new(config.prefetch_depth));
        let next_window = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<WindowMessage>(config.prefetch_depth);
        let scope = Arc::new(scope);

        let mut workers = JoinSet::new();
        for _ in 0..config.prefetch_depth {
            let windows = Arc::clone(&windows);
            let stop = Arc::clone(&stop);
            let claims = Arc::clone(&claims);
            let next_window = Arc::clone(&next_window);
            let tx = tx.clone();
            let extractor = Arc::clone(&extractor);
            let tokenizer = Arc::clone(&tokenizer);
            let scope = Arc::clone(&scope);
            let max_tokens = config.max_tokens;
            let policy = config.on_tokenize_error;

            workers.spawn(async move {
                loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    // Claim a permit before claiming a window index: the
                    // permit travels with the result and is released only
                    // on in-order delivery, which bounds how far ahead
                    // the workers can run.
                    let permit = match Arc::clone(&claims).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next_window.fetch_add(1, Ordering::SeqCst);
                    if index >= windows.len() {
                        break;
                    }

                    let result = produce_window(
                        &extractor,
                        &scope,
                        &windows[index],
                        tokenizer.as_ref(),
                        max_tokens,
                        policy,
                    )
                    .await;
                    if tx.send((index, result, permit)).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(Self {
            rx,
            reorder: BTreeMap::new(),
            next_index: 0,
            n_windows: windows.len(),
            stopped: false,
            stop,
            claims,
            workers,
        })
    }

    /// Total number of batches this producer will yield.
    pub fn n_batches(&self) -> usize {
        self.n_windows
    }

    /// Take the next batch, in strict window order. Returns `None` once
    /// every window has been delivered or after `stop`.
    pub async fn next_batch(&mut self) -> Option<ScellaResult<TokenizedBatch>> {
        if self.stopped || self.next_index >= self.n_windows {
            return None;
        }
        loop {
            if let Some((result, permit)) = self.reorder.remove(&self.next_index) {
                self.next_index += 1;
                drop(permit);
                return Some(result);
            }
            match self.rx.recv().await {
                Some((index, result, permit)) => {
                    self.reorder.insert(index, (result, permit));
                }
                None => return None,
            }
        }
    }

    /// Stop iterating: no new windows are claimed, in-flight work is
    /// allowed to finish and its results are discarded.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.stop.store(true, Ordering::SeqCst);
        self.claims.close();
    }

    /// Adapt the producer into a `futures::Stream` of batches.
    pub fn into_stream(self) -> impl futures::Stream<Item = ScellaResult<TokenizedBatch>> {
        futures::stream::unfold(self, |mut producer| async move {
            producer.next_batch().await.map(|batch| (batch, producer))
        })
    }

    /// Stop and wait for the workers to wind down.
    pub async fn shutdown(mut self) {
        self.stop();
        self.reorder.clear();
        self.rx.close();
        while self.workers.join_next().await.is_some() {}
    }
}

impl Drop for BatchProducer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.claims.close();
    }
}

async fn produce_window(
    extractor: &SubmatrixExtractor,
    scope: &WindowScope,
    rows: &[EntityId],
    tokenizer: &dyn Tokenizer,
    max_tokens: usize,
    policy: TokenizeErrorPolicy,
) -> ScellaResult<TokenizedBatch> {
    let matrix = match scope {
        WindowScope::Graph { graph, handle } => {
            Realizer::new(extractor)
                .realize_rows(graph, *handle, rows)
                .await?
        }
        WindowScope::Plain { col_ids, cols_all } => {
            extractor
                .extract_resolved(rows.to_vec(), false, col_ids.as_ref().clone(), *cols_all)
                .await?
        }
    };

    let mut batch = TokenizedBatch::with_capacity(matrix.n_rows(), max_tokens);
    for (pos, &row_id) in matrix.row_ids.iter().enumerate() {
        let mut genes = Vec::new();
        let mut values = Vec::new();
        for (col, value) in matrix.row(pos) {
            genes.push(matrix.col_ids[col]);
            values.push(value);
        }
        let row = SparseRow {
            row_id,
            genes,
            values,
        };
        match tokenizer.tokenize(&row, max_tokens) {
            Ok((ids, mask)) => batch.push_row(row_id, ids, mask),
            Err(err) => match policy {
                TokenizeErrorPolicy::SkipRow => warn!("skipping row {row_id}: {err}"),
                TokenizeErrorPolicy::AbortBatch => return Err(err),
            },
        }
    }
    Ok(batch)
}
