//! Batch dispatcher.
//!
//! Items are processed in contiguous batches of `batch_size`. Within a batch
//! every item runs on its own tokio task, capped by a semaphore; the batch is
//! fully resolved before the next one starts. Progress is reported as each
//! item finishes; outcomes always come back sorted by input index.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use mdigest_shared::{DigestError, DispatchConfig, FetchOutcome, Result, SourceItem};

use crate::generator::MarkdownGenerator;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Callbacks for dispatch progress. All methods default to no-ops.
pub trait DispatchProgress: Send + Sync {
    /// A batch is about to start. `batch` is 1-based; `remaining_batches`
    /// counts the batches still queued after this one.
    fn batch_started(
        &self,
        _batch: usize,
        _total_batches: usize,
        _items: usize,
        _remaining_batches: usize,
    ) {
    }

    /// One item resolved, successfully or not.
    fn item_finished(&self, _outcome: &FetchOutcome) {}

    /// Every item of `batch` has resolved.
    fn batch_finished(&self, _batch: usize, _total_batches: usize) {}
}

/// A no-op progress reporter.
pub struct SilentDispatchProgress;

impl DispatchProgress for SilentDispatchProgress {}

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// Every outcome of a dispatch run, sorted by item index.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of items that produced content.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Failed outcomes, in index order.
    pub fn failures(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

// ---------------------------------------------------------------------------
// BatchDispatcher
// ---------------------------------------------------------------------------

/// Fans source items out to a [`MarkdownGenerator`] with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    batch_size: usize,
}

impl BatchDispatcher {
    /// Create a dispatcher. A `batch_size` of zero is a configuration error.
    pub fn new(batch_size: usize) -> Result<Self> {
        Ok(Self::from_config(&DispatchConfig::new(batch_size)?))
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches needed for `items` items.
    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size)
    }

    /// Run every item through `generator` and collect one outcome per item.
    ///
    /// Per-item failures, including a worker task that panicked, become
    /// failed outcomes; they never abort the run.
    #[instrument(skip_all, fields(items = items.len(), batch_size = self.batch_size))]
    pub async fn dispatch<G>(
        &self,
        items: &[SourceItem],
        generator: Arc<G>,
        progress: &dyn DispatchProgress,
    ) -> DispatchReport
    where
        G: MarkdownGenerator + ?Sized + 'static,
    {
        let total_batches = self.batch_count(items.len());
        let semaphore = Arc::new(Semaphore::new(self.batch_size));
        let mut outcomes: Vec<FetchOutcome> = Vec::with_capacity(items.len());

        info!(total_batches, "starting dispatch");

        for (batch_idx, batch) in items.chunks(self.batch_size).enumerate() {
            let batch_no = batch_idx + 1;
            progress.batch_started(batch_no, total_batches, batch.len(), total_batches - batch_no);

            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|item| {
                    let generator = Arc::clone(&generator);
                    let sem = Arc::clone(&semaphore);
                    let identifier = item.identifier.clone();

                    let handle = tokio::spawn(async move {
                        let Ok(_permit) = sem.acquire().await else {
                            return Err(DigestError::generation(&identifier, "dispatcher shut down"));
                        };
                        generator.generate(&identifier).await
                    });
                    async move { (item, handle.await) }
                })
                .collect();

            // Report in completion order; the batch barrier is draining `pending`.
            while let Some((item, joined)) = pending.next().await {
                let outcome = match joined {
                    Ok(Ok(markdown)) => FetchOutcome::content(item.index, &item.identifier, markdown),
                    Ok(Err(e)) => {
                        warn!(identifier = %item.identifier, error = %e, "item failed");
                        FetchOutcome::failed(item.index, &item.identifier, error_text(e))
                    }
                    Err(e) => {
                        warn!(identifier = %item.identifier, error = %e, "worker task failed");
                        FetchOutcome::failed(
                            item.index,
                            &item.identifier,
                            format!("worker task failed: {e}"),
                        )
                    }
                };
                progress.item_finished(&outcome);
                outcomes.push(outcome);
            }

            progress.batch_finished(batch_no, total_batches);
        }

        outcomes.sort_by_key(|o| o.index);

        let report = DispatchReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            total = report.total(),
            "dispatch complete"
        );
        report
    }
}

/// The message recorded on a failed outcome. Generation errors already name
/// their identifier, so only the inner message is kept.
fn error_text(err: DigestError) -> String {
    match err {
        DigestError::Generation { message, .. } => message,
        other => other.to_string(),
    }
}
