// components/playlist_pipeline/src/batch.rs
//! Download batches.
//!
//! A batch runs as one spawned task that exclusively owns its [`BatchState`].
//! Progress chunks and per-track transcode completions are both funnelled into
//! that task and applied one at a time, so the state needs no lock. The UI
//! side only ever sees [`BatchEvent`]s and [`BatchSnapshot`]s.

use crate::config::{FailurePolicy, PipelineConfig};
use crate::destination::DestinationResolver;
use crate::error::{PipelineError, Result};
use crate::fetch::{MediaFetcher, TrackFetchCoordinator};
use crate::progress::{self, ProgressAggregator};
use crate::transcode::{TranscodePipeline, Transcoder};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the UI hears about a running batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Sum of every track's size hint. Sent once, before any progress.
    TotalSizeKnown(u64),
    /// One chunk arrived; `downloaded` is the batch-wide running total
    ProgressChunk { delta: u64, downloaded: u64 },
    TrackFinished { index: usize, path: PathBuf },
    /// Only under [`FailurePolicy::SkipFailedTracks`]
    TrackFailed { index: usize, reason: String },
    BatchComplete,
    /// The batch halted; nothing further will be produced
    BatchFailed(String),
}

/// Read-only view of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSnapshot {
    pub total_expected_size: Option<u64>,
    pub downloaded_so_far: u64,
    pub tracks_done: usize,
    pub track_count: usize,
    pub is_active: bool,
}

/// Outcome of a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Output files in batch order
    pub outputs: Vec<PathBuf>,
    /// Tracks left out under [`FailurePolicy::SkipFailedTracks`]
    pub failed: Vec<(usize, String)>,
    pub downloaded: u64,
}

/// Mutable state of the batch in flight, owned by the batch task
#[derive(Debug)]
struct BatchState {
    total_expected_size: Option<u64>,
    progress: ProgressAggregator,
    per_track_done: BTreeSet<usize>,
    track_count: usize,
    is_active: bool,
}

impl BatchState {
    fn new(track_count: usize) -> Self {
        Self {
            total_expected_size: None,
            progress: ProgressAggregator::new(),
            per_track_done: BTreeSet::new(),
            track_count,
            is_active: true,
        }
    }

    fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            total_expected_size: self.total_expected_size,
            downloaded_so_far: self.progress.downloaded(),
            tracks_done: self.per_track_done.len(),
            track_count: self.track_count,
            is_active: self.is_active,
        }
    }

    fn all_done(&self) -> bool {
        self.per_track_done.len() == self.track_count
    }
}

/// Channels from the batch task to the UI
struct Publisher {
    events: mpsc::UnboundedSender<BatchEvent>,
    snapshots: watch::Sender<BatchSnapshot>,
}

impl Publisher {
    fn emit(&self, event: BatchEvent, state: &BatchState) {
        let _ = self.events.send(event);
        self.snapshots.send_replace(state.snapshot());
    }
}

/// Caller's end of a running batch
pub struct BatchHandle {
    events: mpsc::UnboundedReceiver<BatchEvent>,
    snapshots: watch::Receiver<BatchSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<Result<BatchSummary>>,
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("snapshot", &*self.snapshots.borrow())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchHandle {
    /// Next event, or `None` once the batch task is gone
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<BatchSnapshot> {
        self.snapshots.clone()
    }

    /// Abandon the batch. Running transcodes are killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the batch to end
    pub async fn wait(self) -> Result<BatchSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PipelineError::Cancelled),
            Err(e) => Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e,
            ))),
        }
    }
}

/// Clears the active flag when the batch task ends, however it ends
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs at most one download batch at a time
pub struct BatchController {
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn Transcoder>,
    destination: Arc<DestinationResolver>,
    config: PipelineConfig,
    active: Arc<AtomicBool>,
}

impl BatchController {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
        destination: Arc<DestinationResolver>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            destination,
            config: config.clone(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start downloading `locators` (in batch order) in the background.
    ///
    /// Fails with [`PipelineError::BatchAlreadyActive`] while another batch is
    /// still running.
    pub fn start_batch(&self, locators: Vec<String>) -> Result<BatchHandle> {
        if locators.is_empty() {
            return Err(PipelineError::EmptySelection);
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::BatchAlreadyActive);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let state = BatchState::new(locators.len());
        let (events_tx, events) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots) = watch::channel(state.snapshot());
        let cancel = CancellationToken::new();

        let run = BatchRun {
            fetcher: Arc::clone(&self.fetcher),
            transcoder: Arc::clone(&self.transcoder),
            destination: Arc::clone(&self.destination),
            policy: self.config.failure_policy,
            concurrency: self.config.concurrency_for(locators.len()),
            locators,
            publisher: Publisher {
                events: events_tx,
                snapshots: snapshots_tx,
            },
        };

        let task = tokio::spawn(run.run(state, cancel.clone(), guard));

        Ok(BatchHandle {
            events,
            snapshots,
            cancel,
            task,
        })
    }
}

/// Per-track transcode tasks of a batch, each yielding its batch index
type Transcodes = JoinSet<(usize, Result<PathBuf>)>;

/// One batch, moved into its task
struct BatchRun {
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn Transcoder>,
    destination: Arc<DestinationResolver>,
    policy: FailurePolicy,
    concurrency: usize,
    locators: Vec<String>,
    publisher: Publisher,
}

impl BatchRun {
    async fn run(
        self,
        mut state: BatchState,
        cancel: CancellationToken,
        guard: ActiveGuard,
    ) -> Result<BatchSummary> {
        info!(tracks = self.locators.len(), "Starting batch");

        let mut transcodes = Transcodes::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.execute(&mut state, &mut transcodes) => result,
        };
        // Transcodes still running after a halt are killed, and their partial files
        // removed, before anyone hears the batch is over
        transcodes.shutdown().await;

        state.is_active = false;
        drop(guard);
        match &result {
            Ok(summary) => {
                info!(
                    files = summary.outputs.len(),
                    failed = summary.failed.len(),
                    bytes = summary.downloaded,
                    "Batch complete"
                );
                self.publisher.emit(BatchEvent::BatchComplete, &state);
            }
            Err(e) => {
                warn!(error = %e, "Batch halted");
                self.publisher
                    .emit(BatchEvent::BatchFailed(e.to_string()), &state);
            }
        }
        result
    }

    async fn execute(
        &self,
        state: &mut BatchState,
        transcodes: &mut Transcodes,
    ) -> Result<BatchSummary> {
        self.fetcher.check_available().await?;
        self.transcoder.check_available().await?;

        // Decided once, before any transcode starts
        let destination = self.destination.resolve().await?;
        debug!(dir = %destination.display(), "Batch destination");

        let coordinator =
            TrackFetchCoordinator::new(Arc::clone(&self.fetcher), self.policy, self.concurrency);
        let fetched = coordinator.fetch_all(&self.locators).await?;

        let mut summary = BatchSummary::default();
        for (index, error) in fetched.failures {
            let reason = error.to_string();
            state.per_track_done.insert(index);
            self.publisher.emit(
                BatchEvent::TrackFailed {
                    index,
                    reason: reason.clone(),
                },
                state,
            );
            summary.failed.push((index, reason));
        }

        state.total_expected_size = Some(fetched.total_size);
        self.publisher
            .emit(BatchEvent::TotalSizeKnown(fetched.total_size), state);
        info!(bytes = fetched.total_size, "Total batch size known");

        let mut pipeline = TranscodePipeline::new(Arc::clone(&self.transcoder), destination);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let (chunks_tx, mut chunks) = mpsc::unbounded_channel();

        for handle in fetched.handles {
            let index = handle.index;
            let output = pipeline.output_path(&handle.display_name);
            // The tap is in place before the transcoder ever polls the stream
            let stream = progress::tap(handle.into_stream(), chunks_tx.clone());
            let transcode = pipeline.transcode(stream, output.clone());
            let permits = Arc::clone(&permits);

            transcodes.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = AssertUnwindSafe(transcode)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(PipelineError::transcode(output, "transcoder panicked")));
                (index, result)
            });
        }
        drop(chunks_tx);

        let mut outputs = Vec::new();
        loop {
            tokio::select! {
                biased;
                Some(len) = chunks.recv() => {
                    let downloaded = state.progress.record(len);
                    self.publisher.emit(BatchEvent::ProgressChunk { delta: len, downloaded }, state);
                }
                Some(joined) = transcodes.join_next() => {
                    // Panics are caught inside the task; only runtime shutdown ends up here
                    let (index, result) = joined
                        .map_err(|e| PipelineError::transcode(pipeline.destination(), e))?;
                    match result {
                        Ok(path) => {
                            debug!(index, path = %path.display(), "Track finished");
                            state.per_track_done.insert(index);
                            self.publisher.emit(BatchEvent::TrackFinished { index, path: path.clone() }, state);
                            outputs.push((index, path));
                        }
                        Err(e) if self.policy == FailurePolicy::SkipFailedTracks => {
                            warn!(index, error = %e, "Track failed, continuing");
                            let reason = e.to_string();
                            state.per_track_done.insert(index);
                            self.publisher.emit(BatchEvent::TrackFailed { index, reason: reason.clone() }, state);
                            summary.failed.push((index, reason));
                        }
                        Err(e) => return Err(e),
                    }
                }
                else => break,
            }
        }

        debug_assert!(state.all_done());
        outputs.sort_by_key(|(index, _)| *index);
        summary.outputs = outputs.into_iter().map(|(_, path)| path).collect();
        summary.failed.sort_by_key(|(index, _)| *index);
        summary.downloaded = state.progress.downloaded();
        Ok(summary)
    }
}
