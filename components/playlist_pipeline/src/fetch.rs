// components/playlist_pipeline/src/fetch.rs
use crate::config::FailurePolicy;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw media bytes of one track, in the order the source produced them
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// What a fetcher hands back for one locator
pub struct FetchedMedia {
    /// Declared total size of the payload
    pub size_hint: u64,
    /// Used to name the output file
    pub display_name: String,
    pub stream: ByteStream,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Check that everything the fetcher shells out to is installed
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Look up size and name for a track and prepare its byte stream.
    ///
    /// The stream does not need to be producing yet; it is polled only once
    /// every track of the batch has reported its size.
    async fn fetch(&self, locator: &str) -> Result<FetchedMedia>;
}

/// One in-flight track of a batch
pub struct FetchHandle {
    /// Position of the track in the requested batch
    pub index: usize,
    pub locator: String,
    pub size_hint: u64,
    pub display_name: String,
    stream: ByteStream,
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("index", &self.index)
            .field("locator", &self.locator)
            .field("size_hint", &self.size_hint)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl FetchHandle {
    pub fn into_stream(self) -> ByteStream {
        self.stream
    }
}

/// Every track of a batch with its size known
#[derive(Debug)]
pub struct FetchedBatch {
    pub handles: Vec<FetchHandle>,
    /// Sum of all size hints; only exists once every hint has arrived
    pub total_size: u64,
    /// Tracks dropped under [`FailurePolicy::SkipFailedTracks`]
    pub failures: Vec<(usize, PipelineError)>,
}

/// Starts one fetch per locator and waits until all of them know their size
pub struct TrackFetchCoordinator {
    fetcher: Arc<dyn MediaFetcher>,
    policy: FailurePolicy,
    concurrency: usize,
}

impl TrackFetchCoordinator {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, policy: FailurePolicy, concurrency: usize) -> Self {
        Self {
            fetcher,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn fetch_all(&self, locators: &[String]) -> Result<FetchedBatch> {
        let mut in_flight = stream::iter(locators.iter().cloned().enumerate())
            .map(|(index, locator)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let result = fetcher.fetch(&locator).await;
                    (index, locator, result)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut handles = Vec::with_capacity(locators.len());
        let mut failures = Vec::new();

        while let Some((index, locator, result)) = in_flight.next().await {
            match result {
                Ok(media) => {
                    debug!(index, %locator, size = media.size_hint, "Track size known");
                    handles.push(FetchHandle {
                        index,
                        locator,
                        size_hint: media.size_hint,
                        display_name: media.display_name,
                        stream: media.stream,
                    });
                }
                Err(e) => match self.policy {
                    FailurePolicy::AbortBatch => return Err(e),
                    FailurePolicy::SkipFailedTracks => {
                        warn!(index, %locator, error = %e, "Skipping track that failed to fetch");
                        failures.push((index, e));
                    }
                },
            }
        }

        handles.sort_by_key(|h| h.index);
        failures.sort_by_key(|(index, _)| *index);
        let total_size = handles.iter().map(|h| h.size_hint).sum();

        Ok(FetchedBatch {
            handles,
            total_size,
            failures,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::stub::{FetcherStub, ScriptedTrack};
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn locators(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(1))]
    #[tokio::test]
    async fn test_total_size_is_sum_of_all_hints(#[case] cap: Option<usize>) {
        let fetcher = FetcherStub::default()
            .with("a", ScriptedTrack::new(1000, &[]).delayed(20, 0))
            .with("b", ScriptedTrack::new(2000, &[]))
            .with("c", ScriptedTrack::new(30, &[]).delayed(5, 0));
        let fetcher = Arc::new(fetcher);
        let coordinator = TrackFetchCoordinator::new(
            fetcher.clone(),
            FailurePolicy::AbortBatch,
            cap.unwrap_or(3),
        );

        let batch = coordinator.fetch_all(&locators(&["a", "b", "c"])).await.unwrap();

        assert_eq!(batch.total_size, 3030);
        let order: Vec<_> = batch.handles.iter().map(|h| h.locator.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_batch() {
        let fetcher = FetcherStub::default()
            .with("a", ScriptedTrack::new(1000, &[]))
            .with("b", ScriptedTrack::failing());
        let coordinator = TrackFetchCoordinator::new(Arc::new(fetcher), FailurePolicy::AbortBatch, 2);

        let result = coordinator.fetch_all(&locators(&["a", "b"])).await;
        assert_matches!(result, Err(PipelineError::Fetch { locator, .. }) if locator == "b");
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped_when_hardened() {
        let fetcher = FetcherStub::default()
            .with("a", ScriptedTrack::new(1000, &[]))
            .with("b", ScriptedTrack::failing())
            .with("c", ScriptedTrack::new(500, &[]));
        let coordinator =
            TrackFetchCoordinator::new(Arc::new(fetcher), FailurePolicy::SkipFailedTracks, 3);

        let batch = coordinator.fetch_all(&locators(&["a", "b", "c"])).await.unwrap();

        assert_eq!(batch.total_size, 1500);
        assert_eq!(batch.handles.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0, 1);
    }

    #[tokio::test]
    async fn test_duplicate_locators_are_fetched_separately() {
        let fetcher = Arc::new(FetcherStub::default().with("a", ScriptedTrack::new(10, &[])));
        let coordinator = TrackFetchCoordinator::new(fetcher.clone(), FailurePolicy::AbortBatch, 2);

        let batch = coordinator.fetch_all(&locators(&["a", "a"])).await.unwrap();

        assert_eq!(batch.handles.len(), 2);
        assert_eq!(batch.total_size, 20);
        assert_eq!(fetcher.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
