// components/playlist_pipeline/src/source/mod.rs
//! Playlist resolution against several backends at once.
//!
//! Every registered [`SourceResolver`] is asked concurrently. The first answer
//! that is both successful and non-empty wins; slower backends are aborted and
//! whatever they would have returned is never seen.

pub mod youtube;

use crate::error::{PipelineError, Result};
use crate::types::{PlaylistReference, TrackMetadata};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use youtube::YouTubeSource;

/// One playlist backend
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Resolve a reference into ordered track metadata.
    ///
    /// Must fail fast with [`PipelineError::Resolution`] when the reference is
    /// not addressable by this backend.
    async fn resolve(&self, reference: &PlaylistReference) -> Result<Vec<TrackMetadata>>;
}

/// Races all registered sources for a playlist reference
#[derive(Clone, Default)]
pub struct PlaylistResolver {
    sources: Vec<Arc<dyn SourceResolver>>,
}

impl PlaylistResolver {
    pub fn new(sources: Vec<Arc<dyn SourceResolver>>) -> Self {
        Self { sources }
    }

    pub fn register(&mut self, source: Arc<dyn SourceResolver>) {
        self.sources.push(source);
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Resolve `reference` with every source; first valid answer wins.
    ///
    /// Each call is an independent resolution, nothing is cached.
    pub async fn resolve_playlist(
        &self,
        reference: &PlaylistReference,
    ) -> Result<Vec<TrackMetadata>> {
        info!(%reference, sources = self.sources.len(), "Resolving playlist");

        let mut pending = JoinSet::new();
        for source in &self.sources {
            let source = Arc::clone(source);
            let reference = reference.clone();
            pending.spawn(async move {
                let result = source.resolve(&reference).await;
                (source.name().to_string(), result)
            });
        }

        let mut last_error = String::from("no playlist sources registered");

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((name, Ok(tracks))) if !tracks.is_empty() => {
                    info!(source = %name, tracks = tracks.len(), "Playlist resolved");
                    // Losers are abandoned, their results never surface
                    pending.abort_all();
                    return Ok(tracks);
                }
                Ok((name, Ok(_))) => {
                    debug!(source = %name, "Source returned an empty playlist");
                    last_error = format!("{name} returned no tracks");
                }
                Ok((name, Err(e))) => {
                    debug!(source = %name, error = %e, "Source failed");
                    last_error = e.to_string();
                }
                Err(e) => {
                    warn!(error = %e, "Source task did not complete");
                    last_error = e.to_string();
                }
            }
        }

        Err(PipelineError::NoSourceMatched(last_error))
    }
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub enum Answer {
        Tracks(Vec<TrackMetadata>),
        Fail(&'static str),
    }

    /// Answers with a canned result after a delay
    pub struct SourceStub {
        pub name: &'static str,
        pub delay: Duration,
        pub answer: Answer,
        pub calls: AtomicUsize,
    }

    impl SourceStub {
        pub fn tracks(name: &'static str, delay_ms: u64, count: usize) -> Self {
            let tracks = (0..count)
                .map(|i| TrackMetadata {
                    title: format!("{name} track {i}"),
                    source_locator: format!("{name}:{i}"),
                    ..Default::default()
                })
                .collect();
            Self::new(name, delay_ms, Answer::Tracks(tracks))
        }

        pub fn failing(name: &'static str, delay_ms: u64, reason: &'static str) -> Self {
            Self::new(name, delay_ms, Answer::Fail(reason))
        }

        fn new(name: &'static str, delay_ms: u64, answer: Answer) -> Self {
            Self {
                name,
                delay: Duration::from_millis(delay_ms),
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceResolver for SourceStub {
        fn name(&self) -> &str {
            self.name
        }

        async fn resolve(&self, _reference: &PlaylistReference) -> Result<Vec<TrackMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.answer {
                Answer::Tracks(tracks) => Ok(tracks.clone()),
                Answer::Fail(reason) => Err(PipelineError::resolution(self.name, reason)),
            }
        }
    }
}
