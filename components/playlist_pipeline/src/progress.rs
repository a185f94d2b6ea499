// components/playlist_pipeline/src/progress.rs
//! Byte-level progress across every track of a batch.
//!
//! Each track's stream is wrapped by [`tap`], which reports the length of every
//! chunk on a shared fan-in channel. The receiving end folds those lengths into
//! one running total with [`ProgressAggregator`].

use crate::fetch::ByteStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Running sum of all chunk lengths seen so far. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressAggregator {
    downloaded: u64,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one chunk and return the new cumulative value
    pub fn record(&mut self, chunk_len: u64) -> u64 {
        self.downloaded = self.downloaded.saturating_add(chunk_len);
        self.downloaded
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Turn a merged stream of chunk lengths into a stream of cumulative values
    pub fn cumulative(chunks: impl Stream<Item = u64>) -> impl Stream<Item = u64> {
        chunks.scan(ProgressAggregator::new(), |progress, len| {
            futures::future::ready(Some(progress.record(len)))
        })
    }
}

/// Report the length of every chunk that flows through `stream`.
///
/// The sender lives inside the returned stream, so the channel closes once
/// every tapped stream has been dropped.
pub fn tap(stream: ByteStream, chunks: mpsc::UnboundedSender<u64>) -> ByteStream {
    Box::pin(stream.inspect(move |item| {
        if let Ok(bytes) = item {
            let _ = chunks.send(bytes.len() as u64);
        }
    }))
}
