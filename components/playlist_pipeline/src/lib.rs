// components/playlist_pipeline/src/lib.rs
mod batch;
mod config;
mod destination;
mod error;
mod fetch;
mod progress;
mod source;
mod transcode;
mod types;
mod ytdlp;

use std::sync::Arc;
use tracing::info;

pub use batch::{BatchController, BatchEvent, BatchHandle, BatchSnapshot, BatchSummary};
pub use config::{FailurePolicy, PipelineConfig};
pub use destination::{
    DestinationResolver, DirectoryPicker, JsonPreferenceStore, PreferenceStore, OUTPUT_DIR_KEY,
};
pub use error::{PipelineError, Result};
pub use fetch::{ByteStream, FetchHandle, FetchedBatch, FetchedMedia, MediaFetcher, TrackFetchCoordinator};
pub use progress::ProgressAggregator;
pub use source::{PlaylistResolver, SourceResolver, YouTubeSource};
pub use transcode::{FfmpegTranscoder, TranscodePipeline, Transcoder, TARGET_EXTENSION};
pub use types::{PlaylistReference, PlaylistSession, SelectionSet, TrackMetadata};
pub use ytdlp::{YtDlp, YtDlpFetcher, YtDlpSource};

/// Resolves playlists and runs download batches
pub struct PlaylistPipeline {
    resolver: PlaylistResolver,
    batches: BatchController,
}

impl PlaylistPipeline {
    /// Wire up the stock backends: YouTube Data API (when a key is
    /// configured) and yt-dlp for resolution, yt-dlp and ffmpeg for batches
    pub fn new(
        config: &PipelineConfig,
        preferences: Arc<dyn PreferenceStore>,
        picker: Arc<dyn DirectoryPicker>,
    ) -> Result<Self> {
        let ytdlp = YtDlp::new(&config.ytdlp_binary);

        let mut resolver = PlaylistResolver::default();
        if let Some(key) = &config.youtube_api_key {
            resolver.register(Arc::new(YouTubeSource::new(
                &config.youtube_api_base,
                key.clone(),
            )?));
        }
        resolver.register(Arc::new(YtDlpSource::new(ytdlp.clone())));
        info!(sources = ?resolver.source_names(), "Playlist sources registered");

        let destination = DestinationResolver::new(
            preferences,
            picker,
            config.default_output_dir.clone(),
        );
        let batches = BatchController::new(
            Arc::new(YtDlpFetcher::new(ytdlp)),
            Arc::new(FfmpegTranscoder::new(&config.ffmpeg_binary)),
            Arc::new(destination),
            config,
        );

        Ok(Self::with_components(resolver, batches))
    }

    /// Create a pipeline from already assembled parts
    pub fn with_components(resolver: PlaylistResolver, batches: BatchController) -> Self {
        Self { resolver, batches }
    }

    pub async fn resolve_playlist(
        &self,
        reference: &PlaylistReference,
    ) -> Result<Vec<TrackMetadata>> {
        self.resolver.resolve_playlist(reference).await
    }

    pub fn start_batch(&self, locators: Vec<String>) -> Result<BatchHandle> {
        self.batches.start_batch(locators)
    }

    pub fn is_batch_active(&self) -> bool {
        self.batches.is_active()
    }
}
