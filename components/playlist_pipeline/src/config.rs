// components/playlist_pipeline/src/config.rs
use std::path::PathBuf;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";

/// What a batch does when a single track fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any fetch or transcode failure halts the whole batch
    #[default]
    AbortBatch,
    /// Failed tracks are reported and left out; the rest of the batch carries on
    SkipFailedTracks,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// API key for the YouTube Data API. Without it the video-host backend is not registered.
    pub youtube_api_key: Option<String>,

    /// Base URL of the YouTube Data API, parsed when the backend is built
    pub youtube_api_base: String,

    /// Used when no output directory preference has been stored
    pub default_output_dir: Option<PathBuf>,

    pub failure_policy: FailurePolicy,

    /// Upper bound on tracks fetched and transcoded at once (`None` = unbounded)
    pub max_concurrent_tracks: Option<usize>,

    pub ytdlp_binary: String,
    pub ffmpeg_binary: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            youtube_api_base: YOUTUBE_API_BASE.to_string(),
            default_output_dir: None,
            failure_policy: FailurePolicy::default(),
            max_concurrent_tracks: None,
            ytdlp_binary: "yt-dlp".to_string(),
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Concurrency to use for a batch of `track_count` tracks
    pub fn concurrency_for(&self, track_count: usize) -> usize {
        self.max_concurrent_tracks
            .unwrap_or(track_count)
            .min(track_count)
            .max(1)
    }
}
