// bases/playlist_cli/src/config.rs
use crate::args::Args;
use playlist_pipeline::{FailurePolicy, PipelineConfig};
use std::path::PathBuf;

const PREFERENCES_FILE: &str = "preferences.json";
const APP_DIR: &str = "playlist-pull";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,

    /// Where the chosen output directory is remembered
    pub preferences_path: PathBuf,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        let failure_policy = if args.skip_failed {
            FailurePolicy::SkipFailedTracks
        } else {
            FailurePolicy::AbortBatch
        };

        let pipeline = PipelineConfig {
            youtube_api_key: args.api_key.clone().filter(|key| !key.is_empty()),
            default_output_dir: args.output_dir.clone(),
            failure_policy,
            max_concurrent_tracks: args.max_concurrent,
            ..Default::default()
        };

        let preferences_path = args.preferences.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join(PREFERENCES_FILE)
        });

        Self {
            pipeline,
            preferences_path,
        }
    }
}
