// bases/playlist_cli/src/app.rs
use crate::args::Args;
use crate::config::Config;
use crate::output::OutputHandler;
use crate::picker::PromptDirectoryPicker;
use color_eyre::Result;
use playlist_pipeline::{
    BatchEvent, BatchHandle, JsonPreferenceStore, PlaylistPipeline, PlaylistReference,
    PlaylistSession,
};
use std::sync::Arc;
use tracing::{trace, warn};

pub struct App {
    args: Args,
    config: Config,
    output: OutputHandler,
}

impl App {
    pub fn new(args: Args) -> Self {
        let output = OutputHandler::new(args.verbose);
        let config = Config::from_args(&args);
        Self {
            args,
            config,
            output,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let pipeline = PlaylistPipeline::new(
            &self.config.pipeline,
            Arc::new(JsonPreferenceStore::new(&self.config.preferences_path)),
            Arc::new(PromptDirectoryPicker),
        )?;

        let reference = PlaylistReference::new(&self.args.reference);
        self.output.print_resolving(&reference);

        let tracks = pipeline.resolve_playlist(&reference).await?;
        let mut session = PlaylistSession::new(tracks);
        self.output.print_playlist(session.tracks());

        if self.args.list {
            return Ok(());
        }

        session.selection = self.args.selection(session.tracks().len())?;
        let locators = session.selected_locators();
        self.output.print_download_start(locators.len());

        let mut handle = pipeline.start_batch(locators)?;
        self.follow(&mut handle).await;

        let summary = handle.wait().await?;
        self.output.print_summary(&summary);
        Ok(())
    }

    /// Render batch events until the batch is over. Ctrl-C cancels it.
    async fn follow(&self, handle: &mut BatchHandle) {
        let progress = self.output.batch_progress();
        let mut interrupted = false;

        loop {
            let event = tokio::select! {
                event = handle.next_event() => event,
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    warn!("Interrupted, cancelling batch");
                    interrupted = true;
                    handle.cancel();
                    continue;
                }
            };

            let Some(event) = event else { break };
            trace!(?event, "Batch event");
            match event {
                BatchEvent::TotalSizeKnown(total) => progress.total_size_known(total),
                BatchEvent::ProgressChunk { delta, .. } => progress.chunk(delta),
                BatchEvent::TrackFinished { path, .. } => progress.track_finished(&path),
                BatchEvent::TrackFailed { index, reason } => progress.track_failed(index, &reason),
                BatchEvent::BatchComplete => {
                    progress.complete();
                    break;
                }
                BatchEvent::BatchFailed(reason) => {
                    progress.halted(&reason);
                    break;
                }
            }
        }
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        self.output.print_error(error);
    }
}
