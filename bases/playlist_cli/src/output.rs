// bases/playlist_cli/src/output.rs
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use playlist_pipeline::{BatchSummary, PlaylistReference, TrackMetadata};
use std::path::Path;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} {msg}";

pub struct OutputHandler {
    verbose: bool,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn print_resolving(&self, reference: &PlaylistReference) {
        println!("Looking up playlist: {}", reference);
    }

    pub fn print_playlist(&self, tracks: &[TrackMetadata]) {
        println!("Found {} tracks:", tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            println!("{:>4}. {} - {}", i + 1, track.author_label, track.title);
            if self.verbose {
                println!("      {}", track.source_locator);
            }
        }
    }

    pub fn print_download_start(&self, count: usize) {
        println!("\nDownloading {} tracks...", count);
    }

    /// Progress bar for one batch, drawn on stderr
    pub fn batch_progress(&self) -> BatchProgress {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("━━╌"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        BatchProgress::new(bar)
    }

    pub fn print_summary(&self, summary: &BatchSummary) {
        println!("\n{}", summary_line(summary));
        if !summary.failed.is_empty() {
            println!("{} tracks failed:", summary.failed.len());
            for (index, reason) in &summary.failed {
                println!("  {}: {}", index + 1, reason);
            }
        }
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        eprintln!("Error: {}", error);

        if self.verbose {
            eprintln!("\nError details:");
            error.chain().skip(1).for_each(|cause| {
                eprintln!("  caused by: {}", cause);
            });
        }
    }
}

/// Batch-wide byte progress. Per-track lines print above the bar.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn total_size_known(&self, total: u64) {
        self.bar.set_length(total);
    }

    pub fn chunk(&self, delta: u64) {
        self.bar.inc(delta);
    }

    pub fn track_finished(&self, path: &Path) {
        self.bar.println(format!("Saved: {}", path.display()));
    }

    pub fn track_failed(&self, index: usize, reason: &str) {
        self.bar
            .println(format!("Skipped track {}: {}", index + 1, reason));
    }

    pub fn complete(&self) {
        self.bar.finish_with_message("done");
    }

    /// Leave the bar where it stopped
    pub fn halted(&self, reason: &str) {
        self.bar.abandon_with_message(format!("halted: {reason}"));
    }
}

fn summary_line(summary: &BatchSummary) -> String {
    format!(
        "Done: {} tracks saved, {} downloaded",
        summary.outputs.len(),
        HumanBytes(summary.downloaded)
    )
}
