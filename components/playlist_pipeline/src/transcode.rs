// components/playlist_pipeline/src/transcode.rs
use crate::error::{PipelineError, Result};
use crate::fetch::ByteStream;
use async_trait::async_trait;
use futures::{Future, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Every batch produces MP3 at the highest VBR quality
pub const TARGET_EXTENSION: &str = "mp3";
const TARGET_FORMAT: &str = "mp3";
const AUDIO_QUALITY: &str = "0";

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Consume `input` and write the finished audio file to `output`.
    ///
    /// Returns once the file is complete. A failing input stream surfaces as
    /// the stream's own error. Whatever is left at `output` after a failure is
    /// removed by [`TranscodePipeline`].
    async fn transcode(&self, input: ByteStream, output: &Path) -> Result<()>;
}

/// Transcodes by piping the stream into an `ffmpeg` child process
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn check_available(&self) -> Result<()> {
        which::which(&self.binary)
            .map(|_| ())
            .map_err(|_| PipelineError::DependencyNotFound("ffmpeg"))
    }

    async fn transcode(&self, input: ByteStream, output: &Path) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-i", "pipe:0", "-vn"])
            .args(["-f", TARGET_FORMAT, "-q:a", AUDIO_QUALITY])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::transcode(output, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::transcode(output, "ffmpeg stdin unavailable"))?;

        let (fed, finished) = tokio::join!(feed_stdin(input, stdin), child.wait_with_output());
        let finished = finished.map_err(|e| PipelineError::transcode(output, e))?;

        let write_error = fed?;
        if !finished.status.success() {
            return Err(PipelineError::transcode(
                output,
                String::from_utf8_lossy(&finished.stderr).trim(),
            ));
        }
        if let Some(e) = write_error {
            return Err(PipelineError::transcode(output, e));
        }

        Ok(())
    }
}

/// Copy the stream into ffmpeg's stdin.
///
/// `Ok(Some(_))` means ffmpeg stopped reading early; its exit status explains why.
async fn feed_stdin(
    mut input: ByteStream,
    mut stdin: tokio::process::ChildStdin,
) -> Result<Option<std::io::Error>> {
    while let Some(chunk) = input.next().await {
        if let Err(e) = stdin.write_all(&chunk?).await {
            return Ok(Some(e));
        }
    }
    stdin.shutdown().await.ok();
    Ok(None)
}

/// Names output files inside one destination directory and drives the
/// transcoder for each track of a batch
pub struct TranscodePipeline {
    transcoder: Arc<dyn Transcoder>,
    destination: PathBuf,
    used_names: HashMap<String, usize>,
}

impl TranscodePipeline {
    pub fn new(transcoder: Arc<dyn Transcoder>, destination: impl Into<PathBuf>) -> Self {
        Self {
            transcoder,
            destination: destination.into(),
            used_names: HashMap::new(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// `<destination>/<name>.mp3`, with a numeric suffix when the name is
    /// already taken in this batch
    pub fn output_path(&mut self, display_name: &str) -> PathBuf {
        let mut base = sanitize_filename::sanitize(display_name.trim());
        if base.is_empty() {
            base = "track".to_string();
        }

        let seen = self.used_names.entry(base.to_lowercase()).or_insert(0);
        *seen += 1;
        let file_name = match *seen {
            1 => format!("{base}.{TARGET_EXTENSION}"),
            n => format!("{base} ({n}).{TARGET_EXTENSION}"),
        };
        self.destination.join(file_name)
    }

    /// Transcode one track. The returned future owns everything it needs and
    /// resolves to the output path once the file is written.
    pub fn transcode(
        &self,
        input: ByteStream,
        output: PathBuf,
    ) -> impl Future<Output = Result<PathBuf>> + Send + 'static {
        let transcoder = Arc::clone(&self.transcoder);
        async move {
            debug!(output = %output.display(), "Transcoding");
            let partial = PartialOutput::new(&output);
            transcoder.transcode(input, &output).await?;
            partial.finish();
            Ok(output)
        }
    }
}

/// Removes a half-written output file unless the transcode finished.
///
/// Dropping it on the error path, on a panic or with the whole transcode
/// future (batch halted or cancelled) deletes the file.
struct PartialOutput<'a> {
    path: &'a Path,
    finished: bool,
}

impl<'a> PartialOutput<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for PartialOutput<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!(output = %self.path.display(), "Removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(output = %self.path.display(), error = %e, "Could not remove partial output"),
        }
    }
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Writes the raw input bytes to the output file
    #[derive(Default)]
    pub struct TranscoderStub {
        /// Transcodes of these file stems wait until notified
        pub gates: HashMap<String, Arc<Notify>>,
        pub fail_for: HashSet<String>,
        pub panic_for: HashSet<String>,
        /// Read whenever a transcode starts
        pub probe: Option<Arc<AtomicUsize>>,
        pub probe_at_start: Mutex<Vec<usize>>,
        pub started: AtomicUsize,
    }

    impl TranscoderStub {
        pub fn gated(mut self, stem: &str) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            self.gates.insert(stem.to_string(), Arc::clone(&gate));
            (self, gate)
        }

        pub fn failing_for(mut self, stem: &str) -> Self {
            self.fail_for.insert(stem.to_string());
            self
        }

        pub fn panicking_for(mut self, stem: &str) -> Self {
            self.panic_for.insert(stem.to_string());
            self
        }
    }

    #[async_trait]
    impl Transcoder for TranscoderStub {
        async fn transcode(&self, mut input: ByteStream, output: &Path) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if let Some(probe) = &self.probe {
                if let Ok(mut seen) = self.probe_at_start.lock() {
                    seen.push(probe.load(Ordering::SeqCst));
                }
            }

            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut written = Vec::new();
            while let Some(chunk) = input.next().await {
                written.extend_from_slice(&chunk?);
            }
            // Output exists from here on, like a real encoder mid-write
            std::fs::write(output, written)?;

            if let Some(gate) = self.gates.get(&stem) {
                gate.notified().await;
            }
            if self.panic_for.contains(&stem) {
                panic!("scripted panic for {stem}");
            }
            if self.fail_for.contains(&stem) {
                return Err(PipelineError::transcode(output, "scripted failure"));
            }
            Ok(())
        }
    }
}
