// components/playlist_pipeline/src/ytdlp.rs
use crate::error::{PipelineError, Result};
use crate::fetch::{ByteStream, FetchedMedia, MediaFetcher};
use crate::source::SourceResolver;
use crate::types::{PlaylistReference, TrackMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

const NAME: &str = "audio-host";
const AUDIO_FORMAT: &str = "bestaudio/best";

/// Thin wrapper around the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn check_available(&self) -> Result<()> {
        which::which(&self.binary)
            .map(|_| ())
            .map_err(|_| PipelineError::DependencyNotFound("yt-dlp"))
    }

    /// Run yt-dlp to completion and return its stdout
    async fn json(&self, args: &[&str], url: &str) -> std::result::Result<Vec<u8>, String> {
        let output = Command::new(&self.binary)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(output.stdout)
    }

    /// Raw audio bytes from yt-dlp's stdout. The process starts on first poll.
    fn audio_stream(&self, locator: &str) -> ByteStream {
        let binary = self.binary.clone();
        let locator = locator.to_string();

        Box::pin(async_stream::stream! {
            let spawned = Command::new(&binary)
                .args(["--quiet", "--no-warnings", "--no-playlist", "--no-progress"])
                .args(["-f", AUDIO_FORMAT, "-o", "-"])
                .arg(&locator)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    yield Err::<Bytes, PipelineError>(PipelineError::fetch(&locator, e));
                    return;
                }
            };

            if let Some(stdout) = child.stdout.take() {
                let mut chunks = ReaderStream::new(stdout);
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(bytes) => yield Ok(bytes),
                        Err(e) => {
                            yield Err(PipelineError::fetch(&locator, e));
                            return;
                        }
                    }
                }
            }

            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    yield Err(PipelineError::fetch(&locator, stderr));
                }
                Err(e) => yield Err(PipelineError::fetch(&locator, e)),
            }
        })
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// "audio-host" backend: any site yt-dlp can list a playlist from
pub struct YtDlpSource {
    ytdlp: YtDlp,
}

impl YtDlpSource {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }
}

#[async_trait]
impl SourceResolver for YtDlpSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn resolve(&self, reference: &PlaylistReference) -> Result<Vec<TrackMetadata>> {
        // Bare identifiers mean nothing to yt-dlp without a site
        let url = reference
            .as_url()
            .ok_or_else(|| PipelineError::resolution(NAME, format!("'{reference}' is not a URL")))?;
        self.ytdlp
            .check_available()
            .map_err(|e| PipelineError::resolution(NAME, e))?;

        let raw = self
            .ytdlp
            .json(&["--flat-playlist", "--dump-single-json", "--no-warnings"], url.as_str())
            .await
            .map_err(|e| PipelineError::resolution(NAME, e))?;

        let tracks = parse_flat_playlist(&raw)?;
        debug!(%reference, tracks = tracks.len(), "yt-dlp listed playlist");
        Ok(tracks)
    }
}

/// Fetches tracks through yt-dlp: `--dump-json` for size and title, then
/// `-o -` for the bytes
pub struct YtDlpFetcher {
    ytdlp: YtDlp,
}

impl YtDlpFetcher {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn check_available(&self) -> Result<()> {
        self.ytdlp.check_available()
    }

    async fn fetch(&self, locator: &str) -> Result<FetchedMedia> {
        let raw = self
            .ytdlp
            .json(
                &["--dump-json", "--no-download", "--no-playlist", "--no-warnings", "-f", AUDIO_FORMAT],
                locator,
            )
            .await
            .map_err(|e| PipelineError::fetch(locator, e))?;

        let info: MediaInfo =
            serde_json::from_slice(&raw).map_err(|e| PipelineError::fetch(locator, e))?;
        let size_hint = info.size_hint();
        if size_hint == 0 {
            warn!(%locator, "Source did not declare a size");
        }

        Ok(FetchedMedia {
            size_hint,
            display_name: info.title,
            stream: self.ytdlp.audio_stream(locator),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    #[serde(default)]
    title: String,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

impl MediaInfo {
    fn size_hint(&self) -> u64 {
        self.filesize
            .or(self.filesize_approx)
            .filter(|size| size.is_finite() && *size > 0.0)
            .map(|size| size as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatPlaylist {
    entries: Vec<FlatEntry>,
    uploader: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatEntry {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Vec<FlatThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatThumbnail {
    url: String,
}

fn parse_flat_playlist(raw: &[u8]) -> Result<Vec<TrackMetadata>> {
    let playlist: FlatPlaylist =
        serde_json::from_slice(raw).map_err(|e| PipelineError::resolution(NAME, e))?;
    let playlist_uploader = playlist.uploader.unwrap_or_default();

    Ok(playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let locator = entry.webpage_url.or(entry.url)?;
            Some(TrackMetadata {
                thumbnail_url: entry
                    .thumbnail
                    .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url))
                    .unwrap_or_default(),
                title: entry.title.unwrap_or_default(),
                author_label: entry
                    .uploader
                    .or(entry.channel)
                    .unwrap_or_else(|| playlist_uploader.clone()),
                source_locator: locator,
            })
        })
        .collect())
}
