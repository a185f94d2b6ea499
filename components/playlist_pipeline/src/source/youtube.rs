// components/playlist_pipeline/src/source/youtube.rs
//! "video-host" backend backed by the YouTube Data API v3.
//!
//! One `playlistItems.list` call yields the video ids, one `videos.list` call
//! yields the details. Only the first page (50 items) is read.

use crate::error::{PipelineError, Result};
use crate::source::SourceResolver;
use crate::types::{PlaylistReference, TrackMetadata};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const NAME: &str = "video-host";
const MAX_RESULTS: &str = "50";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

pub struct YouTubeSource {
    client: reqwest::Client,
    api_base: Url,
    api_key: String,
}

impl YouTubeSource {
    pub fn new(api_base: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| PipelineError::resolution(NAME, format!("invalid API base '{api_base}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::resolution(NAME, e))?;

        Ok(Self {
            client,
            api_base,
            api_key: api_key.into(),
        })
    }

    /// The playlist id, if this reference is one YouTube can address
    fn addressable_id(reference: &PlaylistReference) -> Option<String> {
        if let Some(url) = reference.as_url() {
            let host = url.host_str()?;
            if !HOSTS.contains(&host) {
                return None;
            }
        }

        reference.playlist_id().filter(|id| {
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self
            .api_base
            .join(endpoint)
            .map_err(|e| PipelineError::resolution(NAME, e))?;

        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| PipelineError::resolution(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::resolution(
                NAME,
                format!("{endpoint} returned {status}: {body}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::resolution(NAME, e))
    }
}

#[async_trait]
impl SourceResolver for YouTubeSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn resolve(&self, reference: &PlaylistReference) -> Result<Vec<TrackMetadata>> {
        let playlist_id = Self::addressable_id(reference).ok_or_else(|| {
            PipelineError::resolution(NAME, format!("'{reference}' is not a YouTube playlist"))
        })?;

        let items: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("maxResults", MAX_RESULTS),
                    ("playlistId", playlist_id.as_str()),
                ],
            )
            .await?;

        let entries: Vec<Snippet> = items.items.into_iter().map(|i| i.snippet).collect();
        let ids: Vec<&str> = entries
            .iter()
            .map(|s| s.resource_id.video_id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        debug!(%playlist_id, videos = ids.len(), "Listed playlist items");

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids.join(",");
        let videos: ListResponse<Video> = self
            .get("videos", &[("part", "snippet"), ("id", joined.as_str())])
            .await?;
        let details: HashMap<String, Snippet> =
            videos.items.into_iter().map(|v| (v.id, v.snippet)).collect();

        Ok(entries
            .iter()
            .filter(|entry| !entry.resource_id.video_id.is_empty())
            .map(|entry| {
                let video_id = &entry.resource_id.video_id;
                // Private and deleted videos have no details; fall back to the item snippet
                details.get(video_id).unwrap_or(entry).to_track(video_id)
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    channel_title: String,
    thumbnails: Thumbnails,
    resource_id: ResourceId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ResourceId {
    video_id: String,
}

impl Snippet {
    fn to_track(&self, video_id: &str) -> TrackMetadata {
        TrackMetadata {
            thumbnail_url: self
                .thumbnails
                .default
                .as_ref()
                .map(|t| t.url.clone())
                .unwrap_or_default(),
            title: self.title.clone(),
            author_label: self.channel_title.clone(),
            source_locator: format!("{WATCH_URL}{video_id}"),
        }
    }
}
