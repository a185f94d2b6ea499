// components/playlist_pipeline/src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

/// A playlist as the user typed it: either a URL or a bare identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistReference(String);

impl PlaylistReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parsed URL, when the reference is one
    pub fn as_url(&self) -> Option<Url> {
        Url::parse(&self.0)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
    }

    /// The playlist identifier: the `list` query parameter of a URL, or the bare reference itself
    pub fn playlist_id(&self) -> Option<String> {
        match self.as_url() {
            Some(url) => url
                .query_pairs()
                .find(|(key, _)| key == "list")
                .map(|(_, value)| value.into_owned())
                .filter(|id| !id.is_empty()),
            None if self.0.is_empty() => None,
            None => Some(self.0.clone()),
        }
    }
}

impl std::fmt::Display for PlaylistReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistReference {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

/// One entry of a resolved playlist. Missing backend fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub thumbnail_url: String,
    pub title: String,
    pub author_label: String,
    /// What the media fetcher needs to download this track
    pub source_locator: String,
}

/// Indices into the current playlist that the user picked for download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    track_count: usize,
    selected: BTreeSet<usize>,
}

impl SelectionSet {
    pub fn new(track_count: usize) -> Self {
        Self {
            track_count,
            selected: BTreeSet::new(),
        }
    }

    pub fn toggle(&mut self, index: usize) {
        if index >= self.track_count {
            return;
        }
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
    }

    /// Select everything, or clear when everything is already selected
    pub fn toggle_all(&mut self) {
        if self.selected.len() == self.track_count {
            self.selected.clear();
        } else {
            self.selected = (0..self.track_count).collect();
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Locators of the selected tracks, in playlist order
    pub fn selected_locators(&self, tracks: &[TrackMetadata]) -> Vec<String> {
        self.selected
            .iter()
            .filter_map(|&i| tracks.get(i))
            .map(|track| track.source_locator.clone())
            .collect()
    }
}

/// The playlist currently shown to the user together with its selection
#[derive(Debug, Clone, Default)]
pub struct PlaylistSession {
    tracks: Vec<TrackMetadata>,
    pub selection: SelectionSet,
}

impl PlaylistSession {
    pub fn new(tracks: Vec<TrackMetadata>) -> Self {
        let selection = SelectionSet::new(tracks.len());
        Self { tracks, selection }
    }

    /// Swap in a freshly resolved playlist; the old selection no longer applies
    pub fn replace_tracks(&mut self, tracks: Vec<TrackMetadata>) {
        self.selection = SelectionSet::new(tracks.len());
        self.tracks = tracks;
    }

    pub fn tracks(&self) -> &[TrackMetadata] {
        &self.tracks
    }

    pub fn selected_locators(&self) -> Vec<String> {
        self.selection.selected_locators(&self.tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn track(locator: &str) -> TrackMetadata {
        TrackMetadata {
            source_locator: locator.to_string(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("PL123abc", Some("PL123abc"))]
    #[case("  PL123abc  ", Some("PL123abc"))]
    #[case("https://www.youtube.com/playlist?list=PLxyz", Some("PLxyz"))]
    #[case("https://www.youtube.com/watch?v=abc&list=PLxyz&index=2", Some("PLxyz"))]
    #[case("https://soundcloud.com/artist/sets/album", None)]
    #[case("", None)]
    fn test_playlist_id(#[case] reference: &str, #[case] expected: Option<&str>) {
        let reference = PlaylistReference::new(reference);
        assert_eq!(reference.playlist_id().as_deref(), expected);
    }

    #[test]
    fn test_bare_id_is_not_a_url() {
        assert!(PlaylistReference::new("abc123").as_url().is_none());
        assert!(PlaylistReference::new("https://example.com/x").as_url().is_some());
    }

    #[test]
    fn test_toggle_selection() {
        let mut selection = SelectionSet::new(3);
        selection.toggle(1);
        selection.toggle(2);
        selection.toggle(1);
        selection.toggle(7);

        assert!(!selection.is_selected(1));
        assert!(selection.is_selected(2));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_toggle_all_selects_then_clears() {
        let mut selection = SelectionSet::new(3);
        selection.toggle(0);
        selection.toggle_all();
        assert_eq!(selection.len(), 3);

        selection.toggle_all();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_selected_locators_keep_playlist_order_and_duplicates() {
        let tracks = vec![track("a"), track("b"), track("a")];
        let mut selection = SelectionSet::new(tracks.len());
        selection.toggle(2);
        selection.toggle(0);

        assert_eq!(selection.selected_locators(&tracks), vec!["a", "a"]);
    }

    #[test]
    fn test_replacing_tracks_clears_selection() {
        let mut session = PlaylistSession::new(vec![track("a"), track("b")]);
        session.selection.toggle_all();
        assert_eq!(session.selected_locators().len(), 2);

        session.replace_tracks(vec![track("c")]);
        assert!(session.selection.is_empty());
        assert_eq!(session.tracks().len(), 1);
    }
}
