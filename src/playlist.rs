//! Playlist loading and the circular playback cursor.
//!
//! The playlist document is fetched once at startup, either over HTTP or
//! from the local filesystem, and is never re-fetched during a session.

use crate::error::PlaylistError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// Extensions treated as still images when an item has no explicit type.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];

/// Kind of media an item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    /// Infer the media type from the file extension of `url`.
    ///
    /// Query strings and fragments are ignored. Anything that is not a known
    /// image extension is treated as video.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);

        let is_image = file_name
            .rsplit_once('.')
            .map(|(_, ext)| {
                let ext = ext.to_ascii_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);

        if is_image {
            MediaType::Image
        } else {
            MediaType::Video
        }
    }
}

/// Represents a media item from the playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub media_type: Option<MediaType>,
    /// Display time in milliseconds. Only used for images.
    #[serde(default)]
    pub duration: Option<u64>,
}

impl PlaylistItem {
    /// Create a video or image item with no description, typed from its extension.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            media_type: None,
            duration: None,
        }
    }

    /// The explicit `type` if present, otherwise the type inferred from the URL.
    pub fn resolved_type(&self) -> MediaType {
        self.media_type.unwrap_or_else(|| MediaType::from_url(&self.url))
    }

    /// Check if this is a still image.
    pub fn is_image(&self) -> bool {
        self.resolved_type() == MediaType::Image
    }

    /// Human-readable name used in transition logs: the description, or the URL.
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.url)
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistDocument {
    #[serde(default)]
    playlist: Option<Vec<PlaylistItem>>,
}

/// An ordered, non-empty list of items.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
}

impl Playlist {
    /// Build a playlist, rejecting an empty item list.
    pub fn new(items: Vec<PlaylistItem>) -> Result<Self, PlaylistError> {
        if items.is_empty() {
            return Err(PlaylistError::EmptyPlaylist);
        }
        Ok(Self { items })
    }

    /// Parse a `{ "playlist": [...] }` document.
    pub fn parse(bytes: &[u8]) -> Result<Self, PlaylistError> {
        let document: PlaylistDocument = serde_json::from_slice(bytes)?;
        Self::new(document.playlist.unwrap_or_default())
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Never true: construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }
}

/// Circular position within a [`Playlist`]. The index is always in `[0, len)`.
#[derive(Debug, Clone)]
pub struct PlaylistCursor {
    playlist: Playlist,
    index: usize,
}

impl PlaylistCursor {
    pub fn new(playlist: Playlist) -> Self {
        Self { playlist, index: 0 }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn current(&self) -> &PlaylistItem {
        &self.playlist.items[self.index]
    }

    pub fn item(&self, index: usize) -> Option<&PlaylistItem> {
        self.playlist.get(index)
    }

    pub fn next_index(&self) -> usize {
        (self.index + 1) % self.len()
    }

    pub fn previous_index(&self) -> usize {
        if self.index == 0 {
            self.len() - 1
        } else {
            self.index - 1
        }
    }

    /// Move to the next item, wrapping from the last to the first.
    pub fn advance(&mut self) -> &PlaylistItem {
        self.index = self.next_index();
        self.current()
    }

    /// Jump to `index`. Out-of-range indices are ignored.
    pub fn set_index(&mut self, index: usize) -> bool {
        if index < self.len() {
            self.index = index;
            true
        } else {
            false
        }
    }
}

/// Where the playlist document lives. Item URLs resolve relative to it.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistSource {
    Remote(Url),
    Local(PathBuf),
}

/// A resolved media location.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaLocation {
    Remote(Url),
    Local(PathBuf),
}

impl PlaylistSource {
    /// http(s) URLs are remote; anything else is a filesystem path.
    pub fn parse(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                PlaylistSource::Remote(url)
            }
            _ => PlaylistSource::Local(PathBuf::from(location)),
        }
    }

    /// Resolve an item URL against the playlist document location.
    pub fn resolve(&self, item_url: &str) -> MediaLocation {
        if let Ok(url) = Url::parse(item_url) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return MediaLocation::Local(path);
                }
            }
            return MediaLocation::Remote(url);
        }

        match self {
            PlaylistSource::Remote(base) => match base.join(item_url) {
                Ok(url) => MediaLocation::Remote(url),
                Err(_) => MediaLocation::Local(PathBuf::from(item_url)),
            },
            PlaylistSource::Local(path) => {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                MediaLocation::Local(base.join(item_url))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PlaylistSource::Remote(url) => url.to_string(),
            PlaylistSource::Local(path) => path.display().to_string(),
        }
    }
}

/// Resets the in-flight flag even if the load future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fetches and parses the playlist document.
pub struct PlaylistLoader {
    source: PlaylistSource,
    client: reqwest::Client,
    in_flight: AtomicBool,
}

impl PlaylistLoader {
    pub fn new(source: PlaylistSource, client: reqwest::Client) -> Self {
        Self {
            source,
            client,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &PlaylistSource {
        &self.source
    }

    /// Load the playlist.
    ///
    /// Returns `Ok(None)` without doing anything if another load is already
    /// in flight.
    pub async fn load(&self) -> Result<Option<Playlist>, PlaylistError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Playlist load already in progress, ignoring request");
            return Ok(None);
        }
        let _guard = InFlight(&self.in_flight);

        let bytes = self.fetch().await?;
        let playlist = Playlist::parse(&bytes)?;
        tracing::info!(
            "Loaded playlist with {} items from {}",
            playlist.len(),
            self.source.describe()
        );
        Ok(Some(playlist))
    }

    async fn fetch(&self) -> Result<Vec<u8>, PlaylistError> {
        let location = self.source.describe();
        let fetch_failed = |reason: String| PlaylistError::FetchFailed {
            location: location.clone(),
            reason,
        };

        match &self.source {
            PlaylistSource::Remote(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| fetch_failed(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| fetch_failed(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            PlaylistSource::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| fetch_failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn playlist_of(n: usize) -> Playlist {
        Playlist::new((0..n).map(|i| PlaylistItem::new(format!("{i}.mp4"))).collect()).unwrap()
    }

    #[test]
    fn advance_wraps_after_len_calls() {
        for n in 1..=5 {
            let mut cursor = PlaylistCursor::new(playlist_of(n));
            let mut seen = vec![cursor.index()];
            for _ in 0..n {
                cursor.advance();
                seen.push(cursor.index());
            }
            let expected: Vec<usize> = (0..n).chain(std::iter::once(0)).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn previous_index_wraps_at_start() {
        let mut cursor = PlaylistCursor::new(playlist_of(4));
        assert_eq!(cursor.previous_index(), 3);
        cursor.advance();
        assert_eq!(cursor.previous_index(), 0);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.previous_index(), 2);

        let single = PlaylistCursor::new(playlist_of(1));
        assert_eq!(single.previous_index(), 0);
    }

    #[test]
    fn set_index_ignores_out_of_range() {
        let mut cursor = PlaylistCursor::new(playlist_of(3));
        assert!(cursor.set_index(2));
        assert!(!cursor.set_index(3));
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.next_index(), 0);
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(MediaType::from_url("media/photo.png"), MediaType::Image);
        assert_eq!(MediaType::from_url("clip.mp4"), MediaType::Video);
        assert_eq!(MediaType::from_url("https://cdn.example.com/a/B.JPEG?x=1#top"), MediaType::Image);
        assert_eq!(MediaType::from_url("https://example.com/stream"), MediaType::Video);
        assert_eq!(MediaType::from_url("dir.png/clip"), MediaType::Video);
    }

    #[test]
    fn explicit_type_wins_over_extension() {
        let item: PlaylistItem =
            serde_json::from_str(r#"{"url": "poster.png", "type": "video"}"#).unwrap();
        assert_eq!(item.resolved_type(), MediaType::Video);
        assert!(!item.is_image());
    }

    #[test]
    fn parse_rejects_missing_and_empty_playlists() {
        assert!(matches!(Playlist::parse(br#"{"playlist": []}"#), Err(PlaylistError::EmptyPlaylist)));
        assert!(matches!(Playlist::parse(br#"{}"#), Err(PlaylistError::EmptyPlaylist)));
        assert!(matches!(Playlist::parse(br#"{"playlist": null}"#), Err(PlaylistError::EmptyPlaylist)));
        assert!(matches!(Playlist::parse(b"not json"), Err(PlaylistError::ParseFailed(_))));
    }

    #[test]
    fn parse_reads_all_fields() {
        let playlist = Playlist::parse(
            br#"{"playlist": [
                {"url": "a.mp4", "description": "Intro"},
                {"url": "b.jpg", "duration": 2000}
            ]}"#,
        )
        .unwrap();
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.items()[0].label(), "Intro");
        assert_eq!(playlist.items()[1].label(), "b.jpg");
        assert_eq!(playlist.items()[1].duration, Some(2000));
        assert!(playlist.items()[1].is_image());
    }

    #[test]
    fn resolve_relative_to_source() {
        let remote = PlaylistSource::parse("https://tv.example.com/content/playlist.json");
        assert_eq!(
            remote.resolve("videos/a.mp4"),
            MediaLocation::Remote(Url::parse("https://tv.example.com/content/videos/a.mp4").unwrap())
        );

        let local = PlaylistSource::parse("/srv/kiosk/playlist.json");
        assert_eq!(local.resolve("b.jpg"), MediaLocation::Local(PathBuf::from("/srv/kiosk/b.jpg")));
        assert_eq!(
            local.resolve("https://cdn.example.com/c.mp4"),
            MediaLocation::Remote(Url::parse("https://cdn.example.com/c.mp4").unwrap())
        );
    }

    #[tokio::test]
    async fn load_reads_local_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"playlist": [{{"url": "a.mp4"}}]}}"#).unwrap();

        let loader = PlaylistLoader::new(
            PlaylistSource::Local(file.path().to_path_buf()),
            reqwest::Client::new(),
        );
        let playlist = loader.load().await.unwrap().unwrap();
        assert_eq!(playlist.len(), 1);

        // The in-flight flag is released after completion.
        assert!(loader.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_loads_are_coalesced() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"playlist": [{{"url": "a.mp4"}}]}}"#).unwrap();

        let loader = PlaylistLoader::new(
            PlaylistSource::Local(file.path().to_path_buf()),
            reqwest::Client::new(),
        );
        let (first, second) = tokio::join!(loader.load(), loader.load());
        assert!(first.unwrap().is_some());
        assert!(second.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_reports_unreachable_document() {
        let loader = PlaylistLoader::new(
            PlaylistSource::Local(PathBuf::from("/nonexistent/playlist.json")),
            reqwest::Client::new(),
        );
        assert!(matches!(loader.load().await, Err(PlaylistError::FetchFailed { .. })));
    }
}
