use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{KeyPair, MediaKind, StreamInfo, Tags};

/// Identity of the playlist an item was resolved through, plus its
/// 1-based position in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTags {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// 1-based position within the playlist.
    pub track: u32,
    pub track_total: u32,
}

/// Synced and unsynced lyric text for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lyrics {
    /// LRC-style line-timestamped text, when the source is line synced.
    pub synced: Option<String>,
    pub unsynced: Option<String>,
}

/// Fully resolved, immutable description of one downloadable item.
///
/// Built once by an assembler and consumed read-only by the staging
/// pipeline. A descriptor is only constructed once stream info and,
/// where the stream requires it, decryption material are both known;
/// partial descriptors never leave the assembler.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub media_id: String,
    pub kind: MediaKind,
    /// Raw item metadata as returned by the source API.
    pub metadata: Value,
    pub tags: Tags,
    pub playlist_tags: Option<PlaylistTags>,
    pub cover_url: String,
    pub lyrics: Option<Lyrics>,
    pub stream_info: StreamInfo,
    pub decryption_key: Option<KeyPair>,
}

impl MediaDescriptor {
    /// Display title for progress and error reporting.
    pub fn title(&self) -> &str {
        self.tags.title.as_deref().unwrap_or("Unknown Title")
    }

    /// Attach playlist identity to an item resolved through a playlist.
    pub fn with_playlist_tags(mut self, playlist_tags: PlaylistTags) -> MediaDescriptor {
        self.playlist_tags = Some(playlist_tags);
        self
    }
}
