//! Typed contract with the streaming-service API.
//!
//! The request/response shapes here are the external boundary: the
//! resolver and assemblers consume the [`SpotifyApi`] trait only, so
//! tests substitute an in-memory implementation and the HTTP transport
//! stays swappable.

mod client;
mod models;
#[cfg(test)]
pub mod testing;

pub use client::{ApiConfig, HttpSpotifyApi};
pub use models::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Content kind tag sent with a license challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Audio,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
        }
    }
}

/// Paginated GraphQL-like endpoints plus the streaming side channels
/// (manifests, seek tables, license exchange).
///
/// Paginated methods return one page at `offset`; the caller keeps
/// fetching until the running item count reaches the page's
/// `total_count`.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn get_track(&self, track_id: &str) -> Result<TrackUnion, ApiError>;

    async fn get_episode(&self, episode_id: &str) -> Result<EpisodeUnion, ApiError>;

    async fn get_album(&self, album_id: &str, offset: usize) -> Result<AlbumUnion, ApiError>;

    async fn get_show(&self, show_id: &str, offset: usize) -> Result<ShowUnion, ApiError>;

    async fn get_playlist(&self, playlist_id: &str, offset: usize)
    -> Result<PlaylistUnion, ApiError>;

    async fn get_artist_albums(
        &self,
        artist_id: &str,
        collection: ArtistCollection,
        offset: usize,
    ) -> Result<Page<ArtistAlbumItem>, ApiError>;

    /// Playback manifest for one item, or `None` when the service
    /// offers no media for it.
    async fn get_playback_info(
        &self,
        media_id: &str,
        media_kind: &str,
    ) -> Result<Option<PlaybackInfo>, ApiError>;

    async fn get_audio_stream_urls(&self, file_id: &str) -> Result<StreamUrls, ApiError>;

    async fn get_seek_table(&self, file_id: &str) -> Result<SeekTable, ApiError>;

    async fn get_video_manifest(&self, file_id: &str) -> Result<VideoManifest, ApiError>;

    async fn get_widevine_license(
        &self,
        challenge: &[u8],
        content_kind: ContentKind,
    ) -> Result<Vec<u8>, ApiError>;

    /// Lyrics for a track; the endpoint 404s for tracks without any.
    async fn get_lyrics(&self, track_id: &str) -> Result<Option<LyricsResponse>, ApiError>;

    async fn get_track_credits(&self, track_id: &str) -> Result<TrackCredits, ApiError>;

    async fn get_gid_metadata(
        &self,
        media_id: &str,
        media_kind: &str,
    ) -> Result<GidMetadata, ApiError>;

    /// Whether the authenticated session carries premium entitlement.
    fn has_premium(&self) -> bool;
}
