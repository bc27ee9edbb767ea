//! Wire models for the streaming-service API.
//!
//! GraphQL unions carry a `__typename` discriminator; unknown variants
//! deserialize to a `NotFound`/`Unknown` arm so that a deleted or
//! region-blocked item surfaces as a typed per-item failure instead of
//! a parse error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a paginated collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playability {
    pub playable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRating {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsoDate {
    pub iso_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverArt {
    pub sources: Vec<CoverSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverSource {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEntity {
    pub name: String,
}

// --- tracks and albums ---------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum TrackUnion {
    Track(TrackData),
    #[serde(other)]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub track_number: Option<u32>,
    pub playability: Playability,
    #[serde(default)]
    pub content_rating: Option<ContentRating>,
    #[serde(default)]
    pub album_of_track: Option<AlbumData>,
}

impl TrackData {
    pub fn id(&self) -> &str {
        uri_id(&self.uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum AlbumUnion {
    Album(AlbumData),
    #[serde(other)]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumData {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<IsoDate>,
    #[serde(default)]
    pub copyright: Option<CopyrightList>,
    #[serde(rename = "type", default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub cover_art: Option<CoverArt>,
    #[serde(default)]
    pub tracks_v2: Option<Page<AlbumTrackItem>>,
}

impl AlbumData {
    pub fn id(&self) -> &str {
        uri_id(&self.uri)
    }

    pub fn is_compilation(&self) -> bool {
        self.album_type.as_deref() == Some("COMPILATION")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumTrackItem {
    pub track: TrackData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyrightList {
    pub items: Vec<CopyrightItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyrightItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

// --- episodes and shows --------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum EpisodeUnion {
    Episode(EpisodeData),
    #[serde(other)]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeData {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_date: Option<IsoDate>,
    #[serde(default)]
    pub content_rating: Option<ContentRating>,
    #[serde(default)]
    pub cover_art: Option<CoverArt>,
    pub playability: Playability,
    #[serde(default)]
    pub podcast_v2: Option<PodcastRef>,
}

impl EpisodeData {
    pub fn id(&self) -> &str {
        uri_id(&self.uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastRef {
    pub data: PodcastRefData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastRefData {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum ShowUnion {
    Podcast(ShowData),
    #[serde(other)]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowData {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub episodes_v2: Option<Page<ShowEpisodeItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowEpisodeItem {
    pub entity: ShowEpisodeEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowEpisodeEntity {
    #[serde(rename = "_uri")]
    pub uri: String,
    pub data: EpisodeData,
}

// --- playlists -----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum PlaylistUnion {
    Playlist(PlaylistData),
    #[serde(other)]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub uri: String,
    pub name: String,
    pub owner_v2: PlaylistOwner,
    pub content: Page<PlaylistItem>,
}

impl PlaylistData {
    pub fn id(&self) -> &str {
        uri_id(&self.uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub data: NamedEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub item_v2: PlaylistItemEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItemEntity {
    pub data: PlaylistEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum PlaylistEntry {
    Track(TrackData),
    Episode(EpisodeData),
    #[serde(other)]
    Unknown,
}

// --- artist discography --------------------------------------------------

/// Which sub-collection of an artist discography to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtistCollection {
    #[default]
    Albums,
    Singles,
    Compilations,
}

impl ArtistCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtistCollection::Albums => "albums",
            ArtistCollection::Singles => "singles",
            ArtistCollection::Compilations => "compilations",
        }
    }
}

impl std::str::FromStr for ArtistCollection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "albums" => Ok(ArtistCollection::Albums),
            "singles" => Ok(ArtistCollection::Singles),
            "compilations" => Ok(ArtistCollection::Compilations),
            other => Err(format!("unknown artist collection: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistAlbumItem {
    pub id: String,
}

// --- playback and stream manifests ---------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackInfo {
    pub metadata: PlaybackMetadata,
    pub manifest: PlaybackManifest,
}

impl PlaybackInfo {
    pub fn media_id(&self) -> &str {
        uri_id(&self.metadata.uri)
    }

    pub fn is_video(&self) -> bool {
        !self.manifest.manifest_ids_video.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackMetadata {
    pub uri: String,
}

/// Declared encoded representations of one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackManifest {
    #[serde(default)]
    pub file_ids_mp4: Vec<AudioFileEntry>,
    #[serde(default)]
    pub file_ids_ogg: Vec<AudioFileEntry>,
    #[serde(default)]
    pub manifest_ids_video: Vec<VideoManifestId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFileEntry {
    pub format: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoManifestId {
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamUrls {
    pub cdnurl: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeekTable {
    pub pssh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoManifest {
    pub contents: Vec<VideoContent>,
    pub base_urls: Vec<String>,
    pub initialization_template: String,
    pub segment_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoContent {
    pub profiles: Vec<VideoProfile>,
    #[serde(default)]
    pub encryption_infos: Vec<EncryptionInfo>,
    pub end_time_millis: u64,
    pub segment_length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionInfo {
    pub key_system: String,
    #[serde(default)]
    pub encryption_data: Option<String>,
}

/// One encoding variant offered for a video item's tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProfile {
    pub id: u64,
    pub file_type: String,
    pub mime_type: String,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub video_width: Option<u32>,
    #[serde(default)]
    pub video_height: Option<u32>,
    #[serde(default)]
    pub video_bitrate: Option<u64>,
    #[serde(default)]
    pub audio_bitrate: Option<u64>,
    /// Which entries of `encryption_infos` this profile is bound to.
    /// Absent means the profile works with any encryption index.
    #[serde(default)]
    pub encryption_indices: Option<Vec<usize>>,
}

// --- lyrics, credits, gid metadata ---------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsResponse {
    pub lyrics: LyricsData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsData {
    pub sync_type: String,
    pub lines: Vec<LyricLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    pub start_time_ms: String,
    pub words: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackCredits {
    #[serde(default)]
    pub role_credits: Vec<RoleCredit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCredit {
    pub role_title: String,
    #[serde(default)]
    pub artists: Vec<NamedEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GidMetadata {
    #[serde(default)]
    pub external_id: Vec<ExternalId>,
    #[serde(default)]
    pub album: Option<GidAlbum>,
    #[serde(default)]
    pub artist: Vec<NamedEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalId {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GidAlbum {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub artist: Vec<NamedEntity>,
}

/// Last segment of a `spotify:kind:id` URI.
pub fn uri_id(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

/// Raw metadata blob for a descriptor; falls back to null on
/// unserializable input, which cannot happen for these derive types.
pub fn to_metadata_blob<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_union_unknown_typename_is_not_found() {
        let json = r#"{"__typename": "NotFoundResponse", "message": "gone"}"#;
        let union: TrackUnion = serde_json::from_str(json).unwrap();
        assert!(matches!(union, TrackUnion::NotFound));
    }

    #[test]
    fn track_union_parses_track() {
        let json = r#"{
            "__typename": "Track",
            "uri": "spotify:track:4cOdK2wGLETKBW3PvgPWqT",
            "name": "Example",
            "trackNumber": 4,
            "playability": {"playable": true}
        }"#;
        let union: TrackUnion = serde_json::from_str(json).unwrap();
        let TrackUnion::Track(track) = union else {
            panic!("expected track");
        };
        assert_eq!(track.id(), "4cOdK2wGLETKBW3PvgPWqT");
        assert_eq!(track.track_number, Some(4));
    }

    #[test]
    fn playlist_entry_tolerates_local_files() {
        let json = r#"{"__typename": "LocalTrack", "uri": "local:123"}"#;
        let entry: PlaylistEntry = serde_json::from_str(json).unwrap();
        assert!(matches!(entry, PlaylistEntry::Unknown));
    }

    #[test]
    fn uri_id_takes_last_segment() {
        assert_eq!(uri_id("spotify:track:abc123"), "abc123");
        assert_eq!(uri_id("bare"), "bare");
    }
}
