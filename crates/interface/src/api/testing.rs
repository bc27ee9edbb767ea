//! In-memory [`SpotifyApi`] for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::models::*;
use super::{ApiError, ContentKind, SpotifyApi};

type LicenseFailure = Box<dyn Fn() -> ApiError + Send + Sync>;

/// Configurable stub backing the resolver, cache, and broker tests.
///
/// Lookups that miss return the union's `NotFound` arm (or an
/// `ApiError::Other` for non-union endpoints), mirroring what the real
/// client surfaces for deleted items.
#[derive(Default)]
pub struct StubApi {
    pub premium: bool,
    pub tracks: HashMap<String, TrackData>,
    pub episodes: HashMap<String, EpisodeData>,
    pub albums: HashMap<String, AlbumData>,
    pub shows: HashMap<String, ShowData>,
    pub playlists: HashMap<String, PlaylistData>,
    pub artist_albums: HashMap<String, Vec<ArtistAlbumItem>>,
    pub playback: HashMap<String, PlaybackInfo>,
    pub stream_urls: HashMap<String, StreamUrls>,
    pub seek_tables: HashMap<String, SeekTable>,
    pub video_manifests: HashMap<String, VideoManifest>,
    pub lyrics: HashMap<String, LyricsResponse>,
    pub credits: HashMap<String, TrackCredits>,
    pub gid_metadata: HashMap<String, GidMetadata>,
    pub license: Vec<u8>,
    page_size: usize,
    license_failure: Option<LicenseFailure>,
    album_calls: Arc<AtomicUsize>,
}

impl StubApi {
    /// Stub whose license endpoint always fails with the given error.
    pub fn failing_license<F>(f: F) -> StubApi
    where
        F: Fn() -> ApiError + Send + Sync + 'static,
    {
        StubApi {
            license_failure: Some(Box::new(f)),
            ..StubApi::default()
        }
    }

    /// Stub holding one album whose tracks carry the given numbers.
    pub fn with_album(album_id: &str, track_numbers: &[u32]) -> StubApi {
        let mut stub = StubApi::default();
        stub.add_album(album_id, track_numbers);
        stub
    }

    pub fn add_album(&mut self, album_id: &str, track_numbers: &[u32]) {
        let items = track_numbers
            .iter()
            .enumerate()
            .map(|(i, number)| AlbumTrackItem {
                track: track(&format!("{album_id}-t{i}"), &format!("Track {i}"), *number),
            })
            .collect::<Vec<_>>();
        self.albums.insert(
            album_id.to_string(),
            AlbumData {
                uri: format!("spotify:album:{album_id}"),
                name: Some("Stub Album".to_string()),
                date: Some(IsoDate {
                    iso_string: "2024-05-01T00:00:00Z".to_string(),
                }),
                copyright: None,
                album_type: Some("ALBUM".to_string()),
                cover_art: None,
                tracks_v2: Some(Page {
                    total_count: items.len(),
                    items,
                }),
            },
        );
    }

    /// Page size for the paginated endpoints; zero means everything in
    /// one page.
    pub fn page_size(mut self, size: usize) -> StubApi {
        self.page_size = size;
        self
    }

    pub fn premium(mut self, premium: bool) -> StubApi {
        self.premium = premium;
        self
    }

    /// Counter of `get_album` calls, shared out before the stub is
    /// erased behind `Arc<dyn SpotifyApi>`.
    pub fn album_call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.album_calls)
    }

    fn page_of<T: Clone>(&self, all: &[T], offset: usize, total: usize) -> Page<T> {
        let end = if self.page_size == 0 {
            all.len()
        } else {
            (offset + self.page_size).min(all.len())
        };
        let items = all.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
        Page {
            items,
            total_count: total,
        }
    }
}

/// Playable track fixture.
pub fn track(id: &str, name: &str, number: u32) -> TrackData {
    TrackData {
        uri: format!("spotify:track:{id}"),
        name: name.to_string(),
        track_number: Some(number),
        playability: Playability { playable: true },
        content_rating: None,
        album_of_track: None,
    }
}

/// Playable episode fixture.
pub fn episode(id: &str, name: &str) -> EpisodeData {
    EpisodeData {
        uri: format!("spotify:episode:{id}"),
        name: name.to_string(),
        description: None,
        release_date: None,
        content_rating: None,
        cover_art: None,
        playability: Playability { playable: true },
        podcast_v2: None,
    }
}

/// Audio playback manifest fixture offering the given formats.
pub fn audio_playback(media_id: &str, formats: &[(&str, &str)]) -> PlaybackInfo {
    PlaybackInfo {
        metadata: PlaybackMetadata {
            uri: format!("spotify:track:{media_id}"),
        },
        manifest: PlaybackManifest {
            file_ids_mp4: formats
                .iter()
                .map(|(format, file_id)| AudioFileEntry {
                    format: format.to_string(),
                    file_id: file_id.to_string(),
                })
                .collect(),
            file_ids_ogg: Vec::new(),
            manifest_ids_video: Vec::new(),
        },
    }
}

#[async_trait]
impl SpotifyApi for StubApi {
    async fn get_track(&self, track_id: &str) -> Result<TrackUnion, ApiError> {
        Ok(match self.tracks.get(track_id) {
            Some(track) => TrackUnion::Track(track.clone()),
            None => TrackUnion::NotFound,
        })
    }

    async fn get_episode(&self, episode_id: &str) -> Result<EpisodeUnion, ApiError> {
        Ok(match self.episodes.get(episode_id) {
            Some(episode) => EpisodeUnion::Episode(episode.clone()),
            None => EpisodeUnion::NotFound,
        })
    }

    async fn get_album(&self, album_id: &str, offset: usize) -> Result<AlbumUnion, ApiError> {
        self.album_calls.fetch_add(1, Ordering::SeqCst);
        let Some(album) = self.albums.get(album_id) else {
            return Ok(AlbumUnion::NotFound);
        };
        let mut header = album.clone();
        if let Some(full) = &album.tracks_v2 {
            header.tracks_v2 = Some(self.page_of(&full.items, offset, full.total_count));
        }
        Ok(AlbumUnion::Album(header))
    }

    async fn get_show(&self, show_id: &str, offset: usize) -> Result<ShowUnion, ApiError> {
        let Some(show) = self.shows.get(show_id) else {
            return Ok(ShowUnion::NotFound);
        };
        let mut header = show.clone();
        if let Some(full) = &show.episodes_v2 {
            header.episodes_v2 = Some(self.page_of(&full.items, offset, full.total_count));
        }
        Ok(ShowUnion::Podcast(header))
    }

    async fn get_playlist(
        &self,
        playlist_id: &str,
        offset: usize,
    ) -> Result<PlaylistUnion, ApiError> {
        let Some(playlist) = self.playlists.get(playlist_id) else {
            return Ok(PlaylistUnion::NotFound);
        };
        let mut header = playlist.clone();
        header.content = self.page_of(&playlist.content.items, offset, playlist.content.total_count);
        Ok(PlaylistUnion::Playlist(header))
    }

    async fn get_artist_albums(
        &self,
        artist_id: &str,
        _collection: ArtistCollection,
        offset: usize,
    ) -> Result<Page<ArtistAlbumItem>, ApiError> {
        let all = self.artist_albums.get(artist_id).cloned().unwrap_or_default();
        Ok(self.page_of(&all, offset, all.len()))
    }

    async fn get_playback_info(
        &self,
        media_id: &str,
        _media_kind: &str,
    ) -> Result<Option<PlaybackInfo>, ApiError> {
        Ok(self.playback.get(media_id).cloned())
    }

    async fn get_audio_stream_urls(&self, file_id: &str) -> Result<StreamUrls, ApiError> {
        self.stream_urls
            .get(file_id)
            .cloned()
            .ok_or_else(|| ApiError::Other(format!("no stream urls stubbed for {file_id}")))
    }

    async fn get_seek_table(&self, file_id: &str) -> Result<SeekTable, ApiError> {
        self.seek_tables
            .get(file_id)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                body: String::new(),
            })
    }

    async fn get_video_manifest(&self, file_id: &str) -> Result<VideoManifest, ApiError> {
        self.video_manifests
            .get(file_id)
            .cloned()
            .ok_or_else(|| ApiError::Other(format!("no manifest stubbed for {file_id}")))
    }

    async fn get_widevine_license(
        &self,
        _challenge: &[u8],
        _content_kind: ContentKind,
    ) -> Result<Vec<u8>, ApiError> {
        match &self.license_failure {
            Some(fail) => Err(fail()),
            None => Ok(self.license.clone()),
        }
    }

    async fn get_lyrics(&self, track_id: &str) -> Result<Option<LyricsResponse>, ApiError> {
        Ok(self.lyrics.get(track_id).cloned())
    }

    async fn get_track_credits(&self, track_id: &str) -> Result<TrackCredits, ApiError> {
        Ok(self.credits.get(track_id).cloned().unwrap_or_default())
    }

    async fn get_gid_metadata(
        &self,
        media_id: &str,
        _media_kind: &str,
    ) -> Result<GidMetadata, ApiError> {
        Ok(self.gid_metadata.get(media_id).cloned().unwrap_or_default())
    }

    fn has_premium(&self) -> bool {
        self.premium
    }
}
