//! Thin reqwest-backed implementation of [`SpotifyApi`].
//!
//! Only the request/response plumbing lives here; everything the rest
//! of the crate depends on goes through the trait.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::models::*;
use super::{ApiError, ContentKind, SpotifyApi};

const PARTNER_API_URL: &str = "https://api-partner.spotify.com/pathfinder/v1/query";
const SPCLIENT_URL: &str = "https://gue1-spclient.spotify.com";
const SEEKTABLE_URL: &str = "https://seektables.scdn.co/seektable";

const PAGE_LIMIT: usize = 50;

/// Persisted-query hashes for the GraphQL operations in use.
mod query_hash {
    pub const GET_TRACK: &str =
        "5c5ec8c973a0ac2d5b38d7064056c45103c5a062ee12b62ce683ab397b5fbe7d";
    pub const GET_ALBUM: &str =
        "01c2d1b1e0cbd661e6a1a368b4d25a128fab8d52cf1dbecb24e2e63e16443bf7";
    pub const GET_EPISODE: &str =
        "6b1b93ee8d9dc5d1b1fcc1e4b8bdca1d4cfc5c15172e2d3e8f0ad6b5dcb94e1f";
    pub const GET_SHOW: &str =
        "908ff9b454a20752f4a172d0c321a2bb4197c1fba0c8a2a26d7f3c0714a9676b";
    pub const GET_PLAYLIST: &str =
        "19ff1327c29e99c208c86d7a9d8f1929cfdf3d3d1ac256ed95c6dc2b46926f49";
    pub const ARTIST_DISCOGRAPHY: &str =
        "9380995a9d4663cbcb5113fef3c6aabf70ae6d407ba61793fd01e2a1dd6929b0";
}

/// Connection settings the client is wired with. Session acquisition
/// (cookies, token refresh) is deliberately out of scope.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bearer_token: String,
    pub client_token: Option<String>,
    /// Whether the session carries premium entitlement.
    pub premium: bool,
}

pub struct HttpSpotifyApi {
    client: Client,
    config: ApiConfig,
    headers: HeaderMap,
}

impl HttpSpotifyApi {
    pub fn new(client: Client, config: ApiConfig) -> Result<HttpSpotifyApi, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.bearer_token))
                .map_err(|e| ApiError::Other(format!("invalid bearer token: {e}")))?,
        );
        headers.insert("app-platform", HeaderValue::from_static("WebPlayer"));
        if let Some(client_token) = &config.client_token {
            headers.insert(
                "client-token",
                HeaderValue::from_str(client_token)
                    .map_err(|e| ApiError::Other(format!("invalid client token: {e}")))?,
            );
        }

        Ok(HttpSpotifyApi {
            client,
            config,
            headers,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .headers(self.headers.clone())
    }

    async fn checked(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.checked(self.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    /// Issue one persisted GraphQL query against the partner API.
    async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        hash: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        debug!(operation, %variables, "partner API query");

        let extensions = json!({
            "persistedQuery": {"version": 1, "sha256Hash": hash}
        });
        let builder = self.request(Method::GET, PARTNER_API_URL).query(&[
            ("operationName", operation),
            ("variables", &variables.to_string()),
            ("extensions", &extensions.to_string()),
        ]);
        let response = self.checked(builder).await?;
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct GraphqlData<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackEnvelope {
    track_union: TrackUnion,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumEnvelope {
    album_union: AlbumUnion,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeEnvelope {
    #[serde(rename = "episodeUnionV2")]
    episode_union: EpisodeUnion,
}

#[derive(Deserialize)]
struct ShowEnvelope {
    #[serde(rename = "podcastUnionV2")]
    show_union: ShowUnion,
}

#[derive(Deserialize)]
struct PlaylistEnvelope {
    #[serde(rename = "playlistV2")]
    playlist: PlaylistUnion,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtistEnvelope {
    artist_union: ArtistDiscographyUnion,
}

#[derive(Deserialize)]
struct ArtistDiscographyUnion {
    discography: Discography,
}

#[derive(Deserialize)]
struct Discography {
    #[serde(default)]
    albums: Option<Page<DiscographyGroup>>,
    #[serde(default)]
    singles: Option<Page<DiscographyGroup>>,
    #[serde(default)]
    compilations: Option<Page<DiscographyGroup>>,
}

#[derive(Deserialize)]
struct DiscographyGroup {
    releases: DiscographyReleases,
}

#[derive(Deserialize)]
struct DiscographyReleases {
    #[serde(default)]
    items: Vec<ArtistAlbumItem>,
}

/// Envelope of the playback endpoint: a `media` object keyed by an
/// opaque manifest id, each value wrapping the actual item.
#[derive(Deserialize)]
struct PlaybackEnvelope {
    #[serde(default)]
    media: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
impl SpotifyApi for HttpSpotifyApi {
    async fn get_track(&self, track_id: &str) -> Result<TrackUnion, ApiError> {
        let envelope: GraphqlData<TrackEnvelope> = self
            .graphql(
                "getTrack",
                query_hash::GET_TRACK,
                json!({"uri": format!("spotify:track:{track_id}")}),
            )
            .await?;
        Ok(envelope.data.track_union)
    }

    async fn get_episode(&self, episode_id: &str) -> Result<EpisodeUnion, ApiError> {
        let envelope: GraphqlData<EpisodeEnvelope> = self
            .graphql(
                "getEpisodeOrChapter",
                query_hash::GET_EPISODE,
                json!({"uri": format!("spotify:episode:{episode_id}")}),
            )
            .await?;
        Ok(envelope.data.episode_union)
    }

    async fn get_album(&self, album_id: &str, offset: usize) -> Result<AlbumUnion, ApiError> {
        let envelope: GraphqlData<AlbumEnvelope> = self
            .graphql(
                "getAlbum",
                query_hash::GET_ALBUM,
                json!({
                    "uri": format!("spotify:album:{album_id}"),
                    "offset": offset,
                    "limit": PAGE_LIMIT,
                }),
            )
            .await?;
        Ok(envelope.data.album_union)
    }

    async fn get_show(&self, show_id: &str, offset: usize) -> Result<ShowUnion, ApiError> {
        let envelope: GraphqlData<ShowEnvelope> = self
            .graphql(
                "queryPodcastEpisodes",
                query_hash::GET_SHOW,
                json!({
                    "uri": format!("spotify:show:{show_id}"),
                    "offset": offset,
                    "limit": PAGE_LIMIT,
                }),
            )
            .await?;
        Ok(envelope.data.show_union)
    }

    async fn get_playlist(
        &self,
        playlist_id: &str,
        offset: usize,
    ) -> Result<PlaylistUnion, ApiError> {
        let envelope: GraphqlData<PlaylistEnvelope> = self
            .graphql(
                "fetchPlaylist",
                query_hash::GET_PLAYLIST,
                json!({
                    "uri": format!("spotify:playlist:{playlist_id}"),
                    "offset": offset,
                    "limit": PAGE_LIMIT,
                }),
            )
            .await?;
        Ok(envelope.data.playlist)
    }

    async fn get_artist_albums(
        &self,
        artist_id: &str,
        collection: ArtistCollection,
        offset: usize,
    ) -> Result<Page<ArtistAlbumItem>, ApiError> {
        let envelope: GraphqlData<ArtistEnvelope> = self
            .graphql(
                "queryArtistDiscographyAll",
                query_hash::ARTIST_DISCOGRAPHY,
                json!({
                    "uri": format!("spotify:artist:{artist_id}"),
                    "offset": offset,
                    "limit": PAGE_LIMIT,
                }),
            )
            .await?;

        let discography = envelope.data.artist_union.discography;
        let page = match collection {
            ArtistCollection::Albums => discography.albums,
            ArtistCollection::Singles => discography.singles,
            ArtistCollection::Compilations => discography.compilations,
        }
        .ok_or_else(|| {
            ApiError::Other(format!(
                "artist discography has no {} section",
                collection.as_str()
            ))
        })?;

        Ok(Page {
            total_count: page.total_count,
            items: page
                .items
                .into_iter()
                .flat_map(|group| group.releases.items)
                .collect(),
        })
    }

    async fn get_playback_info(
        &self,
        media_id: &str,
        media_kind: &str,
    ) -> Result<Option<PlaybackInfo>, ApiError> {
        let url = format!("{SPCLIENT_URL}/playback/v1/{media_kind}/{media_id}/manifest");
        let envelope: PlaybackEnvelope = self.get_json(&url).await?;

        // The envelope is keyed by an opaque manifest id; take the
        // first entry's wrapped item.
        let Some((_, value)) = envelope.media.into_iter().next() else {
            return Ok(None);
        };
        let item = value
            .get("item")
            .cloned()
            .ok_or_else(|| ApiError::Other("playback envelope missing item".to_string()))?;
        Ok(Some(serde_json::from_value(item)?))
    }

    async fn get_audio_stream_urls(&self, file_id: &str) -> Result<StreamUrls, ApiError> {
        let url =
            format!("{SPCLIENT_URL}/storage-resolve/files/audio/interactive/{file_id}?alt=json");
        self.get_json(&url).await
    }

    async fn get_seek_table(&self, file_id: &str) -> Result<SeekTable, ApiError> {
        let url = format!("{SEEKTABLE_URL}/{file_id}.json");
        self.get_json(&url).await
    }

    async fn get_video_manifest(&self, file_id: &str) -> Result<VideoManifest, ApiError> {
        let url = format!("{SPCLIENT_URL}/manifests/video/v7/{file_id}");
        self.get_json(&url).await
    }

    async fn get_widevine_license(
        &self,
        challenge: &[u8],
        content_kind: ContentKind,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!(
            "{SPCLIENT_URL}/widevine-license/v1/{}/license",
            content_kind.as_str()
        );
        let response = self
            .checked(self.request(Method::POST, &url).body(challenge.to_vec()))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_lyrics(&self, track_id: &str) -> Result<Option<LyricsResponse>, ApiError> {
        let url = format!("{SPCLIENT_URL}/color-lyrics/v2/track/{track_id}?format=json");
        match self.get_json(&url).await {
            Ok(lyrics) => Ok(Some(lyrics)),
            Err(err) if err.status_code() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_track_credits(&self, track_id: &str) -> Result<TrackCredits, ApiError> {
        let url = format!("{SPCLIENT_URL}/track-credits-view/v0/experimental/{track_id}/credits");
        self.get_json(&url).await
    }

    async fn get_gid_metadata(
        &self,
        media_id: &str,
        media_kind: &str,
    ) -> Result<GidMetadata, ApiError> {
        let gid = base62_to_gid(media_id)
            .ok_or_else(|| ApiError::Other(format!("invalid media id: {media_id}")))?;
        let url = format!("{SPCLIENT_URL}/metadata/4/{media_kind}/{gid}?market=from_token");
        self.get_json(&url).await
    }

    fn has_premium(&self) -> bool {
        self.config.premium
    }
}

const BASE62_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Convert a 22-character base62 media id to the 32-hex-digit GID the
/// metadata endpoints key on.
fn base62_to_gid(media_id: &str) -> Option<String> {
    let mut value: u128 = 0;
    for byte in media_id.bytes() {
        let digit = BASE62_ALPHABET.iter().position(|&c| c == byte)? as u128;
        value = value.checked_mul(62)?.checked_add(digit)?;
    }
    Some(format!("{value:032x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_round_trips_known_id() {
        // spotify IDs are 22 base62 digits; zero maps to the zero gid.
        assert_eq!(
            base62_to_gid("0000000000000000000000").unwrap(),
            "00000000000000000000000000000000"
        );
        assert_eq!(base62_to_gid("000000000000000000000z").unwrap().len(), 32);
        assert!(base62_to_gid("not-base62!").is_none());
    }
}
