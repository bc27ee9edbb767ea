//! Song assembly: track metadata, album context, credits, lyrics and
//! an audio stream with licensed decryption material.

use tracing::debug;

use crate::api::{
    AlbumData, AlbumTrackItem, ContentKind, PlaybackInfo, SpotifyApi, TrackData, TrackUnion,
    to_metadata_blob,
};
use crate::error::ResolveError;
use crate::media::{KeyPair, MediaDescriptor, MediaKind, MediaRating, Tags};

use super::{
    AssemblerContext, audio::audio_stream_info, cover_ids, format_names, parse_copyright,
    parse_date, parse_disc_info, parse_lyrics, tag_quality_error, transform_cover_url,
};

pub struct SongAssembler<'a> {
    ctx: &'a AssemblerContext,
}

impl<'a> SongAssembler<'a> {
    pub fn new(ctx: &'a AssemblerContext) -> SongAssembler<'a> {
        SongAssembler { ctx }
    }

    /// Assemble one song. `track_data` and `album` are passed in when
    /// the caller already holds them (album enumeration); otherwise
    /// they are fetched here, preferring the track list embedded in
    /// the track payload over a separate album fetch.
    pub async fn assemble(
        &self,
        playback_info: &PlaybackInfo,
        track_data: Option<TrackData>,
        album: Option<(&AlbumData, &[AlbumTrackItem])>,
    ) -> Result<MediaDescriptor, ResolveError> {
        let ctx = self.ctx;
        let media_id = playback_info.media_id().to_string();

        let track = match track_data {
            Some(track) => track,
            None => match ctx.api.get_track(&media_id).await? {
                TrackUnion::Track(track) => track,
                TrackUnion::NotFound => {
                    return Err(ResolveError::MediaNotFound { media_id });
                }
            },
        };

        let cached;
        let (album_data, album_items): (&AlbumData, &[AlbumTrackItem]) = match album {
            Some((data, items)) => (data, items),
            None => {
                let inline = track.album_of_track.as_ref().ok_or_else(|| {
                    ResolveError::MediaNotFound {
                        media_id: media_id.clone(),
                    }
                })?;
                match &inline.tracks_v2 {
                    Some(page) if !page.items.is_empty() => (inline, page.items.as_slice()),
                    _ => {
                        cached = ctx.cache.album(&ctx.api, inline.id()).await?;
                        (&cached.0, cached.1.as_slice())
                    }
                }
            }
        };

        let lyrics = match ctx.api.get_lyrics(&media_id).await? {
            Some(response) => Some(parse_lyrics(&response)),
            None => None,
        };

        let tags = parse_song_tags(
            &ctx.api,
            &track,
            album_data,
            album_items,
            lyrics.as_ref().and_then(|l| l.unsynced.clone()),
        )
        .await?;

        let cover_url = album_data
            .cover_art
            .as_ref()
            .and_then(|art| art.sources.first())
            .map(|source| transform_cover_url(&source.url, ctx.options.cover_size, &cover_ids::SONG))
            .unwrap_or_default();

        let stream_info = audio_stream_info(ctx, playback_info, false)
            .await
            .map_err(|err| tag_quality_error(err, &track.name))?;

        let broker = ctx
            .broker
            .as_ref()
            .ok_or_else(|| ResolveError::DrmDisabled {
                media_id: media_id.clone(),
            })?;
        let pssh = stream_info.audio.pssh.as_deref().ok_or_else(|| {
            ResolveError::KeyAcquisition("stream declared no system header".to_string())
        })?;
        let key = broker.acquire_key(pssh, ContentKind::Audio).await?;

        debug!(media_id = %media_id, title = %track.name, "assembled song");
        Ok(MediaDescriptor {
            media_id,
            kind: MediaKind::Song,
            metadata: to_metadata_blob(&track),
            tags,
            playlist_tags: None,
            cover_url,
            lyrics,
            stream_info,
            decryption_key: Some(KeyPair::audio_only(key)),
        })
    }
}

/// Composer and producer names from the role credits endpoint.
pub(super) async fn composer_producer(
    api: &std::sync::Arc<dyn SpotifyApi>,
    track_id: &str,
) -> Result<(Option<String>, Option<String>), ResolveError> {
    let credits = api.get_track_credits(track_id).await?;

    let mut composers = Vec::new();
    let mut producers = Vec::new();
    for role in &credits.role_credits {
        let names = role.artists.iter().map(|a| a.name.clone());
        match role.role_title.as_str() {
            "Writers" => composers.extend(names),
            "Producers" => producers.extend(names),
            _ => {}
        }
    }

    Ok((format_names(&composers), format_names(&producers)))
}

/// Album artist, track artist, ISRC and label from the GID metadata
/// endpoint.
pub(super) async fn gid_identity(
    api: &std::sync::Arc<dyn SpotifyApi>,
    track_id: &str,
) -> Result<
    (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ),
    ResolveError,
> {
    let gid = api.get_gid_metadata(track_id, "track").await?;

    let isrc = gid
        .external_id
        .iter()
        .find(|external| external.kind == "isrc")
        .map(|external| external.id.clone());
    let label = gid.album.as_ref().and_then(|album| album.label.clone());
    let album_artists: Vec<String> = gid
        .album
        .as_ref()
        .map(|album| album.artist.iter().map(|a| a.name.clone()).collect())
        .unwrap_or_default();
    let track_artists: Vec<String> = gid.artist.iter().map(|a| a.name.clone()).collect();

    Ok((
        format_names(&album_artists),
        format_names(&track_artists),
        isrc,
        label,
    ))
}

async fn parse_song_tags(
    api: &std::sync::Arc<dyn SpotifyApi>,
    track: &TrackData,
    album_data: &AlbumData,
    album_items: &[AlbumTrackItem],
    unsynced_lyrics: Option<String>,
) -> Result<Tags, ResolveError> {
    let track_id = track.id();
    let ((composer, producer), (album_artist, artist, isrc, label)) = tokio::try_join!(
        composer_producer(api, track_id),
        gid_identity(api, track_id),
    )?;

    let copyright = album_data.copyright.as_ref().and_then(parse_copyright);
    let rating = track
        .content_rating
        .as_ref()
        .map(|rating| MediaRating::from_label(&rating.label));

    let track_numbers: Vec<u32> = album_items
        .iter()
        .map(|item| item.track.track_number.unwrap_or(0))
        .collect();
    let current_index = album_items
        .iter()
        .position(|item| item.track.uri == track.uri)
        .unwrap_or(0);
    let (disc, disc_total, track_total) = parse_disc_info(&track_numbers, current_index);

    Ok(Tags {
        title: Some(track.name.clone()),
        artist,
        album: album_data.name.clone(),
        album_artist,
        compilation: Some(album_data.is_compilation()),
        composer,
        copyright,
        date: album_data
            .date
            .as_ref()
            .and_then(|date| parse_date(&date.iso_string)),
        disc: Some(disc),
        disc_total: Some(disc_total),
        isrc,
        label,
        lyrics: unsynced_lyrics,
        media_kind: Some(MediaKind::Song),
        producer,
        rating,
        track: track.track_number,
        track_total: Some(track_total),
        url: Some(format!("https://open.spotify.com/track/{track_id}")),
        ..Tags::default()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::testing::{self, StubApi, audio_playback};
    use crate::api::{SeekTable, StreamUrls};
    use crate::cache::CollectionCache;
    use crate::cdm::{Cdm, CdmError, CdmKey, CdmKeyKind, KeyBroker, SessionId};
    use crate::negotiator::AudioQuality;

    struct FixedCdm;

    impl Cdm for FixedCdm {
        fn open(&self) -> Result<SessionId, CdmError> {
            Ok(SessionId(1))
        }

        fn close(&self, _session: SessionId) -> Result<(), CdmError> {
            Ok(())
        }

        fn challenge(&self, _session: &SessionId, _pssh: &str) -> Result<Vec<u8>, CdmError> {
            Ok(Vec::new())
        }

        fn parse_license(&self, _session: &SessionId, _license: &[u8]) -> Result<(), CdmError> {
            Ok(())
        }

        fn keys(&self, _session: &SessionId) -> Result<Vec<CdmKey>, CdmError> {
            Ok(vec![CdmKey {
                kind: CdmKeyKind::Content,
                key: vec![0x11; 16],
                key_id: vec![0x22; 16],
            }])
        }
    }

    fn context() -> AssemblerContext {
        let mut stub = StubApi::with_album("alb1", &[1, 2, 3]).premium(true);
        let mut track = testing::track("alb1-t1", "Track 1", 2);
        track.album_of_track = Some(stub.albums["alb1"].clone());
        // Metadata endpoints fetch the track directly too.
        stub.tracks.insert("alb1-t1".to_string(), track);
        stub.stream_urls.insert(
            "file-aac".to_string(),
            StreamUrls {
                cdnurl: vec!["https://cdn.example/file-aac".to_string()],
            },
        );
        stub.seek_tables.insert(
            "file-aac".to_string(),
            SeekTable {
                pssh: "cHNzaA==".to_string(),
            },
        );

        let api: Arc<dyn crate::api::SpotifyApi> = Arc::new(stub);
        let cdm: Arc<dyn Cdm> = Arc::new(FixedCdm);
        AssemblerContext {
            broker: Some(KeyBroker::new(cdm, Arc::clone(&api))),
            api,
            cache: CollectionCache::default(),
            options: super::super::AssemblerOptions {
                audio_quality: AudioQuality::AacMedium,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn assembles_song_with_key_and_disc_info() {
        let ctx = context();
        let playback = audio_playback("alb1-t1", &[("10", "file-aac")]);

        let descriptor = SongAssembler::new(&ctx)
            .assemble(&playback, None, None)
            .await
            .unwrap();

        assert_eq!(descriptor.kind, MediaKind::Song);
        assert_eq!(descriptor.tags.track_total, Some(3));
        assert_eq!(descriptor.tags.disc, Some(1));
        assert_eq!(descriptor.stream_info.container, "mp4");
        let key = descriptor.decryption_key.unwrap();
        assert_eq!(key.audio.key, "11".repeat(16));
    }

    #[tokio::test]
    async fn quality_failure_is_tagged_with_title() {
        let ctx = context();
        // Manifest only offers the high tier the account cannot take.
        let playback = audio_playback("alb1-t1", &[("42", "other")]);

        let err = SongAssembler::new(&ctx)
            .assemble(&playback, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.media_title(), Some("Track 1"));
    }

    #[tokio::test]
    async fn drm_disabled_without_broker() {
        let mut ctx = context();
        ctx.broker = None;
        let playback = audio_playback("alb1-t1", &[("10", "file-aac")]);

        let err = SongAssembler::new(&ctx)
            .assemble(&playback, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::DrmDisabled { .. }));
    }
}
