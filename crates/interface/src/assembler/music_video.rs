//! Music video assembly: song-style credits over a segmented,
//! Widevine-protected audio/video stream pair.

use tracing::debug;

use crate::api::{AlbumData, ContentKind, PlaybackInfo, TrackData, TrackUnion, to_metadata_blob};
use crate::error::ResolveError;
use crate::media::{KeyPair, MediaDescriptor, MediaKind, MediaRating, Tags};

use super::song::{composer_producer, gid_identity};
use super::video::video_stream_info;
use super::{
    AssemblerContext, cover_ids, parse_copyright, parse_date, tag_quality_error,
    transform_cover_url,
};

pub struct MusicVideoAssembler<'a> {
    ctx: &'a AssemblerContext,
}

impl<'a> MusicVideoAssembler<'a> {
    pub fn new(ctx: &'a AssemblerContext) -> MusicVideoAssembler<'a> {
        MusicVideoAssembler { ctx }
    }

    pub async fn assemble(
        &self,
        playback_info: &PlaybackInfo,
        track_data: Option<TrackData>,
        album_data: Option<&AlbumData>,
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
        let album_data: &AlbumData = match album_data {
            Some(data) => data,
            None => {
                let inline = track.album_of_track.as_ref().ok_or_else(|| {
                    ResolveError::MediaNotFound {
                        media_id: media_id.clone(),
                    }
                })?;
                if inline.tracks_v2.as_ref().is_some_and(|p| !p.items.is_empty()) {
                    inline
                } else {
                    cached = ctx.cache.album(&ctx.api, inline.id()).await?;
                    &cached.0
                }
            }
        };

        let tags = parse_music_video_tags(ctx, &track, album_data).await?;

        let cover_url = album_data
            .cover_art
            .as_ref()
            .and_then(|art| art.sources.first())
            .map(|source| {
                transform_cover_url(&source.url, ctx.options.cover_size, &cover_ids::VIDEO)
            })
            .unwrap_or_default();

        let stream_info = video_stream_info(ctx, playback_info)
            .await
            .map_err(|err| tag_quality_error(err, &track.name))?;

        let decryption_key = match stream_info.audio.pssh.as_deref() {
            Some(pssh) => {
                let broker = ctx
                    .broker
                    .as_ref()
                    .ok_or_else(|| ResolveError::DrmDisabled {
                        media_id: media_id.clone(),
                    })?;
                let key = broker.acquire_key(pssh, ContentKind::Video).await?;
                Some(KeyPair {
                    audio: key.clone(),
                    video: Some(key),
                })
            }
            None => None,
        };

        debug!(media_id = %media_id, title = %track.name, "assembled music video");
        Ok(MediaDescriptor {
            media_id,
            kind: MediaKind::MusicVideo,
            metadata: to_metadata_blob(&track),
            tags,
            playlist_tags: None,
            cover_url,
            lyrics: None,
            stream_info,
            decryption_key,
        })
    }
}

/// Music video tags carry the song credit fields but no album or
/// track/disc numbering.
async fn parse_music_video_tags(
    ctx: &AssemblerContext,
    track: &TrackData,
    album_data: &AlbumData,
) -> Result<Tags, ResolveError> {
    let track_id = track.id();
    let ((composer, producer), (_, artist, isrc, label)) = tokio::try_join!(
        composer_producer(&ctx.api, track_id),
        gid_identity(&ctx.api, track_id),
    )?;

    Ok(Tags {
        title: Some(track.name.clone()),
        artist,
        composer,
        copyright: album_data.copyright.as_ref().and_then(parse_copyright),
        date: album_data
            .date
            .as_ref()
            .and_then(|date| parse_date(&date.iso_string)),
        isrc,
        label,
        media_kind: Some(MediaKind::MusicVideo),
        producer,
        rating: track
            .content_rating
            .as_ref()
            .map(|rating| MediaRating::from_label(&rating.label)),
        url: Some(format!("https://open.spotify.com/track/{track_id}")),
        ..Tags::default()
    })
}
