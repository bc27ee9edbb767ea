//! Podcast episode assembly. Episodes carry no real DRM: the stream
//! decrypts with one well-known constant key, so the broker is never
//! consulted and PSSH fetch is skipped.

use tracing::debug;

use crate::api::{EpisodeData, EpisodeUnion, PlaybackInfo, ShowEpisodeItem, to_metadata_blob};
use crate::error::ResolveError;
use crate::media::{
    DecryptionKey, KeyPair, MediaDescriptor, MediaKind, MediaRating, PODCAST_STATIC_KEY, Tags,
};

use super::{
    AssemblerContext, audio::audio_stream_info, cover_ids, parse_date, tag_quality_error,
    transform_cover_url,
};

pub struct EpisodeAssembler<'a> {
    ctx: &'a AssemblerContext,
}

impl<'a> EpisodeAssembler<'a> {
    pub fn new(ctx: &'a AssemblerContext) -> EpisodeAssembler<'a> {
        EpisodeAssembler { ctx }
    }

    pub async fn assemble(
        &self,
        playback_info: &PlaybackInfo,
        episode_data: Option<EpisodeData>,
        show_items: Option<&[ShowEpisodeItem]>,
    ) -> Result<MediaDescriptor, ResolveError> {
        let ctx = self.ctx;
        let media_id = playback_info.media_id().to_string();

        let episode = match episode_data {
            Some(episode) => episode,
            None => match ctx.api.get_episode(&media_id).await? {
                EpisodeUnion::Episode(episode) => episode,
                EpisodeUnion::NotFound => {
                    return Err(ResolveError::MediaNotFound { media_id });
                }
            },
        };

        let cached;
        let show_items: &[ShowEpisodeItem] = match show_items {
            Some(items) => items,
            None => {
                let show_ref = episode.podcast_v2.as_ref().ok_or_else(|| {
                    ResolveError::MediaNotFound {
                        media_id: media_id.clone(),
                    }
                })?;
                let show_id = crate::api::uri_id(&show_ref.data.uri).to_string();
                cached = ctx.cache.show(&ctx.api, &show_id).await?;
                cached.1.as_slice()
            }
        };

        let tags = parse_episode_tags(&episode, show_items, false);

        let cover_url = episode
            .cover_art
            .as_ref()
            .and_then(|art| art.sources.first())
            .map(|source| {
                transform_cover_url(&source.url, ctx.options.cover_size, &cover_ids::EPISODE)
            })
            .unwrap_or_default();

        let stream_info = audio_stream_info(ctx, playback_info, true)
            .await
            .map_err(|err| tag_quality_error(err, &episode.name))?;

        debug!(media_id = %media_id, title = %episode.name, "assembled episode");
        Ok(MediaDescriptor {
            media_id,
            kind: MediaKind::Podcast,
            metadata: to_metadata_blob(&episode),
            tags,
            playlist_tags: None,
            cover_url,
            lyrics: None,
            stream_info,
            decryption_key: Some(KeyPair::audio_only(DecryptionKey::without_id(
                &PODCAST_STATIC_KEY,
            ))),
        })
    }
}

/// Episode tags. The show lists episodes newest first; the track
/// number is the 1-based position counted from the oldest.
pub(super) fn parse_episode_tags(
    episode: &EpisodeData,
    show_items: &[ShowEpisodeItem],
    is_video: bool,
) -> Tags {
    let track = show_items
        .iter()
        .rev()
        .position(|item| item.entity.uri == episode.uri)
        .map(|index| index as u32 + 1);

    Tags {
        album: episode
            .podcast_v2
            .as_ref()
            .map(|show| show.data.name.clone()),
        date: episode
            .release_date
            .as_ref()
            .and_then(|date| parse_date(&date.iso_string)),
        description: episode.description.clone(),
        media_id: Some(episode.id().to_string()),
        media_kind: Some(if is_video {
            MediaKind::PodcastVideo
        } else {
            MediaKind::Podcast
        }),
        rating: episode
            .content_rating
            .as_ref()
            .map(|rating| MediaRating::from_label(&rating.label)),
        title: Some(episode.name.clone()),
        track,
        track_total: Some(show_items.len() as u32),
        url: Some(format!("https://open.spotify.com/episode/{}", episode.id())),
        ..Tags::default()
    }
}
