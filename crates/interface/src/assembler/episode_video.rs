//! Video podcast episode assembly: episode tags over a segmented
//! stream pair, licensed only when the content actually declares DRM.

use tracing::debug;

use crate::api::{ContentKind, EpisodeData, EpisodeUnion, PlaybackInfo, ShowEpisodeItem,
    to_metadata_blob};
use crate::error::ResolveError;
use crate::media::{KeyPair, MediaDescriptor, MediaKind};

use super::episode::parse_episode_tags;
use super::video::video_stream_info;
use super::{AssemblerContext, cover_ids, tag_quality_error, transform_cover_url};

pub struct EpisodeVideoAssembler<'a> {
    ctx: &'a AssemblerContext,
}

impl<'a> EpisodeVideoAssembler<'a> {
    pub fn new(ctx: &'a AssemblerContext) -> EpisodeVideoAssembler<'a> {
        EpisodeVideoAssembler { ctx }
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

        let tags = parse_episode_tags(&episode, show_items, true);

        let cover_url = episode
            .cover_art
            .as_ref()
            .and_then(|art| art.sources.first())
            .map(|source| {
                transform_cover_url(&source.url, ctx.options.cover_size, &cover_ids::VIDEO)
            })
            .unwrap_or_default();

        let stream_info = video_stream_info(ctx, playback_info)
            .await
            .map_err(|err| tag_quality_error(err, &episode.name))?;

        // Most video podcasts stream in the clear; only licensed ones
        // go through the broker.
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

        debug!(media_id = %media_id, title = %episode.name, "assembled video episode");
        Ok(MediaDescriptor {
            media_id,
            kind: MediaKind::PodcastVideo,
            metadata: to_metadata_blob(&episode),
            tags,
            playlist_tags: None,
            cover_url,
            lyrics: None,
            stream_info,
            decryption_key,
        })
    }
}
