//! URL resolution: one streaming-service URL in, a stream of resolved
//! media descriptors (or per-item failures) out.
//!
//! Collection URLs enumerate their constituents lazily; a failed item
//! is yielded as an `Err` and enumeration continues. Only URL-level
//! problems (parse failure, disallowed type, DRM disabled for an
//! audio-only root) end the stream early.

use async_stream::stream;
use futures::Stream;
use tracing::{info, warn};

use crate::api::{
    AlbumData, AlbumTrackItem, ArtistCollection, EpisodeData, EpisodeUnion, PlaylistEntry,
    PlaylistUnion, ShowEpisodeItem, TrackData, TrackUnion,
};
use crate::assembler::{
    AssemblerContext, EpisodeAssembler, EpisodeVideoAssembler, MusicVideoAssembler, SongAssembler,
};
use crate::error::ResolveError;
use crate::media::{MediaDescriptor, PlaylistTags};
use crate::url::{MediaUrlKind, UrlInfo};

/// Enumeration policy knobs. `artist_collection` picks which
/// discography sub-collection an artist URL expands into.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub disallowed_media_types: Vec<MediaUrlKind>,
    pub artist_collection: ArtistCollection,
}

pub struct Resolver {
    pub ctx: AssemblerContext,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(ctx: AssemblerContext, config: ResolverConfig) -> Resolver {
        Resolver { ctx, config }
    }

    /// Resolve a URL into a stream of per-item results.
    pub fn resolve(&self, url: &str) -> impl Stream<Item = Result<MediaDescriptor, ResolveError>> + '_ {
        let url = url.to_string();
        stream! {
            let info = match UrlInfo::parse(&url) {
                Ok(info) => info,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            if self.config.disallowed_media_types.contains(&info.kind) {
                yield Err(ResolveError::UnsupportedMediaType(
                    info.kind.as_str().to_string(),
                ));
                return;
            }
            info!(kind = info.kind.as_str(), media_id = %info.media_id, "resolving URL");

            match info.kind {
                MediaUrlKind::Track => {
                    yield self.resolve_track(&info.media_id, None, None).await;
                }
                MediaUrlKind::Episode => {
                    yield self.resolve_episode(&info.media_id, None, None).await;
                }
                MediaUrlKind::Album => {
                    for await item in self.resolve_album(info.media_id.clone()) {
                        yield item;
                    }
                }
                MediaUrlKind::Show => {
                    for await item in self.resolve_show(info.media_id.clone()) {
                        yield item;
                    }
                }
                MediaUrlKind::Playlist => {
                    for await item in self.resolve_playlist(info.media_id.clone()) {
                        yield item;
                    }
                }
                MediaUrlKind::Artist => {
                    for await item in self.resolve_artist(info.media_id.clone()) {
                        yield item;
                    }
                }
            }
        }
    }

    /// Resolve one track into a song or music video descriptor.
    async fn resolve_track(
        &self,
        track_id: &str,
        track_data: Option<TrackData>,
        album: Option<(&AlbumData, &[AlbumTrackItem])>,
    ) -> Result<MediaDescriptor, ResolveError> {
        // Every track stream is licensed; without a broker nothing
        // downstream can succeed.
        if self.ctx.broker.is_none() {
            return Err(ResolveError::DrmDisabled {
                media_id: track_id.to_string(),
            });
        }

        let track = match track_data {
            Some(track) => track,
            None => match self.ctx.api.get_track(track_id).await? {
                TrackUnion::Track(track) => track,
                TrackUnion::NotFound => {
                    return Err(ResolveError::MediaNotFound {
                        media_id: track_id.to_string(),
                    });
                }
            },
        };
        if !track.playability.playable {
            return Err(ResolveError::MediaUnstreamable {
                media_id: track_id.to_string(),
            });
        }

        let playback_info = self
            .ctx
            .api
            .get_playback_info(track_id, "track")
            .await?
            .ok_or_else(|| ResolveError::MediaUnstreamable {
                media_id: track_id.to_string(),
            })?;

        if playback_info.is_video() {
            // The playback target can differ from the requested track
            // (video version redirect); only reuse metadata when they
            // agree.
            let same_item = playback_info.metadata.uri == track.uri;
            let (track, album_data) = if same_item {
                (Some(track), album.map(|(data, _)| data))
            } else {
                (None, None)
            };
            MusicVideoAssembler::new(&self.ctx)
                .assemble(&playback_info, track, album_data)
                .await
        } else {
            SongAssembler::new(&self.ctx)
                .assemble(&playback_info, Some(track), album)
                .await
        }
    }

    async fn resolve_episode(
        &self,
        episode_id: &str,
        episode_data: Option<EpisodeData>,
        show_items: Option<&[ShowEpisodeItem]>,
    ) -> Result<MediaDescriptor, ResolveError> {
        let episode = match episode_data {
            Some(episode) => episode,
            None => match self.ctx.api.get_episode(episode_id).await? {
                EpisodeUnion::Episode(episode) => episode,
                EpisodeUnion::NotFound => {
                    return Err(ResolveError::MediaNotFound {
                        media_id: episode_id.to_string(),
                    });
                }
            },
        };
        if !episode.playability.playable {
            return Err(ResolveError::MediaUnstreamable {
                media_id: episode_id.to_string(),
            });
        }

        let playback_info = self
            .ctx
            .api
            .get_playback_info(episode_id, "episode")
            .await?
            .ok_or_else(|| ResolveError::MediaUnstreamable {
                media_id: episode_id.to_string(),
            })?;

        if playback_info.is_video() {
            EpisodeVideoAssembler::new(&self.ctx)
                .assemble(&playback_info, Some(episode), show_items)
                .await
        } else {
            EpisodeAssembler::new(&self.ctx)
                .assemble(&playback_info, Some(episode), show_items)
                .await
        }
    }

    fn resolve_album(
        &self,
        album_id: String,
    ) -> impl Stream<Item = Result<MediaDescriptor, ResolveError>> + '_ {
        stream! {
            if self.ctx.broker.is_none() {
                yield Err(ResolveError::DrmDisabled { media_id: album_id });
                return;
            }

            let collection = match self.ctx.cache.album(&self.ctx.api, &album_id).await {
                Ok(collection) => collection,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let (header, items) = (&collection.0, collection.1.as_slice());

            for item in items {
                let track_id = item.track.id().to_string();
                yield self
                    .resolve_track(&track_id, Some(item.track.clone()), Some((header, items)))
                    .await;
            }
        }
    }

    fn resolve_show(
        &self,
        show_id: String,
    ) -> impl Stream<Item = Result<MediaDescriptor, ResolveError>> + '_ {
        stream! {
            let collection = match self.ctx.cache.show(&self.ctx.api, &show_id).await {
                Ok(collection) => collection,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            for item in &collection.1 {
                let episode_id = crate::api::uri_id(&item.entity.uri).to_string();
                yield self
                    .resolve_episode(
                        &episode_id,
                        Some(item.entity.data.clone()),
                        Some(collection.1.as_slice()),
                    )
                    .await;
            }
        }
    }

    fn resolve_playlist(
        &self,
        playlist_id: String,
    ) -> impl Stream<Item = Result<MediaDescriptor, ResolveError>> + '_ {
        stream! {
            let playlist = match self.fetch_playlist(&playlist_id).await {
                Ok(playlist) => playlist,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            let total = playlist.content.total_count as u32;
            for (index, item) in playlist.content.items.iter().enumerate() {
                let position = index as u32 + 1;
                let result = match &item.item_v2.data {
                    PlaylistEntry::Track(track) => {
                        self.resolve_track(track.id(), Some(track.clone()), None).await
                    }
                    PlaylistEntry::Episode(episode) => {
                        self.resolve_episode(episode.id(), Some(episode.clone()), None)
                            .await
                    }
                    PlaylistEntry::Unknown => {
                        warn!(playlist_id = %playlist.id(), position, "skipping unresolvable playlist entry");
                        Err(ResolveError::MediaNotFound {
                            media_id: format!("{}#{position}", playlist.id()),
                        })
                    }
                };

                yield result.map(|descriptor| {
                    descriptor.with_playlist_tags(PlaylistTags {
                        id: playlist.id().to_string(),
                        title: playlist.name.clone(),
                        artist: playlist.owner_v2.data.name.clone(),
                        track: position,
                        track_total: total,
                    })
                });
            }
        }
    }

    /// Playlist header with its item list fully paginated.
    async fn fetch_playlist(
        &self,
        playlist_id: &str,
    ) -> Result<crate::api::PlaylistData, ResolveError> {
        let PlaylistUnion::Playlist(mut playlist) =
            self.ctx.api.get_playlist(playlist_id, 0).await?
        else {
            return Err(ResolveError::MediaNotFound {
                media_id: playlist_id.to_string(),
            });
        };

        while playlist.content.items.len() < playlist.content.total_count {
            let PlaylistUnion::Playlist(next) = self
                .ctx
                .api
                .get_playlist(playlist_id, playlist.content.items.len())
                .await?
            else {
                break;
            };
            if next.content.items.is_empty() {
                break;
            }
            playlist.content.items.extend(next.content.items);
        }
        Ok(playlist)
    }

    fn resolve_artist(
        &self,
        artist_id: String,
    ) -> impl Stream<Item = Result<MediaDescriptor, ResolveError>> + '_ {
        stream! {
            let albums = match self.fetch_artist_albums(&artist_id).await {
                Ok(albums) => albums,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            info!(
                artist_id = %artist_id,
                collection = self.config.artist_collection.as_str(),
                albums = albums.len(),
                "expanding artist discography"
            );

            for album_id in albums {
                for await item in self.resolve_album(album_id) {
                    yield item;
                }
            }
        }
    }

    async fn fetch_artist_albums(&self, artist_id: &str) -> Result<Vec<String>, ResolveError> {
        let collection = self.config.artist_collection;
        let mut page = self
            .ctx
            .api
            .get_artist_albums(artist_id, collection, 0)
            .await?;
        let total = page.total_count;
        let mut ids: Vec<String> = page.items.drain(..).map(|item| item.id).collect();

        while ids.len() < total {
            let mut next = self
                .ctx
                .api
                .get_artist_albums(artist_id, collection, ids.len())
                .await?;
            if next.items.is_empty() {
                break;
            }
            ids.extend(next.items.drain(..).map(|item| item.id));
        }
        Ok(ids)
    }
}
