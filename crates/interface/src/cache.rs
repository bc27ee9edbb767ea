//! Run-scoped memoization of paginated collection fetches.
//!
//! Sibling items of one album or show all need the same parent
//! collection; the first resolution triggers the full paginated fetch
//! and everyone else shares the result. `moka`'s `try_get_with` keeps
//! exactly one fetch in flight per id, with concurrent callers
//! awaiting it.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use crate::api::{
    AlbumData, AlbumTrackItem, AlbumUnion, ShowData, ShowEpisodeItem, ShowUnion, SpotifyApi,
};
use crate::error::ResolveError;

/// Cached album header plus its complete, fully paginated track list.
pub type AlbumCollection = Arc<(AlbumData, Vec<AlbumTrackItem>)>;
/// Cached show header plus its complete episode list.
pub type ShowCollection = Arc<(ShowData, Vec<ShowEpisodeItem>)>;

const CACHE_CAPACITY: u64 = 256;

/// Injected, run-scoped cache of parent collections.
#[derive(Clone)]
pub struct CollectionCache {
    albums: Cache<String, AlbumCollection>,
    shows: Cache<String, ShowCollection>,
}

impl Default for CollectionCache {
    fn default() -> Self {
        CollectionCache {
            albums: Cache::new(CACHE_CAPACITY),
            shows: Cache::new(CACHE_CAPACITY),
        }
    }
}

impl CollectionCache {
    /// Album header and complete track list, fetched once per run.
    pub async fn album(
        &self,
        api: &Arc<dyn SpotifyApi>,
        album_id: &str,
    ) -> Result<AlbumCollection, ResolveError> {
        let api = Arc::clone(api);
        let id = album_id.to_string();
        self.albums
            .try_get_with(id.clone(), async move { fetch_album(&api, &id).await })
            .await
            .map_err(ResolveError::shared)
    }

    /// Show header and complete episode list, fetched once per run.
    pub async fn show(
        &self,
        api: &Arc<dyn SpotifyApi>,
        show_id: &str,
    ) -> Result<ShowCollection, ResolveError> {
        let api = Arc::clone(api);
        let id = show_id.to_string();
        self.shows
            .try_get_with(id.clone(), async move { fetch_show(&api, &id).await })
            .await
            .map_err(ResolveError::shared)
    }
}

/// Page through an album until the running item count reaches the
/// server-declared total. Consumers never observe a partial list.
async fn fetch_album(
    api: &Arc<dyn SpotifyApi>,
    album_id: &str,
) -> Result<AlbumCollection, ResolveError> {
    let AlbumUnion::Album(header) = api.get_album(album_id, 0).await? else {
        return Err(ResolveError::MediaNotFound {
            media_id: album_id.to_string(),
        });
    };

    let (mut items, total) = match &header.tracks_v2 {
        Some(page) => (page.items.clone(), page.total_count),
        None => (Vec::new(), 0),
    };

    while items.len() < total {
        let AlbumUnion::Album(next) = api.get_album(album_id, items.len()).await? else {
            return Err(ResolveError::MediaNotFound {
                media_id: album_id.to_string(),
            });
        };
        let Some(page) = next.tracks_v2 else { break };
        if page.items.is_empty() {
            break;
        }
        items.extend(page.items);
    }

    debug!(album_id, tracks = items.len(), "cached album collection");
    Ok(Arc::new((header, items)))
}

async fn fetch_show(
    api: &Arc<dyn SpotifyApi>,
    show_id: &str,
) -> Result<ShowCollection, ResolveError> {
    let ShowUnion::Podcast(header) = api.get_show(show_id, 0).await? else {
        return Err(ResolveError::MediaNotFound {
            media_id: show_id.to_string(),
        });
    };

    let (mut items, total) = match &header.episodes_v2 {
        Some(page) => (page.items.clone(), page.total_count),
        None => (Vec::new(), 0),
    };

    while items.len() < total {
        let ShowUnion::Podcast(next) = api.get_show(show_id, items.len()).await? else {
            return Err(ResolveError::MediaNotFound {
                media_id: show_id.to_string(),
            });
        };
        let Some(page) = next.episodes_v2 else { break };
        if page.items.is_empty() {
            break;
        }
        items.extend(page.items);
    }

    debug!(show_id, episodes = items.len(), "cached show collection");
    Ok(Arc::new((header, items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::StubApi;

    #[tokio::test]
    async fn album_is_fetched_once_for_siblings() {
        let stub = StubApi::with_album("alb", &[1, 2, 3, 1, 2]);
        let calls = stub.album_call_counter();
        let api: Arc<dyn SpotifyApi> = Arc::new(stub);
        let cache = CollectionCache::default();

        let first = cache.album(&api, "alb").await.unwrap();
        let second = cache.album(&api, "alb").await.unwrap();

        assert_eq!(first.1.len(), 5);
        assert!(Arc::ptr_eq(&first, &second));
        // Default page size covers all five tracks in one request.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pagination_reaches_declared_total() {
        // Page size 2 against 5 tracks forces three pages.
        let stub = StubApi::with_album("alb", &[1, 2, 3, 4, 5]).page_size(2);
        let api: Arc<dyn SpotifyApi> = Arc::new(stub);
        let cache = CollectionCache::default();

        let collection = cache.album(&api, "alb").await.unwrap();
        assert_eq!(collection.1.len(), 5);
    }

    #[tokio::test]
    async fn missing_album_is_media_not_found() {
        let api: Arc<dyn SpotifyApi> = Arc::new(StubApi::default());
        let cache = CollectionCache::default();
        let err = cache.album(&api, "nope").await.unwrap_err();
        assert!(matches!(err, ResolveError::MediaNotFound { .. }));
    }
}
