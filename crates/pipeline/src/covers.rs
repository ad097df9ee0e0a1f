use rommend_cache::ContentCache;
use rommend_catalog::CatalogClient;
use rommend_protocol::CatalogItem;
use tracing::{debug, warn};

/// Returns the cover image of `item`, fetching and caching it on a miss.
///
/// A missing cover or a failed download yields `None`. Downloaded bytes
/// are returned even when they cannot be cached.
pub async fn load_cover(
    cache: &ContentCache,
    client: &CatalogClient,
    item: &CatalogItem,
) -> Option<Vec<u8>> {
    if let Some(data) = cache.get(item.id) {
        return Some(data);
    }

    let url = client.cover_url(item)?;
    let data = match client.download_image(&url).await {
        Ok(data) => data,
        Err(e) => {
            debug!(item = item.id, url = %url, error = %e, "cover download failed");
            return None;
        }
    };

    if let Err(e) = cache.put(item.id, &data) {
        warn!(item = item.id, error = %e, "failed to cache cover");
    }
    Some(data)
}

/// Loads the cover of every item into the cache. Returns how many items
/// have a cover available afterwards.
pub async fn warm_covers(
    cache: &ContentCache,
    client: &CatalogClient,
    items: &[CatalogItem],
) -> usize {
    let mut available = 0;
    for item in items {
        if load_cover(cache, client, item).await.is_some() {
            available += 1;
        }
    }
    available
}
