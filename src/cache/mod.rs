//! Count-hinted caching of membership collections.
//!
//! Each cached collection keeps its last payload and, separately, the item
//! count seen with it. The count is sent with the next request so the server
//! can answer "not modified" instead of re-scanning the collection.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::FetchResult;
use crate::app::Result;
use crate::domain::{FeedTarget, PageMeta, PageResult};
use crate::store::Store;
use crate::telemetry::Metrics;

/// Payload and count keys for one cached collection at one page size.
///
/// The limit is part of both keys: a page fetched at one size must never
/// answer a request made at another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub collection: String,
    pub count: String,
}

impl CacheKeys {
    fn new(name: &str, user_id: Option<&str>, limit: u32) -> Self {
        let collection = format!("{}l{}", family_prefix(name, user_id), limit);
        Self {
            count: format!("{}:count", collection),
            collection,
        }
    }

    pub fn liked(user_id: Option<&str>, limit: u32) -> Self {
        Self::new(LIKED, user_id, limit)
    }

    pub fn favorited(user_id: Option<&str>, limit: u32) -> Self {
        Self::new(FAVORITED, user_id, limit)
    }

    /// Keys for targets whose first page is served through the cache.
    pub fn for_target(target: &FeedTarget, limit: u32) -> Option<Self> {
        match target {
            FeedTarget::LikedByMe => Some(Self::liked(None, limit)),
            FeedTarget::FavoritedByMe => Some(Self::favorited(None, limit)),
            FeedTarget::LikedByUser(id) => Some(Self::liked(Some(id.as_str()), limit)),
            FeedTarget::FavoritedByUser(id) => Some(Self::favorited(Some(id.as_str()), limit)),
            FeedTarget::AllPosts | FeedTarget::PostsByUser { .. } => None,
        }
    }
}

const LIKED: &str = "liked_posts";
const FAVORITED: &str = "favorited_posts";

/// Prefix shared by every page size of one collection, e.g. `liked_posts:`.
fn family_prefix(name: &str, user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => format!("user:{}:{}:", id, name),
        None => format!("{}:", name),
    }
}

pub fn stats_key(user_id: &str) -> String {
    format!("user:{}:stats", user_id)
}

/// Result of a cached fetch, flagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    pub cached: bool,
}

#[derive(Clone)]
pub struct CachedQuery {
    store: Arc<dyn Store + Send + Sync>,
    metrics: Metrics,
}

impl CachedQuery {
    pub fn new(store: Arc<dyn Store + Send + Sync>, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    /// Fetch through the cache.
    ///
    /// `fetcher` receives the count hint to attach to the request. When the
    /// server answers "not modified" the stored payload is returned as-is.
    /// If that payload is missing or unreadable the request is repeated
    /// without a hint.
    pub async fn cached_fetch<F, Fut>(
        &self,
        keys: &CacheKeys,
        fetcher: F,
    ) -> Result<Cached<PageResult>>
    where
        F: Fn(Option<u64>) -> Fut,
        Fut: Future<Output = Result<FetchResult<PageResult>>>,
    {
        let last_count = self.store.get_last_count(&keys.count)?;

        if let FetchResult::Content(page) = fetcher(last_count).await? {
            return self.store_fresh(keys, page);
        }

        if let Some(page) = self.get_value::<PageResult>(&keys.collection)? {
            tracing::debug!(key = %keys.collection, "collection unchanged; serving cache");
            self.metrics.record_cache_hit();
            return Ok(Cached {
                data: page,
                cached: true,
            });
        }

        tracing::debug!(
            key = %keys.collection,
            "not modified but nothing cached; refetching without hint"
        );
        self.store.clear_last_count(&keys.count)?;
        match fetcher(None).await? {
            FetchResult::Content(page) => self.store_fresh(keys, page),
            FetchResult::NotModified => Ok(Cached {
                data: PageResult {
                    items: Vec::new(),
                    pagination: PageMeta::from_totals(1, 1, 0),
                },
                cached: false,
            }),
        }
    }

    fn store_fresh(&self, keys: &CacheKeys, page: PageResult) -> Result<Cached<PageResult>> {
        self.metrics.record_cache_miss();
        self.put_value(&keys.collection, &page)?;
        self.store.set_last_count(&keys.count, page.last_count())?;
        tracing::debug!(
            key = %keys.collection,
            count = page.last_count(),
            "stored fresh collection"
        );
        Ok(Cached {
            data: page,
            cached: false,
        })
    }

    /// Read a cached JSON value. An unreadable entry is dropped and reported
    /// as a miss.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(payload) = self.store.get_cache(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping unreadable cache entry");
                self.store.clear_cache(key)?;
                Ok(None)
            }
        }
    }

    pub fn put_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.store.set_cache(key, &payload)
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        self.store.clear_cache(key)
    }

    /// Drop the signed-in user's liked/favorited collections and, when
    /// `user_id` is given, that user's liked/favorited collections and stats.
    /// Every page size of a collection goes at once.
    pub fn invalidate(&self, user_id: Option<&str>) -> Result<()> {
        let mut prefixes = vec![family_prefix(LIKED, None), family_prefix(FAVORITED, None)];
        if let Some(id) = user_id {
            prefixes.push(family_prefix(LIKED, Some(id)));
            prefixes.push(family_prefix(FAVORITED, Some(id)));
        }

        let mut cleared = 0;
        for prefix in &prefixes {
            cleared += self.store.clear_prefix(prefix)? as u64;
        }
        if let Some(id) = user_id {
            self.store.clear_cache(&stats_key(id))?;
            cleared += 1;
        }

        self.metrics.record_invalidation(cleared);
        tracing::debug!(user_id, cleared, "invalidated cached collections");
        Ok(())
    }

    /// Drop every cached collection. Used when a targeted invalidation
    /// could not be completed.
    pub fn clear_all(&self) -> Result<usize> {
        let cleared = self.store.clear_all_cache()?;
        self.metrics.record_invalidation(cleared as u64);
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::Post;
    use crate::store::SqliteStore;

    fn setup() -> (Arc<SqliteStore>, CachedQuery, Metrics) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let metrics = Metrics::new();
        let query = CachedQuery::new(store.clone(), metrics.clone());
        (store, query, metrics)
    }

    fn page(n: usize) -> PageResult {
        PageResult {
            items: (0..n).map(|i| Post::new(format!("p{}", i), "text", "Ada")).collect(),
            pagination: PageMeta::from_totals(1, 10, n as u64),
        }
    }

    #[test]
    fn test_keys_are_scoped_by_user_and_limit() {
        assert_eq!(CacheKeys::liked(None, 10).collection, "liked_posts:l10");
        assert_eq!(CacheKeys::liked(None, 10).count, "liked_posts:l10:count");
        assert_eq!(
            CacheKeys::favorited(Some("u1"), 5).collection,
            "user:u1:favorited_posts:l5"
        );
        assert_ne!(CacheKeys::liked(None, 5), CacheKeys::liked(None, 10));
        assert!(CacheKeys::for_target(&FeedTarget::AllPosts, 10).is_none());
    }

    #[tokio::test]
    async fn test_fresh_fetch_stores_payload_and_count() {
        let (store, query, metrics) = setup();
        let keys = CacheKeys::liked(None, 10);

        let result = query
            .cached_fetch(&keys, |hint| async move {
                assert_eq!(hint, None);
                Ok(FetchResult::Content(page(3)))
            })
            .await
            .unwrap();

        assert!(!result.cached);
        assert_eq!(result.data.items.len(), 3);
        assert_eq!(store.get_last_count(&keys.count).unwrap(), Some(3));
        assert!(store.get_cache(&keys.collection).unwrap().is_some());
        assert_eq!(metrics.snapshot().cache_misses, 1);
    }

    #[tokio::test]
    async fn test_not_modified_serves_cache() {
        let (_store, query, metrics) = setup();
        let keys = CacheKeys::liked(None, 10);

        query
            .cached_fetch(&keys, |_| async { Ok(FetchResult::Content(page(4))) })
            .await
            .unwrap();

        let result = query
            .cached_fetch(&keys, |hint| async move {
                assert_eq!(hint, Some(4));
                Ok(FetchResult::NotModified)
            })
            .await
            .unwrap();

        assert!(result.cached);
        let ids: Vec<&str> = result.data.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3"]);
        assert_eq!(result.data.pagination.total_items, 4);
        assert_eq!(metrics.snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_not_modified_without_payload_refetches() {
        let (store, query, _metrics) = setup();
        let keys = CacheKeys::favorited(None, 10);
        store.set_last_count(&keys.count, 2).unwrap();
        let calls = AtomicUsize::new(0);

        let result = query
            .cached_fetch(&keys, |hint| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        assert_eq!(hint, Some(2));
                        Ok(FetchResult::NotModified)
                    } else {
                        assert_eq!(hint, None);
                        Ok(FetchResult::Content(page(2)))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!result.cached);
        assert_eq!(result.data.items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_cache_untouched() {
        let (store, query, _metrics) = setup();
        let keys = CacheKeys::liked(None, 10);
        query
            .cached_fetch(&keys, |_| async { Ok(FetchResult::Content(page(1))) })
            .await
            .unwrap();

        let result = query
            .cached_fetch(&keys, |_| async {
                Err(crate::app::MurmurError::Other("offline".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_last_count(&keys.count).unwrap(), Some(1));
    }

    #[test]
    fn test_invalidate_scope() {
        let (store, query, _metrics) = setup();
        let own = CacheKeys::liked(None, 10);
        let own_small = CacheKeys::liked(None, 5);
        let theirs = CacheKeys::favorited(Some("u1"), 20);
        let other_user = CacheKeys::liked(Some("u2"), 10);

        for key in [&own, &own_small, &theirs, &other_user] {
            store.set_cache(&key.collection, "{}").unwrap();
            store.set_last_count(&key.count, 1).unwrap();
        }
        store.set_cache(&stats_key("u1"), "{}").unwrap();

        query.invalidate(Some("u1")).unwrap();

        for key in [&own, &own_small, &theirs] {
            assert!(store.get_cache(&key.collection).unwrap().is_none());
            assert!(store.get_last_count(&key.count).unwrap().is_none());
        }
        assert!(store.get_cache(&stats_key("u1")).unwrap().is_none());
        assert!(store.get_cache(&other_user.collection).unwrap().is_some());
        assert_eq!(store.get_last_count(&other_user.count).unwrap(), Some(1));
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let (store, query, _metrics) = setup();
        store.set_cache("liked_posts:l10", "not json").unwrap();

        let value: Option<PageResult> = query.get_value("liked_posts:l10").unwrap();
        assert!(value.is_none());
        assert!(store.get_cache("liked_posts:l10").unwrap().is_none());
    }
}
