//! Feed data service: one call per feed operation, with caching and
//! invalidation applied consistently.

use std::sync::Arc;
use std::time::Instant;

use crate::api::{FeedApi, FetchResult};
use crate::app::{MurmurError, Result};
use crate::cache::{stats_key, CacheKeys, Cached, CachedQuery};
use crate::domain::{
    FeedTarget, NewPost, PageQuery, PageResult, Post, PostUpdate, ToggleKind, UserStats,
};
use crate::normalizer::Normalizer;
use crate::store::Store;
use crate::telemetry::Metrics;

/// Everything shown on a user's profile.
#[derive(Debug, Clone)]
pub struct UserOverview {
    pub posts: PageResult,
    pub liked: PageResult,
    pub favorited: PageResult,
    pub stats: UserStats,
}

pub struct FeedService {
    api: Arc<dyn FeedApi>,
    cache: CachedQuery,
    normalizer: Normalizer,
    metrics: Metrics,
    viewer_id: Option<String>,
}

impl FeedService {
    pub fn new(
        api: Arc<dyn FeedApi>,
        store: Arc<dyn Store + Send + Sync>,
        metrics: Metrics,
        viewer_id: Option<String>,
    ) -> Self {
        Self {
            api,
            cache: CachedQuery::new(store, metrics.clone()),
            normalizer: Normalizer::new(metrics.clone()),
            metrics,
            viewer_id,
        }
    }

    /// Id of the signed-in user, when known.
    pub fn viewer_id(&self) -> Option<&str> {
        self.viewer_id.as_deref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn cache(&self) -> &CachedQuery {
        &self.cache
    }

    /// Fetch one normalized page of `target`.
    ///
    /// The first page of a liked/favorited collection goes through the
    /// count-hinted cache; every other page is fetched directly.
    pub async fn fetch_page(
        &self,
        target: &FeedTarget,
        query: PageQuery,
    ) -> Result<Cached<PageResult>> {
        let started = Instant::now();
        let result = match CacheKeys::for_target(target, query.limit) {
            Some(keys) if query.page == 1 => {
                self.cache
                    .cached_fetch(&keys, move |hint| self.fetch_normalized(target, query, hint))
                    .await
            }
            _ => self
                .fetch_normalized(target, query, None)
                .await
                .and_then(|result| match result {
                    FetchResult::Content(page) => Ok(Cached {
                        data: page,
                        cached: false,
                    }),
                    FetchResult::NotModified => Err(MurmurError::Other(
                        "Server answered 304 to an unconditional request".into(),
                    )),
                }),
        };

        self.metrics.record_fetch(started.elapsed());
        match &result {
            Ok(page) => tracing::debug!(
                %target,
                page = query.page,
                items = page.data.items.len(),
                cached = page.cached,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "fetched page"
            ),
            Err(e) => {
                self.metrics.record_fetch_error();
                tracing::warn!(%target, page = query.page, error = %e, "page fetch failed");
            }
        }
        result
    }

    async fn fetch_normalized(
        &self,
        target: &FeedTarget,
        query: PageQuery,
        hint: Option<u64>,
    ) -> Result<FetchResult<PageResult>> {
        let raw = self.api.fetch_page(target, query, hint).await?;
        Ok(raw.map(|page| self.normalizer.normalize_page(page, query)))
    }

    /// Apply a like/favorite change on the server.
    ///
    /// Caches that may include the post are invalidated before this returns,
    /// so no caller can read a stale collection afterwards. Once the server
    /// has accepted the change a local cache failure never turns it into an
    /// error.
    pub async fn set_membership(
        &self,
        kind: ToggleKind,
        post_id: &str,
        active: bool,
        author_id: Option<&str>,
    ) -> Result<Option<Post>> {
        let raw = self.api.set_membership(kind, post_id, active).await?;
        self.invalidate_after_mutation(author_id);

        tracing::info!(%kind, post_id, active, "membership updated");
        Ok(raw.map(|r| self.normalizer.normalize_post(r)))
    }

    fn invalidate_after_mutation(&self, author_id: Option<&str>) {
        let mut scopes = vec![author_id];
        if let Some(viewer) = self.viewer_id.as_deref() {
            if author_id != Some(viewer) {
                scopes.push(Some(viewer));
            }
        }
        self.invalidate_scopes(&scopes);
    }

    /// Invalidate each scope; if any fails, fall back to dropping the whole
    /// cache. Failures are logged, not returned.
    fn invalidate_scopes(&self, scopes: &[Option<&str>]) {
        let failed = scopes
            .iter()
            .filter_map(|user_id| self.cache.invalidate(*user_id).err())
            .last();
        let Some(e) = failed else {
            return;
        };

        tracing::warn!(error = %e, "cache invalidation failed; clearing all cached collections");
        if let Err(e) = self.cache.clear_all() {
            tracing::error!(error = %e, "could not clear cache; cached collections may be stale");
        }
    }

    pub async fn create_post(&self, new: &NewPost) -> Result<Post> {
        let mut new = new.clone();
        if new.is_anonymous {
            new.author_id = None;
        }

        let raw = self.api.create_post(&new).await?;
        if let Some(author) = self.viewer_id.as_deref() {
            if let Err(e) = self.cache.clear(&stats_key(author)) {
                tracing::warn!(author, error = %e, "could not drop cached stats");
            }
        }
        Ok(self.normalizer.normalize_post(raw))
    }

    pub async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<Post> {
        let raw = self.api.update_post(post_id, update).await?;
        self.invalidate_scopes(&[self.viewer_id.as_deref()]);
        Ok(self.normalizer.normalize_post(raw))
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.api.delete_post(post_id).await?;
        self.invalidate_scopes(&[self.viewer_id.as_deref()]);
        Ok(())
    }

    /// Counts for a user's profile, served from cache until a mutation
    /// touching that user invalidates them.
    pub async fn user_stats(&self, user_id: &str) -> Result<Cached<UserStats>> {
        let key = stats_key(user_id);
        if let Some(stats) = self.cache.get_value::<UserStats>(&key)? {
            self.metrics.record_cache_hit();
            return Ok(Cached {
                data: stats,
                cached: true,
            });
        }

        self.metrics.record_cache_miss();
        let stats = self.api.user_stats(user_id).await?;
        self.cache.put_value(&key, &stats)?;
        Ok(Cached {
            data: stats,
            cached: false,
        })
    }

    /// First page of each of a user's collections plus their stats, fetched
    /// concurrently.
    pub async fn user_overview(&self, user_id: &str, limit: u32) -> Result<UserOverview> {
        let query = PageQuery::first(limit);
        let posts_target = FeedTarget::posts_by(user_id);
        let liked_target = FeedTarget::LikedByUser(user_id.to_string());
        let favorited_target = FeedTarget::FavoritedByUser(user_id.to_string());

        let (posts, liked, favorited, stats) = futures::try_join!(
            self.fetch_page(&posts_target, query),
            self.fetch_page(&liked_target, query),
            self.fetch_page(&favorited_target, query),
            self.user_stats(user_id),
        )?;

        Ok(UserOverview {
            posts: posts.data,
            liked: liked.data,
            favorited: favorited.data,
            stats: stats.data,
        })
    }
}
