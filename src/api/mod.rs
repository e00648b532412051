pub mod envelope;
pub mod http_client;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{FeedTarget, NewPost, PageQuery, PostUpdate, ToggleKind, UserStats};

pub use envelope::{ApiEnvelope, CountOrMembers, RawPage, RawPageMeta, RawPost};
pub use http_client::HttpApi;

#[derive(Debug)]
pub enum FetchResult<T> {
    /// Fresh payload from the server
    Content(T),
    /// The server says the client's cached copy is still current (HTTP 304)
    NotModified,
}

impl<T> FetchResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchResult<U> {
        match self {
            FetchResult::Content(value) => FetchResult::Content(f(value)),
            FetchResult::NotModified => FetchResult::NotModified,
        }
    }
}

/// The remote posts API.
///
/// Responses come back in their raw wire shape; turning them into domain
/// types is the [`Normalizer`](crate::normalizer::Normalizer)'s job.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Fetch one page of `target`. `last_count` is sent as the
    /// `X-Last-Count` hint when present.
    async fn fetch_page(
        &self,
        target: &FeedTarget,
        query: PageQuery,
        last_count: Option<u64>,
    ) -> Result<FetchResult<RawPage>>;

    /// Like/unlike or favorite/unfavorite a post. Returns the updated post
    /// when the server includes it in the response.
    async fn set_membership(
        &self,
        kind: ToggleKind,
        post_id: &str,
        active: bool,
    ) -> Result<Option<RawPost>>;

    async fn create_post(&self, post: &NewPost) -> Result<RawPost>;

    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<RawPost>;

    async fn delete_post(&self, post_id: &str) -> Result<()>;

    async fn user_stats(&self, user_id: &str) -> Result<UserStats>;
}
