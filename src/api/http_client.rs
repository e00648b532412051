use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::api::envelope::RawPostList;
use crate::api::{ApiEnvelope, FeedApi, FetchResult, RawPage, RawPost};
use crate::app::{MurmurError, Result};
use crate::config::ApiConfig;
use crate::domain::{FeedTarget, NewPost, PageQuery, PostUpdate, ToggleKind, UserStats};
use crate::store::Store;

pub const LAST_COUNT_HEADER: &str = "X-Last-Count";

/// reqwest-based client for the posts API.
///
/// Injects the stored bearer token into every request and clears it when
/// the server answers 401.
pub struct HttpApi {
    client: Client,
    base: Url,
    store: Arc<dyn Store + Send + Sync>,
}

impl HttpApi {
    pub fn new(config: &ApiConfig, store: Arc<dyn Store + Send + Sync>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        let base = Url::parse(&config.base_url)?;
        if base.cannot_be_a_base() {
            return Err(MurmurError::Config(format!(
                "API base URL cannot have paths: {}",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base,
            store,
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MurmurError::Config("API base URL cannot have paths".into()))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let request = self.client.request(method, url);
        Ok(match self.store.get_token()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn with_json<B: Serialize>(request: RequestBuilder, body: &B) -> Result<RequestBuilder> {
        Ok(request
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<FetchResult<ApiEnvelope<T>>> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("API returned 401; clearing stored token");
            self.store.clear_token()?;
            return Err(MurmurError::Unauthorized);
        }

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::NotModified);
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(MurmurError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if body.is_empty() {
            return Ok(FetchResult::Content(ApiEnvelope::empty()));
        }

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;

        if envelope.not_modified {
            return Ok(FetchResult::NotModified);
        }

        if !envelope.success {
            return Err(MurmurError::Api {
                status: status.as_u16(),
                message: envelope.message.unwrap_or_default(),
            });
        }

        Ok(FetchResult::Content(envelope))
    }

    async fn execute_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        match self.execute::<T>(request).await? {
            FetchResult::Content(envelope) => envelope
                .data
                .ok_or_else(|| MurmurError::Other("Response carried no data".into())),
            FetchResult::NotModified => {
                Err(MurmurError::Other("Unexpected 304 for uncached request".into()))
            }
        }
    }
}

fn target_segments(target: &FeedTarget) -> Vec<&str> {
    match target {
        FeedTarget::AllPosts => vec!["posts"],
        FeedTarget::LikedByMe => vec!["posts", "liked"],
        FeedTarget::FavoritedByMe => vec!["posts", "favorites"],
        FeedTarget::LikedByUser(user_id) => vec!["posts", "user", user_id.as_str(), "liked"],
        FeedTarget::FavoritedByUser(user_id) => {
            vec!["posts", "user", user_id.as_str(), "favorites"]
        }
        FeedTarget::PostsByUser { user_id, .. } => vec!["posts", "user", user_id.as_str()],
    }
}

#[async_trait]
impl FeedApi for HttpApi {
    async fn fetch_page(
        &self,
        target: &FeedTarget,
        query: PageQuery,
        last_count: Option<u64>,
    ) -> Result<FetchResult<RawPage>> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let FeedTarget::PostsByUser {
            anonymous: Some(anonymous),
            ..
        } = target
        {
            params.push(("isAnonymous", anonymous.to_string()));
        }

        let url = self.url(&target_segments(target), &params)?;
        let mut request = self.request(Method::GET, url)?;
        if let Some(count) = last_count {
            request = request.header(LAST_COUNT_HEADER, count.to_string());
        }

        let result = self.execute::<RawPostList>(request).await?;
        Ok(result.map(RawPage::from_envelope))
    }

    async fn set_membership(
        &self,
        kind: ToggleKind,
        post_id: &str,
        active: bool,
    ) -> Result<Option<RawPost>> {
        let method = if active { Method::POST } else { Method::DELETE };
        let url = self.url(&["posts", post_id, kind.as_str()], &[])?;
        let request = self.request(method, url)?;

        // Some deployments answer with the updated post, others with a bare ack.
        let post = match self.execute::<serde_json::Value>(request).await? {
            FetchResult::Content(envelope) => envelope
                .data
                .and_then(|value| serde_json::from_value::<RawPost>(value).ok()),
            FetchResult::NotModified => None,
        };
        Ok(post)
    }

    async fn create_post(&self, post: &NewPost) -> Result<RawPost> {
        let url = self.url(&["posts"], &[])?;
        let request = Self::with_json(self.request(Method::POST, url)?, post)?;
        self.execute_data(request).await
    }

    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<RawPost> {
        let url = self.url(&["posts", post_id], &[])?;
        let request = Self::with_json(self.request(Method::PUT, url)?, update)?;
        self.execute_data(request).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        let url = self.url(&["posts", post_id], &[])?;
        let request = self.request(Method::DELETE, url)?;
        match self.execute::<serde_json::Value>(request).await {
            Ok(_) => Ok(()),
            Err(MurmurError::Api { status: 404, .. }) => {
                Err(MurmurError::PostNotFound(post_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let url = self.url(&["posts", "user", user_id, "stats"], &[])?;
        let request = self.request(Method::GET, url)?;
        self.execute_data(request).await
    }
}
