//! Wire shapes of the posts API.
//!
//! Endpoints disagree on how they report lists and membership, so these
//! types accept every variant seen in the wild and leave reconciliation to
//! the normalizer.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `{ success, data, message?, pagination? }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub pagination: Option<RawPageMeta>,
    #[serde(default)]
    pub not_modified: bool,
}

fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    /// Envelope for a successful response with no body (e.g. 204).
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            pagination: None,
            not_modified: false,
        }
    }
}

/// A `likes`/`favorites` field that is either a member list or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CountOrMembers {
    Count(u64),
    Members(Vec<String>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPost {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub is_anonymous: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub liked_by: Option<Vec<String>>,
    pub like_count: Option<u64>,
    pub favorited_by: Option<Vec<String>>,
    pub favorite_count: Option<u64>,
    pub likes: Option<CountOrMembers>,
    pub favorites: Option<CountOrMembers>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPageMeta {
    #[serde(alias = "page")]
    pub current_page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "total", alias = "totalCount")]
    pub total_items: Option<u64>,
    pub total_pages: Option<u32>,
    #[serde(alias = "hasNextPage")]
    pub has_next: Option<bool>,
    #[serde(alias = "hasPrevPage")]
    pub has_prev: Option<bool>,
}

/// List payload: either `data: [...]` or `data: { posts: [...], pagination }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPostList {
    Bare(Vec<RawPost>),
    Wrapped {
        posts: Vec<RawPost>,
        pagination: Option<RawPageMeta>,
    },
}

/// One page as received, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub posts: Vec<RawPost>,
    pub pagination: Option<RawPageMeta>,
}

impl RawPage {
    pub fn from_envelope(envelope: ApiEnvelope<RawPostList>) -> Self {
        match envelope.data {
            Some(RawPostList::Bare(posts)) => Self {
                posts,
                pagination: envelope.pagination,
            },
            Some(RawPostList::Wrapped { posts, pagination }) => Self {
                posts,
                pagination: pagination.or(envelope.pagination),
            },
            None => Self {
                posts: Vec::new(),
                pagination: envelope.pagination,
            },
        }
    }
}
