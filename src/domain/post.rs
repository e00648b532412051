use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two independent membership relations a user can have with a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleKind {
    Like,
    Favorite,
}

impl ToggleKind {
    pub const ALL: [ToggleKind; 2] = [ToggleKind::Like, ToggleKind::Favorite];

    /// Path segment used by the REST API (`/posts/{id}/like`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleKind::Like => "like",
            ToggleKind::Favorite => "favorite",
        }
    }
}

impl fmt::Display for ToggleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of users attached to a post through a like or favorite.
///
/// Some endpoints only report how many users there are. Those members are
/// kept as an `unnamed` tally so [`Membership::len`] always matches the
/// count the server reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    members: BTreeSet<String>,
    #[serde(default)]
    unnamed: u64,
}

impl Membership {
    pub fn from_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            unnamed: 0,
        }
    }

    pub fn from_count(count: u64) -> Self {
        Self {
            members: BTreeSet::new(),
            unnamed: count,
        }
    }

    pub fn len(&self) -> u64 {
        self.members.len() as u64 + self.unnamed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the membership is only known as a number.
    pub fn is_count_only(&self) -> bool {
        self.members.is_empty() && self.unnamed > 0
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    pub fn insert(&mut self, user_id: &str) -> bool {
        self.members.insert(user_id.to_string())
    }

    pub fn remove(&mut self, user_id: &str) -> bool {
        self.members.remove(user_id)
    }

    /// Name one of the unnamed members. Returns `false`, changing nothing,
    /// when there are no unnamed members left.
    pub fn claim(&mut self, user_id: &str) -> bool {
        if self.unnamed == 0 || self.contains(user_id) {
            return false;
        }
        self.unnamed -= 1;
        self.insert(user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub author_name: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub liked_by: Membership,
    pub like_count: u64,
    pub favorited_by: Membership,
    pub favorite_count: u64,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        author_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author_id: None,
            author_name: author_name.into(),
            is_anonymous: false,
            created_at: Utc::now(),
            liked_by: Membership::default(),
            like_count: 0,
            favorited_by: Membership::default(),
            favorite_count: 0,
        }
    }

    /// Author id to navigate to a profile with.
    ///
    /// Always `None` for anonymous posts, even when the payload leaked an
    /// `authorId`.
    pub fn profile_author_id(&self) -> Option<&str> {
        if self.is_anonymous {
            return None;
        }
        self.author_id.as_deref()
    }

    pub fn membership(&self, kind: ToggleKind) -> &Membership {
        match kind {
            ToggleKind::Like => &self.liked_by,
            ToggleKind::Favorite => &self.favorited_by,
        }
    }

    pub fn membership_mut(&mut self, kind: ToggleKind) -> &mut Membership {
        match kind {
            ToggleKind::Like => &mut self.liked_by,
            ToggleKind::Favorite => &mut self.favorited_by,
        }
    }

    /// Reset both counts to their membership sizes.
    pub fn recount(&mut self) {
        self.like_count = self.liked_by.len();
        self.favorite_count = self.favorited_by.len();
    }

    pub fn count(&self, kind: ToggleKind) -> u64 {
        match kind {
            ToggleKind::Like => self.like_count,
            ToggleKind::Favorite => self.favorite_count,
        }
    }

    pub fn has_consistent_counts(&self) -> bool {
        self.like_count == self.liked_by.len() && self.favorite_count == self.favorited_by.len()
    }
}

/// Body of `POST /posts`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub author_name: String,
    pub is_anonymous: bool,
}

impl NewPost {
    pub fn new(text: impl Into<String>, author_id: &str, author_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author_id: Some(author_id.to_string()),
            author_name: author_name.into(),
            is_anonymous: false,
        }
    }

    pub fn anonymous(text: impl Into<String>, pseudonym: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author_id: None,
            author_name: pseudonym.into(),
            is_anonymous: true,
        }
    }
}

/// Body of `PUT /posts/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct PostUpdate {
    pub text: String,
}

/// Counts returned by `GET /posts/user/{userId}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_posts: u64,
    pub total_likes: u64,
    pub total_favorites: u64,
    pub liked_posts: u64,
    pub favorited_posts: u64,
}
