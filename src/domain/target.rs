use std::fmt;

use crate::domain::ToggleKind;

/// Which collection a feed view is paging through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedTarget {
    AllPosts,
    LikedByMe,
    FavoritedByMe,
    LikedByUser(String),
    FavoritedByUser(String),
    PostsByUser {
        user_id: String,
        anonymous: Option<bool>,
    },
}

impl FeedTarget {
    pub fn posts_by(user_id: impl Into<String>) -> Self {
        FeedTarget::PostsByUser {
            user_id: user_id.into(),
            anonymous: None,
        }
    }

    /// The membership relation this collection is built from, if any.
    pub fn membership_kind(&self) -> Option<ToggleKind> {
        match self {
            FeedTarget::LikedByMe | FeedTarget::LikedByUser(_) => Some(ToggleKind::Like),
            FeedTarget::FavoritedByMe | FeedTarget::FavoritedByUser(_) => {
                Some(ToggleKind::Favorite)
            }
            FeedTarget::AllPosts | FeedTarget::PostsByUser { .. } => None,
        }
    }

    /// User the collection is scoped to; `None` means the signed-in user or everyone.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            FeedTarget::LikedByUser(id) | FeedTarget::FavoritedByUser(id) => Some(id),
            FeedTarget::PostsByUser { user_id, .. } => Some(user_id),
            _ => None,
        }
    }
}

impl fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedTarget::AllPosts => write!(f, "all posts"),
            FeedTarget::LikedByMe => write!(f, "my liked posts"),
            FeedTarget::FavoritedByMe => write!(f, "my favorites"),
            FeedTarget::LikedByUser(id) => write!(f, "posts liked by {}", id),
            FeedTarget::FavoritedByUser(id) => write!(f, "favorites of {}", id),
            FeedTarget::PostsByUser { user_id, .. } => write!(f, "posts by {}", user_id),
        }
    }
}
