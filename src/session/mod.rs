//! A feed view: paged items plus the viewer's optimistic like/favorite
//! state, rendered together.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::app::{MurmurError, Result};
use crate::domain::{FeedTarget, Post, ToggleKind};
use crate::mutation::{Notice, ToggleController, ToggleOutcome};
use crate::pagination::{LoadOutcome, PaginationController, SessionSnapshot};
use crate::service::FeedService;

/// One post as it should be displayed to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub post: Post,
    pub liked: bool,
    pub favorited: bool,
    pub like_count: u64,
    pub favorite_count: u64,
    /// Profile to link the author name to. `None` for anonymous posts.
    pub profile_author_id: Option<String>,
}

impl PostView {
    /// View of a post exactly as the server reported it, with no optimistic
    /// state applied.
    pub fn from_server(post: Post, viewer_id: Option<&str>) -> Self {
        let member =
            |kind: ToggleKind| viewer_id.is_some_and(|v| post.membership(kind).contains(v));
        Self {
            liked: member(ToggleKind::Like),
            favorited: member(ToggleKind::Favorite),
            like_count: post.like_count,
            favorite_count: post.favorite_count,
            profile_author_id: post.profile_author_id().map(String::from),
            post,
        }
    }
}

pub struct FeedSession {
    feed: PaginationController,
    toggles: ToggleController,
    viewer_id: Option<String>,
}

impl FeedSession {
    pub fn new(service: Arc<FeedService>, target: FeedTarget, limit: u32) -> Self {
        let viewer_id = service.viewer_id().map(String::from);
        Self {
            toggles: ToggleController::new(service.clone()),
            feed: PaginationController::new(service, target, limit),
            viewer_id,
        }
    }

    pub fn feed(&self) -> &PaginationController {
        &self.feed
    }

    pub fn toggles(&self) -> &ToggleController {
        &self.toggles
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.toggles.subscribe()
    }

    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let outcome = self.feed.refresh().await?;
        self.after_load(&outcome);
        Ok(outcome)
    }

    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let outcome = self.feed.load_more().await?;
        self.after_load(&outcome);
        Ok(outcome)
    }

    pub async fn set_target(&self, target: FeedTarget) -> Result<LoadOutcome> {
        let outcome = self.feed.set_target(target).await?;
        self.after_load(&outcome);
        Ok(outcome)
    }

    pub async fn set_limit(&self, limit: u32) -> Result<LoadOutcome> {
        let outcome = self.feed.set_limit(limit).await?;
        self.after_load(&outcome);
        Ok(outcome)
    }

    fn after_load(&self, outcome: &LoadOutcome) {
        if matches!(outcome, LoadOutcome::Applied { .. }) {
            self.sync(&self.feed.items());
        }
    }

    fn sync(&self, posts: &[Post]) {
        if let Some(viewer) = self.viewer_id.as_deref() {
            self.toggles.sync_from_posts(posts, viewer);
        }
    }

    /// Toggle `kind` on a held post from the state currently displayed.
    pub async fn toggle(&self, kind: ToggleKind, post_id: &str) -> Result<ToggleOutcome> {
        let Some(viewer) = self.viewer_id.as_deref() else {
            return Err(MurmurError::Unauthorized);
        };
        let post = self
            .feed
            .items()
            .into_iter()
            .find(|p| p.id == post_id)
            .ok_or_else(|| MurmurError::PostNotFound(post_id.to_string()))?;

        let currently_active = self.toggles.is_active(kind, post_id);
        let outcome = self
            .toggles
            .toggle(kind, post_id, currently_active, post.author_id.as_deref())
            .await;

        if let ToggleOutcome::Confirmed { active, post: echo } = &outcome {
            let updated = match echo {
                Some(echo) => settle_echo(echo.clone(), kind, viewer, *active),
                None => with_membership(post, kind, viewer, *active),
            };
            self.sync(std::slice::from_ref(&updated));
            self.feed.replace_post(updated);
        }
        Ok(outcome)
    }

    /// Show a post created by the viewer at the top of the feed.
    pub fn prepend_post(&self, post: Post) {
        self.sync(std::slice::from_ref(&post));
        self.feed.prepend_post(post);
    }

    pub fn remove_post(&self, post_id: &str) -> bool {
        self.feed.remove_post(post_id)
    }

    pub fn close(&self) {
        self.feed.close();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.feed.snapshot()
    }

    /// Held posts with the viewer's effective flags and counts applied.
    pub fn view(&self) -> Vec<PostView> {
        self.feed
            .items()
            .into_iter()
            .map(|post| self.view_post(post))
            .collect()
    }

    fn view_post(&self, post: Post) -> PostView {
        let liked = self.effective(&post, ToggleKind::Like);
        let favorited = self.effective(&post, ToggleKind::Favorite);
        PostView {
            liked: liked.0,
            like_count: liked.1,
            favorited: favorited.0,
            favorite_count: favorited.1,
            profile_author_id: post.profile_author_id().map(String::from),
            post,
        }
    }

    /// Effective flag and count for `kind`. The server count is shifted by
    /// however far the optimistic flag is from the server's membership.
    fn effective(&self, post: &Post, kind: ToggleKind) -> (bool, u64) {
        let count = post.count(kind);
        let Some(viewer) = self.viewer_id.as_deref() else {
            return (false, count);
        };
        let server = post.membership(kind).contains(viewer);
        let active = self.toggles.is_active(kind, &post.id);
        let count = match (active, server) {
            (true, false) => count + 1,
            (false, true) => count.saturating_sub(1),
            _ => count,
        };
        (active, count)
    }
}

/// Apply a confirmed change locally when the server did not echo the post.
fn with_membership(mut post: Post, kind: ToggleKind, viewer: &str, active: bool) -> Post {
    let membership = post.membership_mut(kind);
    if active {
        membership.insert(viewer);
    } else {
        membership.remove(viewer);
    }
    post.recount();
    post
}

/// Make a server echo agree with a confirmed change.
///
/// An echo that only carries counts already includes the viewer, so one
/// unnamed member is claimed instead of adding another.
fn settle_echo(mut post: Post, kind: ToggleKind, viewer: &str, active: bool) -> Post {
    let membership = post.membership_mut(kind);
    if membership.contains(viewer) != active {
        if !active {
            membership.remove(viewer);
        } else if !membership.claim(viewer) {
            membership.insert(viewer);
        }
    }
    post.recount();
    post
}
