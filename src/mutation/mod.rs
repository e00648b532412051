//! Optimistic like/favorite toggles.
//!
//! The controller holds a single effective membership set per toggle kind.
//! A toggle flips it immediately, calls the server, and flips it back if
//! the server call fails. At most one request per `(kind, post)` is in
//! flight; a second tap while one is pending is ignored.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::domain::{Post, ToggleKind};
use crate::service::FeedService;

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The server accepted the change. `post` is its updated copy when the
    /// response carried one.
    Confirmed { active: bool, post: Option<Post> },
    /// A toggle for the same post and kind was already in flight.
    Duplicate,
    /// The server call failed and the optimistic flip was undone.
    RolledBack { active: bool, message: String },
}

/// User-facing notification emitted when a toggle had to be rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: ToggleKind,
    pub post_id: String,
    pub message: String,
}

#[derive(Default)]
struct ToggleState {
    active: HashMap<ToggleKind, HashSet<String>>,
    pending: HashMap<ToggleKind, HashSet<String>>,
}

impl ToggleState {
    fn set_active(&mut self, kind: ToggleKind, post_id: &str, active: bool) {
        let set = self.active.entry(kind).or_default();
        if active {
            set.insert(post_id.to_string());
        } else {
            set.remove(post_id);
        }
    }

    fn is_active(&self, kind: ToggleKind, post_id: &str) -> bool {
        self.active.get(&kind).is_some_and(|s| s.contains(post_id))
    }

    fn is_pending(&self, kind: ToggleKind, post_id: &str) -> bool {
        self.pending.get(&kind).is_some_and(|s| s.contains(post_id))
    }
}

/// Clears the pending mark when the toggle finishes or its future is dropped.
struct PendingGuard<'a> {
    state: &'a Mutex<ToggleState>,
    kind: ToggleKind,
    post_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = state.pending.get_mut(&self.kind) {
            set.remove(self.post_id);
        }
    }
}

pub struct ToggleController {
    service: Arc<FeedService>,
    state: Mutex<ToggleState>,
    notices: broadcast::Sender<Notice>,
}

impl ToggleController {
    pub fn new(service: Arc<FeedService>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            service,
            state: Mutex::new(ToggleState::default()),
            notices,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ToggleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive rollback notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Effective membership as it should be displayed.
    pub fn is_active(&self, kind: ToggleKind, post_id: &str) -> bool {
        self.lock().is_active(kind, post_id)
    }

    pub fn is_pending(&self, kind: ToggleKind, post_id: &str) -> bool {
        self.lock().is_pending(kind, post_id)
    }

    /// Take server truth for `viewer_id` from freshly fetched posts.
    ///
    /// Posts with a toggle in flight keep their optimistic state; the
    /// confirmation or rollback of that toggle settles them.
    pub fn sync_from_posts(&self, posts: &[Post], viewer_id: &str) {
        let mut state = self.lock();
        for post in posts {
            for kind in ToggleKind::ALL {
                if state.is_pending(kind, &post.id) {
                    continue;
                }
                let active = post.membership(kind).contains(viewer_id);
                state.set_active(kind, &post.id, active);
            }
        }
    }

    /// Flip `kind` on `post_id` optimistically and confirm with the server.
    ///
    /// `currently_active` is the state the user saw when tapping.
    /// `author_id` scopes cache invalidation to the post author's
    /// collections.
    pub async fn toggle(
        &self,
        kind: ToggleKind,
        post_id: &str,
        currently_active: bool,
        author_id: Option<&str>,
    ) -> ToggleOutcome {
        let desired = !currently_active;
        {
            let mut state = self.lock();
            if !state
                .pending
                .entry(kind)
                .or_default()
                .insert(post_id.to_string())
            {
                tracing::debug!(%kind, post_id, "toggle already in flight; ignoring");
                self.service.metrics().record_duplicate_toggle();
                return ToggleOutcome::Duplicate;
            }
            state.set_active(kind, post_id, desired);
        }
        let _pending = PendingGuard {
            state: &self.state,
            kind,
            post_id,
        };

        let result = self
            .service
            .set_membership(kind, post_id, desired, author_id)
            .await;

        match result {
            Ok(post) => {
                self.service.metrics().record_toggle_confirmed();
                tracing::info!(%kind, post_id, active = desired, "toggle confirmed");
                ToggleOutcome::Confirmed {
                    active: desired,
                    post,
                }
            }
            Err(e) => {
                self.lock().set_active(kind, post_id, currently_active);
                self.service.metrics().record_toggle_rolled_back();
                tracing::warn!(%kind, post_id, error = %e, "toggle failed; rolled back");

                let message = e.user_message();
                // No subscribers is fine; the outcome still reports the failure.
                let _ = self.notices.send(Notice {
                    kind,
                    post_id: post_id.to_string(),
                    message: message.clone(),
                });
                ToggleOutcome::RolledBack {
                    active: currently_active,
                    message,
                }
            }
        }
    }
}
