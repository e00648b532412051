//! Page state for one feed view.
//!
//! A [`PaginationController`] owns the accumulated items of a single feed
//! session. Every request carries a generation token; a response is applied
//! only if its token is still the newest one, so a slow `load_more` can
//! never overwrite a later `refresh`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::app::Result;
use crate::domain::{FeedTarget, PageMeta, PageQuery, PageResult, Post};
use crate::service::FeedService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Replace the held items (refresh).
    Replace,
    /// Append to the held items (load more).
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { received: usize, cached: bool },
    /// Nothing to do: already loading, or no next page.
    Skipped,
    /// A newer request was issued while this one was in flight.
    Superseded,
    /// The session was closed while this request was in flight.
    Closed,
}

/// Read-only copy of the session state for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub target: FeedTarget,
    pub limit: u32,
    pub items: Vec<Post>,
    pub pagination: Option<PageMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

struct SessionState {
    target: FeedTarget,
    limit: u32,
    items: Vec<Post>,
    pagination: Option<PageMeta>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    closed: bool,
}

impl SessionState {
    fn reset(&mut self) {
        self.items.clear();
        self.pagination = None;
        self.error = None;
        self.loading = false;
    }

    fn begin(&mut self, page: u32) -> (u64, FeedTarget, PageQuery) {
        self.generation += 1;
        self.loading = true;
        (
            self.generation,
            self.target.clone(),
            PageQuery::new(page, self.limit),
        )
    }
}

pub struct PaginationController {
    service: Arc<FeedService>,
    state: Mutex<SessionState>,
}

impl PaginationController {
    /// Create an empty session. Call [`refresh`](Self::refresh) to load the
    /// first page.
    pub fn new(service: Arc<FeedService>, target: FeedTarget, limit: u32) -> Self {
        Self {
            service,
            state: Mutex::new(SessionState {
                target,
                limit: PageQuery::first(limit).limit,
                items: Vec::new(),
                pagination: None,
                loading: false,
                error: None,
                generation: 0,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch exactly one page and merge it according to `mode`.
    pub async fn load(&self, page: u32, mode: LoadMode) -> Result<LoadOutcome> {
        let request = {
            let mut state = self.lock();
            if state.closed {
                return Ok(LoadOutcome::Closed);
            }
            state.begin(page)
        };
        self.run(request, mode).await
    }

    /// Append the next page. No-op while a request is in flight or when the
    /// last page has been reached.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let request = {
            let mut state = self.lock();
            if state.closed || state.loading {
                return Ok(LoadOutcome::Skipped);
            }
            let next = match state.pagination {
                Some(meta) if meta.has_next => meta.current_page + 1,
                _ => return Ok(LoadOutcome::Skipped),
            };
            state.begin(next)
        };
        self.run(request, LoadMode::Append).await
    }

    /// Reload from page 1, replacing everything held.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        self.load(1, LoadMode::Replace).await
    }

    /// Point the session at another collection. Clears everything and
    /// reloads from page 1.
    pub async fn set_target(&self, target: FeedTarget) -> Result<LoadOutcome> {
        {
            let mut state = self.lock();
            if state.target == target {
                return Ok(LoadOutcome::Skipped);
            }
            state.target = target;
            state.reset();
        }
        self.refresh().await
    }

    pub async fn set_limit(&self, limit: u32) -> Result<LoadOutcome> {
        {
            let mut state = self.lock();
            let limit = PageQuery::first(limit).limit;
            if state.limit == limit {
                return Ok(LoadOutcome::Skipped);
            }
            state.limit = limit;
            state.reset();
        }
        self.refresh().await
    }

    async fn run(
        &self,
        (token, target, query): (u64, FeedTarget, PageQuery),
        mode: LoadMode,
    ) -> Result<LoadOutcome> {
        let result = self.service.fetch_page(&target, query).await;

        let mut state = self.lock();
        if state.closed {
            tracing::debug!(%target, page = query.page, "session closed; dropping response");
            return Ok(LoadOutcome::Closed);
        }
        if state.generation != token {
            tracing::debug!(%target, page = query.page, token, "superseded response dropped");
            self.service.metrics().record_superseded();
            return Ok(LoadOutcome::Superseded);
        }

        state.loading = false;
        match result {
            Ok(page) => {
                let received = page.data.items.len();
                apply_page(&mut state, page.data, mode);
                state.error = None;
                tracing::info!(
                    %target,
                    page = query.page,
                    received,
                    held = state.items.len(),
                    "page applied"
                );
                Ok(LoadOutcome::Applied {
                    received,
                    cached: page.cached,
                })
            }
            Err(e) => {
                state.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Replace a held post with a fresher copy (e.g. from a mutation response).
    pub fn replace_post(&self, post: Post) -> bool {
        let mut state = self.lock();
        match state.items.iter_mut().find(|p| p.id == post.id) {
            Some(slot) => {
                *slot = post;
                true
            }
            None => false,
        }
    }

    pub fn remove_post(&self, post_id: &str) -> bool {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|p| p.id != post_id);
        state.items.len() != before
    }

    /// Show a freshly created post at the top without refetching.
    pub fn prepend_post(&self, post: Post) {
        self.lock().items.insert(0, post);
    }

    /// Stop applying responses. In-flight requests finish but their results
    /// are dropped.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.loading = false;
        state.generation += 1;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn pagination(&self) -> Option<PageMeta> {
        self.lock().pagination
    }

    pub fn target(&self) -> FeedTarget {
        self.lock().target.clone()
    }

    pub fn items(&self) -> Vec<Post> {
        self.lock().items.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            target: state.target.clone(),
            limit: state.limit,
            items: state.items.clone(),
            pagination: state.pagination,
            loading: state.loading,
            error: state.error.clone(),
        }
    }
}

fn apply_page(state: &mut SessionState, page: PageResult, mode: LoadMode) {
    match mode {
        LoadMode::Replace => state.items = page.items,
        LoadMode::Append => state.items.extend(page.items),
    }
    state.pagination = Some(page.pagination);
}
