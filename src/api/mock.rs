//! In-memory posts backend for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use crate::api::{FeedApi, FetchResult, RawPage, RawPageMeta, RawPost};
use crate::app::{MurmurError, Result};
use crate::domain::{
    FeedTarget, Membership, NewPost, PageQuery, Post, PostUpdate, ToggleKind, UserStats,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch {
        target: FeedTarget,
        page: u32,
        last_count: Option<u64>,
    },
    Membership {
        kind: ToggleKind,
        post_id: String,
        active: bool,
    },
    Create,
    Update(String),
    Delete(String),
    Stats(String),
}

#[derive(Default)]
struct MockState {
    posts: Vec<Post>,
    calls: Vec<Call>,
    fail_fetches: bool,
    fail_mutations: bool,
    honor_count_hint: bool,
    counts_only_echo: bool,
    page_holds: HashMap<u32, Arc<Notify>>,
    mutation_hold: Option<Arc<Notify>>,
}

pub struct MockApi {
    viewer: String,
    state: Mutex<MockState>,
}

impl MockApi {
    pub fn new(viewer: &str) -> Self {
        Self {
            viewer: viewer.to_string(),
            state: Mutex::new(MockState {
                honor_count_hint: true,
                ..MockState::default()
            }),
        }
    }

    /// `count` posts authored by `author`, ids `p0..`.
    pub fn with_posts(viewer: &str, count: usize, author: &str) -> Self {
        let api = Self::new(viewer);
        api.set_posts((0..count).map(|i| post(&format!("p{}", i), author)).collect());
        api
    }

    pub fn set_posts(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().posts = posts;
    }

    pub fn update_post_state(&self, post_id: &str, f: impl FnOnce(&mut Post)) {
        let mut state = self.state.lock().unwrap();
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            f(post);
        }
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetches = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.state.lock().unwrap().fail_mutations = fail;
    }

    pub fn honor_count_hint(&self, honor: bool) {
        self.state.lock().unwrap().honor_count_hint = honor;
    }

    /// Answer membership mutations with counts but no member lists.
    pub fn echo_counts_only(&self, counts_only: bool) {
        self.state.lock().unwrap().counts_only_echo = counts_only;
    }

    /// Park the next fetch of `page` until the returned handle is notified.
    pub fn hold_page(&self, page: u32) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.state
            .lock()
            .unwrap()
            .page_holds
            .insert(page, notify.clone());
        notify
    }

    /// Park every membership mutation until the returned handle is notified.
    pub fn hold_mutations(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.state.lock().unwrap().mutation_hold = Some(notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Fetch { .. }))
            .count()
    }

    pub fn membership_count(&self, kind: ToggleKind, post_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| match c {
                Call::Membership {
                    kind: k,
                    post_id: id,
                    ..
                } => *k == kind && id == post_id,
                _ => false,
            })
            .count()
    }

    fn matches(&self, target: &FeedTarget, post: &Post) -> bool {
        match target {
            FeedTarget::AllPosts => true,
            FeedTarget::LikedByMe => post.liked_by.contains(&self.viewer),
            FeedTarget::FavoritedByMe => post.favorited_by.contains(&self.viewer),
            FeedTarget::LikedByUser(id) => post.liked_by.contains(id),
            FeedTarget::FavoritedByUser(id) => post.favorited_by.contains(id),
            FeedTarget::PostsByUser { user_id, anonymous } => {
                post.author_id.as_deref() == Some(user_id.as_str())
                    && anonymous.is_none_or(|a| post.is_anonymous == a)
            }
        }
    }
}

pub fn post(id: &str, author: &str) -> Post {
    let mut post = Post::new(id, format!("entry {}", id), author);
    post.author_id = Some(author.to_string());
    post
}

pub fn to_raw(post: &Post) -> RawPost {
    RawPost {
        id: post.id.clone(),
        text: post.text.clone(),
        author_id: post.author_id.clone(),
        author_name: post.author_name.clone(),
        is_anonymous: post.is_anonymous,
        created_at: Some(post.created_at),
        liked_by: Some(post.liked_by.members().map(String::from).collect()),
        like_count: Some(post.liked_by.len()),
        favorited_by: Some(post.favorited_by.members().map(String::from).collect()),
        favorite_count: Some(post.favorited_by.len()),
        ..RawPost::default()
    }
}

fn unavailable() -> MurmurError {
    MurmurError::Api {
        status: 503,
        message: "Service unavailable".into(),
    }
}

#[async_trait]
impl FeedApi for MockApi {
    async fn fetch_page(
        &self,
        target: &FeedTarget,
        query: PageQuery,
        last_count: Option<u64>,
    ) -> Result<FetchResult<RawPage>> {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Fetch {
                target: target.clone(),
                page: query.page,
                last_count,
            });
            state.page_holds.remove(&query.page)
        };
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(unavailable());
        }

        let matching: Vec<&Post> = state
            .posts
            .iter()
            .filter(|p| self.matches(target, p))
            .collect();
        let total = matching.len() as u64;

        if state.honor_count_hint && last_count == Some(total) {
            return Ok(FetchResult::NotModified);
        }

        let start = ((query.page - 1) * query.limit) as usize;
        let posts = matching
            .into_iter()
            .skip(start)
            .take(query.limit as usize)
            .map(to_raw)
            .collect();

        Ok(FetchResult::Content(RawPage {
            posts,
            pagination: Some(RawPageMeta {
                current_page: Some(query.page),
                limit: Some(query.limit),
                total_items: Some(total),
                ..RawPageMeta::default()
            }),
        }))
    }

    async fn set_membership(
        &self,
        kind: ToggleKind,
        post_id: &str,
        active: bool,
    ) -> Result<Option<RawPost>> {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Membership {
                kind,
                post_id: post_id.to_string(),
                active,
            });
            state.mutation_hold.clone()
        };
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_mutations {
            return Err(unavailable());
        }

        let viewer = self.viewer.clone();
        let counts_only = state.counts_only_echo;
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| MurmurError::Api {
                status: 404,
                message: "Post not found".into(),
            })?;

        let membership: &mut Membership = match kind {
            ToggleKind::Like => &mut post.liked_by,
            ToggleKind::Favorite => &mut post.favorited_by,
        };
        if active {
            membership.insert(&viewer);
        } else {
            membership.remove(&viewer);
        }
        post.recount();

        let mut echo = to_raw(post);
        if counts_only {
            echo.liked_by = None;
            echo.favorited_by = None;
        }
        Ok(Some(echo))
    }

    async fn create_post(&self, new: &NewPost) -> Result<RawPost> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create);
        if state.fail_mutations {
            return Err(unavailable());
        }

        let mut post = Post::new(
            format!("new-{}", state.posts.len()),
            new.text.clone(),
            new.author_name.clone(),
        );
        post.author_id = new.author_id.clone();
        post.is_anonymous = new.is_anonymous;
        post.created_at = Utc::now();
        let raw = to_raw(&post);
        state.posts.insert(0, post);
        Ok(raw)
    }

    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<RawPost> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update(post_id.to_string()));
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| MurmurError::PostNotFound(post_id.to_string()))?;
        post.text = update.text.clone();
        Ok(to_raw(post))
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(post_id.to_string()));
        let before = state.posts.len();
        state.posts.retain(|p| p.id != post_id);
        if state.posts.len() == before {
            return Err(MurmurError::PostNotFound(post_id.to_string()));
        }
        Ok(())
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Stats(user_id.to_string()));
        if state.fail_fetches {
            return Err(unavailable());
        }

        let own: Vec<&Post> = state
            .posts
            .iter()
            .filter(|p| p.author_id.as_deref() == Some(user_id))
            .collect();
        Ok(UserStats {
            total_posts: own.len() as u64,
            total_likes: own.iter().map(|p| p.liked_by.len()).sum(),
            total_favorites: own.iter().map(|p| p.favorited_by.len()).sum(),
            liked_posts: state
                .posts
                .iter()
                .filter(|p| p.liked_by.contains(user_id))
                .count() as u64,
            favorited_posts: state
                .posts
                .iter()
                .filter(|p| p.favorited_by.contains(user_id))
                .count() as u64,
        })
    }
}
