//! # Murmur
//!
//! Client-side data layer for a small social posting service: paged feeds,
//! optimistic likes and favorites, and count-hinted caching of membership
//! collections.
//!
//! ## Architecture
//!
//! ```text
//! HttpApi → Normalizer → FeedService (+ CachedQuery/Store) → FeedSession
//!                                                           ├ PaginationController
//!                                                           └ ToggleController
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Store an API token
//! murmur login <token>
//!
//! # Browse the global feed, two pages at a time
//! murmur feed --pages 2
//!
//! # Like a post, then take it back
//! murmur like 64f0c2 --author u42
//! murmur like 64f0c2 --author u42 --undo
//!
//! # Profile overview
//! murmur user u42
//! ```

/// Posts API client.
///
/// - [`FeedApi`](api::FeedApi): async trait every backend implements
/// - [`HttpApi`](api::HttpApi): reqwest-based implementation
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together config, store,
/// API client, metrics and the feed service.
pub mod app;

/// Count-hinted cache of liked/favorited collections.
pub mod cache;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/murmur/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Post`](domain::Post) with its like/favorite [`Membership`](domain::Membership)
/// - [`FeedTarget`](domain::FeedTarget): which collection to page through
/// - [`PageQuery`](domain::PageQuery) / [`PageResult`](domain::PageResult)
pub mod domain;

/// Optimistic like/favorite toggles with rollback.
pub mod mutation;

/// Wire payloads to domain models.
///
/// All shape decisions (bare vs wrapped lists, membership arrays vs
/// counts, missing page metadata) are made here.
pub mod normalizer;

/// Page accumulation with stale-response protection.
pub mod pagination;

/// Feed operations with caching and invalidation applied.
pub mod service;

/// A feed view combining pages and optimistic toggle state.
pub mod session;

/// SQLite persistence for cached collections and the auth token.
pub mod store;

/// In-process counters and latency samples.
pub mod telemetry;
