use chrono::Utc;

use crate::api::{CountOrMembers, RawPage, RawPageMeta, RawPost};
use crate::domain::{Membership, PageMeta, PageQuery, PageResult, Post};
use crate::telemetry::Metrics;

/// Turns raw API payloads into domain types.
///
/// Every endpoint-specific shape decision lives here: which of a membership
/// array or a count is authoritative, and how page metadata is filled in
/// when the server leaves parts of it out.
#[derive(Clone, Default)]
pub struct Normalizer {
    metrics: Metrics,
}

impl Normalizer {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    pub fn normalize_post(&self, raw: RawPost) -> Post {
        let (liked_by, like_count) =
            self.reconcile(&raw.id, "like", raw.liked_by, raw.like_count, raw.likes);
        let (favorited_by, favorite_count) = self.reconcile(
            &raw.id,
            "favorite",
            raw.favorited_by,
            raw.favorite_count,
            raw.favorites,
        );

        Post {
            id: raw.id,
            text: raw.text,
            author_id: raw.author_id.filter(|id| !id.is_empty()),
            author_name: raw.author_name,
            is_anonymous: raw.is_anonymous,
            created_at: raw.created_at.unwrap_or_else(Utc::now),
            liked_by,
            like_count,
            favorited_by,
            favorite_count,
        }
    }

    pub fn normalize_page(&self, raw: RawPage, query: PageQuery) -> PageResult {
        let items: Vec<Post> = raw
            .posts
            .into_iter()
            .map(|p| self.normalize_post(p))
            .collect();
        let pagination = self.page_meta(raw.pagination, query, items.len() as u64);

        PageResult { items, pagination }
    }

    /// Pick one authoritative membership for a post.
    ///
    /// A non-empty member list wins; otherwise the reported count is kept as
    /// unnamed members. The returned count always equals the membership size.
    fn reconcile(
        &self,
        post_id: &str,
        relation: &str,
        members: Option<Vec<String>>,
        count: Option<u64>,
        combined: Option<CountOrMembers>,
    ) -> (Membership, u64) {
        let (members, count) = match combined {
            Some(CountOrMembers::Members(list)) => (members.or(Some(list)), count),
            Some(CountOrMembers::Count(n)) => (members, count.or(Some(n))),
            None => (members, count),
        };

        let membership = match members {
            Some(list) if !list.is_empty() => {
                let membership = Membership::from_members(list);
                if let Some(reported) = count {
                    if reported != membership.len() {
                        tracing::warn!(
                            post_id,
                            relation,
                            reported,
                            members = membership.len(),
                            "count disagrees with membership; using membership"
                        );
                        self.metrics.record_count_mismatch();
                    }
                }
                membership
            }
            _ => Membership::from_count(count.unwrap_or(0)),
        };

        let len = membership.len();
        (membership, len)
    }

    fn page_meta(&self, raw: Option<RawPageMeta>, query: PageQuery, received: u64) -> PageMeta {
        let Some(raw) = raw else {
            // No metadata: the response is the rest of the collection.
            let limit = if query.page == 1 {
                query.limit.max(received as u32)
            } else {
                query.limit
            };
            let before = u64::from(query.page.saturating_sub(1)) * u64::from(limit);
            return PageMeta::from_totals(query.page, limit, before + received);
        };

        let current_page = raw.current_page.unwrap_or(query.page).max(1);
        let limit = raw.limit.filter(|l| *l > 0).unwrap_or(query.limit);
        let total_items = match (raw.total_items, raw.total_pages) {
            (Some(total), _) => total,
            (None, Some(pages)) if current_page < pages => u64::from(pages) * u64::from(limit),
            _ => u64::from(current_page - 1) * u64::from(limit) + received,
        };

        let meta = PageMeta::from_totals(current_page, limit, total_items);

        let server_disagrees = raw.total_pages.is_some_and(|p| p != meta.total_pages)
            || raw.has_next.is_some_and(|h| h != meta.has_next);
        if server_disagrees {
            tracing::warn!(
                current_page,
                total_items,
                server_total_pages = ?raw.total_pages,
                server_has_next = ?raw.has_next,
                "page metadata inconsistent; recomputed from total"
            );
        }

        meta
    }
}
