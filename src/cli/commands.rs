use crate::app::{AppContext, MurmurError, Result};
use crate::cli::UserView;
use crate::domain::{FeedTarget, NewPost, PageMeta, PostUpdate, ToggleKind, UserStats};
use crate::pagination::LoadOutcome;
use crate::session::PostView;
use crate::store::Store;

const DEFAULT_PSEUDONYM: &str = "Anonymous";

pub async fn show_feed(
    ctx: &AppContext,
    target: FeedTarget,
    limit: Option<u32>,
    pages: u32,
) -> Result<()> {
    let session = ctx.session(target, limit);
    let cached = matches!(
        session.refresh().await?,
        LoadOutcome::Applied { cached: true, .. }
    );
    for _ in 1..pages {
        if session.load_more().await? == LoadOutcome::Skipped {
            break;
        }
    }

    let views = session.view();
    if views.is_empty() {
        println!("No posts");
        return Ok(());
    }

    for view in &views {
        println!("{}\n", format_post(view));
    }
    if let Some(meta) = session.snapshot().pagination {
        println!("{}", format_footer(&meta, views.len(), cached));
    }
    Ok(())
}

pub async fn show_user(
    ctx: &AppContext,
    user_id: &str,
    view: Option<UserView>,
    limit: Option<u32>,
) -> Result<()> {
    let target = match view {
        Some(UserView::Posts) => FeedTarget::posts_by(user_id),
        Some(UserView::Liked) => FeedTarget::LikedByUser(user_id.to_string()),
        Some(UserView::Favorites) => FeedTarget::FavoritedByUser(user_id.to_string()),
        Some(UserView::Stats) => {
            let stats = ctx.service.user_stats(user_id).await?;
            println!("{}", format_stats(&stats.data));
            return Ok(());
        }
        None => return show_overview(ctx, user_id, limit).await,
    };
    show_feed(ctx, target, limit, 1).await
}

async fn show_overview(ctx: &AppContext, user_id: &str, limit: Option<u32>) -> Result<()> {
    let limit = limit.unwrap_or_else(|| ctx.config.feed.limit());
    let overview = ctx.service.user_overview(user_id, limit).await?;
    let viewer = ctx.service.viewer_id();

    println!("{}", format_stats(&overview.stats));
    for (title, page) in [
        ("Posts", overview.posts),
        ("Liked", overview.liked),
        ("Favorites", overview.favorited),
    ] {
        println!("\n== {} ({}) ==", title, page.pagination.total_items);
        for post in page.items {
            println!("{}\n", format_post(&PostView::from_server(post, viewer)));
        }
    }
    Ok(())
}

pub async fn set_membership(
    ctx: &AppContext,
    kind: ToggleKind,
    post_id: &str,
    author_id: Option<&str>,
    undo: bool,
) -> Result<()> {
    let active = !undo;
    let post = ctx
        .service
        .set_membership(kind, post_id, active, author_id)
        .await?;

    let verb = match (kind, active) {
        (ToggleKind::Like, true) => "Liked",
        (ToggleKind::Like, false) => "Unliked",
        (ToggleKind::Favorite, true) => "Favorited",
        (ToggleKind::Favorite, false) => "Unfavorited",
    };
    match post {
        Some(post) => println!("{} {} ({} {}s)", verb, post_id, post.count(kind), kind),
        None => println!("{} {}", verb, post_id),
    }
    Ok(())
}

pub async fn create_post(
    ctx: &AppContext,
    text: &str,
    anonymous: bool,
    pseudonym: Option<&str>,
) -> Result<()> {
    let new = if anonymous {
        NewPost::anonymous(text, pseudonym.unwrap_or(DEFAULT_PSEUDONYM))
    } else {
        let account = &ctx.config.account;
        let user_id = account.user_id.as_deref().ok_or_else(|| {
            MurmurError::Config("Set account.user_id in config.toml to post under your name".into())
        })?;
        let name = account.display_name.as_deref().unwrap_or(user_id);
        NewPost::new(text, user_id, name)
    };

    let post = ctx.service.create_post(&new).await?;
    println!("Posted {} as {}", post.id, post.author_name);
    Ok(())
}

pub async fn edit_post(ctx: &AppContext, post_id: &str, text: &str) -> Result<()> {
    let update = PostUpdate {
        text: text.to_string(),
    };
    ctx.service.update_post(post_id, &update).await?;
    println!("Updated {}", post_id);
    Ok(())
}

pub async fn delete_post(ctx: &AppContext, post_id: &str) -> Result<()> {
    ctx.service.delete_post(post_id).await?;
    println!("Deleted {}", post_id);
    Ok(())
}

pub fn login(ctx: &AppContext, token: &str) -> Result<()> {
    ctx.store.set_token(token.trim())?;
    println!("Token saved");
    Ok(())
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    ctx.store.clear_token()?;
    ctx.store.clear_all_cache()?;
    println!("Signed out");
    Ok(())
}

pub fn clear_cache(ctx: &AppContext, user_id: Option<&str>) -> Result<()> {
    match user_id {
        Some(id) => {
            ctx.service.cache().invalidate(Some(id))?;
            println!("Cleared cached collections for {}", id);
        }
        None => {
            let cleared = ctx.store.clear_all_cache()?;
            println!("Cleared {} cached collections", cleared);
        }
    }
    Ok(())
}

pub fn print_metrics(ctx: &AppContext) -> Result<()> {
    let snapshot = ctx.metrics.snapshot();
    eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn format_post(view: &PostView) -> String {
    let author = match &view.profile_author_id {
        Some(id) => format!("{} (@{})", view.post.author_name, id),
        None => view.post.author_name.clone(),
    };
    let like = if view.liked { "♥" } else { "♡" };
    let favorite = if view.favorited { "★" } else { "☆" };

    format!(
        "{}  {}  {}\n  {}\n  {} {}  {} {}",
        view.post.id,
        view.post.created_at.format("%Y-%m-%d %H:%M"),
        author,
        view.post.text,
        like,
        view.like_count,
        favorite,
        view.favorite_count
    )
}

fn format_footer(meta: &PageMeta, shown: usize, cached: bool) -> String {
    let mut footer = format!(
        "Page {} of {} ({} of {} posts)",
        meta.current_page, meta.total_pages, shown, meta.total_items
    );
    if meta.has_next {
        footer.push_str(", more available");
    }
    if cached {
        footer.push_str(" [cached]");
    }
    footer
}

fn format_stats(stats: &UserStats) -> String {
    format!(
        "{} posts, {} likes received, {} favorites received\n{} liked, {} favorited",
        stats.total_posts,
        stats.total_likes,
        stats.total_favorites,
        stats.liked_posts,
        stats.favorited_posts
    )
}
