use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use murmur::app::AppContext;
use murmur::cli::{commands, CacheAction, Cli, Commands};
use murmur::config::Config;
use murmur::domain::{FeedTarget, ToggleKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(cli.db, config)?;
    let limit = cli.limit;

    match cli.command {
        Commands::Feed { pages } => {
            commands::show_feed(&ctx, FeedTarget::AllPosts, limit, pages).await?;
        }
        Commands::Liked { pages } => {
            commands::show_feed(&ctx, FeedTarget::LikedByMe, limit, pages).await?;
        }
        Commands::Favorites { pages } => {
            commands::show_feed(&ctx, FeedTarget::FavoritedByMe, limit, pages).await?;
        }
        Commands::User { id, view } => {
            commands::show_user(&ctx, &id, view, limit).await?;
        }
        Commands::Like {
            post_id,
            author,
            undo,
        } => {
            commands::set_membership(&ctx, ToggleKind::Like, &post_id, author.as_deref(), undo)
                .await?;
        }
        Commands::Favorite {
            post_id,
            author,
            undo,
        } => {
            commands::set_membership(
                &ctx,
                ToggleKind::Favorite,
                &post_id,
                author.as_deref(),
                undo,
            )
            .await?;
        }
        Commands::Post {
            text,
            anonymous,
            pseudonym,
        } => {
            commands::create_post(&ctx, &text, anonymous, pseudonym.as_deref()).await?;
        }
        Commands::Edit { post_id, text } => {
            commands::edit_post(&ctx, &post_id, &text).await?;
        }
        Commands::Delete { post_id } => {
            commands::delete_post(&ctx, &post_id).await?;
        }
        Commands::Login { token } => {
            commands::login(&ctx, &token)?;
        }
        Commands::Logout => {
            commands::logout(&ctx)?;
        }
        Commands::Cache {
            action: CacheAction::Clear { user },
        } => {
            commands::clear_cache(&ctx, user.as_deref())?;
        }
    }

    if cli.stats {
        commands::print_metrics(&ctx)?;
    }

    Ok(())
}
