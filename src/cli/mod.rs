pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Browse, like and favorite posts from the terminal", long_about = None)]
pub struct Cli {
    /// Path to the cache database
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Posts per page (overrides the config file)
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Print collected metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the global feed
    Feed {
        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// Show posts you liked
    Liked {
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// Show posts you favorited
    Favorites {
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// Show a user's profile or one of their collections
    User {
        /// User id
        id: String,
        /// Collection to show (default: overview of all of them)
        view: Option<UserView>,
    },
    /// Like a post
    Like {
        post_id: String,
        /// Author of the post, so their cached collections are refreshed too
        #[arg(long)]
        author: Option<String>,
        /// Remove the like instead
        #[arg(long)]
        undo: bool,
    },
    /// Favorite a post
    Favorite {
        post_id: String,
        #[arg(long)]
        author: Option<String>,
        /// Remove the favorite instead
        #[arg(long)]
        undo: bool,
    },
    /// Publish a post
    Post {
        text: String,
        /// Hide your identity
        #[arg(long)]
        anonymous: bool,
        /// Name shown on an anonymous post
        #[arg(long = "as", requires = "anonymous")]
        pseudonym: Option<String>,
    },
    /// Replace the text of one of your posts
    Edit { post_id: String, text: String },
    /// Delete one of your posts
    Delete { post_id: String },
    /// Store an API token
    Login { token: String },
    /// Forget the stored API token
    Logout,
    /// Manage cached collections
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop cached collections
    Clear {
        /// Only drop collections that involve this user
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UserView {
    Posts,
    Liked,
    Favorites,
    Stats,
}
