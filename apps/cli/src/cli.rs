//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rommend", version, about = "Browse a ROM catalog and download titles into per-platform folders")]
pub struct Cli {
    /// Configuration file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Catalog password. Never written to the configuration file.
    #[arg(long, global = true, env = "ROMMEND_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify credentials and remember host and username.
    Login {
        #[arg(long)]
        host: String,
        #[arg(long, short)]
        username: String,
    },
    /// List catalog items.
    List {
        /// Only items of this platform slug.
        #[arg(long)]
        platform: Option<String>,
        /// Case-insensitive substring match on the item name.
        #[arg(long)]
        search: Option<String>,
        /// Fetch from the server even when a cached listing exists.
        #[arg(long)]
        refresh: bool,
    },
    /// Download items by catalog id, one after another.
    Download {
        #[arg(required = true, value_name = "ID")]
        ids: Vec<u64>,
    },
    /// Fetch every cover image into the cache.
    Covers,
    /// Remove cached covers and the cached listing.
    ClearCache,
    /// Forget the saved session and clear the cache.
    Logout,
}
