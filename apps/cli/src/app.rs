//! Command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use rommend_cache::ContentCache;
use rommend_catalog::{CatalogClient, CatalogError};
use rommend_folders::{PlatformFolderMap, ensure_dir};
use rommend_pipeline::{MaterializeOutcome, Orchestrator, warm_covers};
use rommend_protocol::CatalogItem;
use rommend_protocol::constants::PLATFORM_FOLDERS_TEMPLATE;
use rommend_protocol::format::format_megabytes;
use rommend_transfer::TransferEngine;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::progress::BarSink;

/// Runs the parsed command against `config`, saving it back to
/// `config_path` when the session changes.
pub async fn run(cli: Cli, mut config: Config, config_path: PathBuf) -> anyhow::Result<()> {
    let password = cli.password;
    let cache = ContentCache::new(config.cache_root());

    match cli.command {
        Command::Login { host, username } => {
            let password = require_password(password)?;
            login(&mut config, &config_path, &host, &username, &password).await
        }
        Command::List {
            platform,
            search,
            refresh,
        } => {
            let client = connect(&config, password)?;
            let items = load_items(&cache, &client, refresh).await?;
            let orchestrator = build_orchestrator(&config, client, config.download_root());
            print_items(
                &orchestrator,
                &filter_items(&items, platform.as_deref(), search.as_deref()),
            );
            Ok(())
        }
        Command::Download { ids } => {
            let client = connect(&config, password)?;
            let items = load_items(&cache, &client, false).await?;
            let root = ensure_dir(&config.download_root())
                .context("cannot create the download directory")?;
            let orchestrator = build_orchestrator(&config, client, root);
            download(&orchestrator, &items, &ids).await
        }
        Command::Covers => {
            let client = connect(&config, password)?;
            let items = load_items(&cache, &client, false).await?;
            let before = items.iter().filter(|item| cache.contains(item.id)).count();
            let available = warm_covers(&cache, &client, &items).await;
            println!(
                "Cached covers for {available} of {} items ({} new, {} on disk).",
                items.len(),
                available.saturating_sub(before),
                format_megabytes(cache.size())
            );
            Ok(())
        }
        Command::ClearCache => {
            let freed = cache.size();
            cache.clear();
            println!("Cache cleared ({} freed).", format_megabytes(freed));
            Ok(())
        }
        Command::Logout => {
            config.clear_session();
            config.save_to(&config_path)?;
            cache.clear();
            println!("Logged out.");
            Ok(())
        }
    }
}

fn require_password(password: Option<String>) -> anyhow::Result<String> {
    password.context("a password is required: pass --password or set ROMMEND_PASSWORD")
}

async fn login(
    config: &mut Config,
    config_path: &Path,
    host: &str,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    let client = CatalogClient::new(host, username, password)?;
    match client.login().await {
        Ok(()) => {}
        Err(CatalogError::Unauthorized) => {
            bail!("Login failed. Please check your credentials.")
        }
        Err(e) => return Err(e).context("Connection error"),
    }

    config.host = client.base_url().to_string();
    config.username = username.to_string();
    config.save_to(config_path)?;
    info!(host = %config.host, user = %config.username, "session saved");
    println!("Login successful!");
    Ok(())
}

/// Builds a client from the saved session.
fn connect(config: &Config, password: Option<String>) -> anyhow::Result<Arc<CatalogClient>> {
    if !config.has_session() {
        bail!("not logged in: run `rommend login` first");
    }
    let password = require_password(password)?;
    let client = CatalogClient::new(&config.host, &config.username, &password)?;
    Ok(Arc::new(client))
}

/// Returns the catalog, preferring the cached listing unless `refresh`.
async fn load_items(
    cache: &ContentCache,
    client: &CatalogClient,
    refresh: bool,
) -> anyhow::Result<Vec<CatalogItem>> {
    if !refresh {
        if let Some(snapshot) = cache.load_catalog() {
            eprintln!(
                "Loaded {} ROMs from cache (saved {}).",
                snapshot.items.len(),
                snapshot.saved_at.format("%Y-%m-%d %H:%M")
            );
            return Ok(snapshot.items);
        }
    }

    let items = client
        .list_items()
        .await
        .context("failed to fetch the catalog")?;
    if !items.is_empty() {
        if let Err(e) = cache.save_catalog(&items) {
            warn!(error = %e, "failed to cache catalog listing");
        }
    }
    eprintln!("Fetched {} ROMs.", items.len());
    Ok(items)
}

fn build_orchestrator(config: &Config, client: Arc<CatalogClient>, root: PathBuf) -> Orchestrator {
    let folders_path = config.platform_folders_path();
    let template = folders_path.with_file_name(PLATFORM_FOLDERS_TEMPLATE);
    let folders = PlatformFolderMap::load_with_template(&folders_path, &template);

    let engine = TransferEngine::new(client)
        .with_chunk_size(config.transfer.chunk_size)
        .with_retry_policy(config.transfer.retry_policy())
        .with_read_timeout(config.transfer.read_timeout());

    Orchestrator::new(engine, Arc::new(folders), root)
}

/// Items matching the platform slug and name substring, both case-insensitive.
fn filter_items<'a>(
    items: &'a [CatalogItem],
    platform: Option<&str>,
    search: Option<&str>,
) -> Vec<&'a CatalogItem> {
    let search = search.map(str::to_lowercase);
    items
        .iter()
        .filter(|item| platform.is_none_or(|p| item.platform_fs_slug.eq_ignore_ascii_case(p)))
        .filter(|item| {
            search
                .as_deref()
                .is_none_or(|s| item.name.to_lowercase().contains(s))
        })
        .collect()
}

fn print_items(orchestrator: &Orchestrator, items: &[&CatalogItem]) {
    let mut on_disk = 0;
    for item in items {
        let present = orchestrator
            .plan(item)
            .is_ok_and(|paths| paths.final_path().exists());
        if present {
            on_disk += 1;
        }
        let mark = if present { "*" } else { " " };
        println!(
            "{mark} {:>6}  {:<12}  {:>10}  {}",
            item.id,
            item.platform_fs_slug,
            item.size_label(),
            item.name
        );
    }
    println!("{} items, {on_disk} on disk (*).", items.len());
}

/// Materializes `ids` one at a time. Ctrl-C cancels the active item and
/// skips the rest.
async fn download(
    orchestrator: &Orchestrator,
    items: &[CatalogItem],
    ids: &[u64],
) -> anyhow::Result<()> {
    let mut failed = 0usize;

    for (n, id) in ids.iter().enumerate() {
        let Some(item) = items.iter().find(|item| item.id == *id) else {
            eprintln!("No catalog item with id {id}.");
            failed += 1;
            continue;
        };

        let sink = Arc::new(BarSink::new(&item.name));
        let task = orchestrator.materialize(item, sink.clone());
        tokio::pin!(task);

        let result = tokio::select! {
            result = &mut task => result,
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel();
                task.await
            }
        };
        sink.finish();

        let outcome = result?;
        println!("{}", outcome.status_message(&item.name));
        match outcome {
            MaterializeOutcome::Materialized(_) | MaterializeOutcome::AlreadyPresent(_) => {}
            MaterializeOutcome::Failed(_) => failed += 1,
            MaterializeOutcome::Cancelled => {
                let skipped = ids.len() - n - 1;
                if skipped > 0 {
                    eprintln!("Skipping {skipped} remaining item(s).");
                }
                bail!("download cancelled");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} downloads failed", ids.len());
    }
    Ok(())
}
