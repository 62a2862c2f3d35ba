//! Command implementations for the `drivetune` binary.
//!
//! Each command prints its result to stdout and returns the process exit code.

use std::process::ExitCode;
use std::sync::Arc;

use drivetune_core::{
    AppConfig, CacheEntry, CacheStats, CacheStore, Catalog, CatalogItem, ConfigManager,
    CredentialProvider, GraphCatalogClient, ItemKind, OfflineSync, PlaybackError, PlaybackQueue,
    Result, StaticToken, SyncEvent, list_all_children, sort_for_display,
};
use serde::Serialize;
use tracing::{debug, info};

/// Offline library as printed by `offline --json`.
#[derive(Debug, Serialize)]
struct LibraryListing<'a> {
    root: &'a std::path::Path,
    entries: &'a [CacheEntry],
    stats: CacheStats,
}

/// State shared by all commands.
pub struct Context {
    config: ConfigManager,
    token: Option<String>,
}

impl Context {
    /// Build a context from loaded configuration and an optional bearer token.
    pub const fn new(config: ConfigManager, token: Option<String>) -> Self {
        Self { config, token }
    }

    fn settings(&self) -> &AppConfig {
        self.config.config()
    }

    fn credentials(&self) -> StaticToken {
        StaticToken::new(self.token.clone().unwrap_or_default())
    }

    fn catalog(&self) -> Result<GraphCatalogClient> {
        GraphCatalogClient::new(&self.settings().catalog)
    }

    fn cache(&self) -> Arc<CacheStore> {
        Arc::new(CacheStore::new(self.config.cache_root()))
    }
}

/// List a remote folder, folders first.
pub fn list(
    ctx: &Context,
    folder_id: Option<&str>,
    all_pages: bool,
    show_hidden: bool,
) -> Result<ExitCode> {
    let catalog = ctx.catalog()?;
    let token = ctx.credentials().access_token()?;

    let (items, more) = if all_pages {
        (list_all_children(&catalog, &token, folder_id)?, false)
    } else {
        let page = catalog.list_children(&token, folder_id)?;
        (page.items, page.next_link.is_some())
    };

    let mut items = if show_hidden {
        items
    } else {
        ctx.config.visible_items(items)
    };
    sort_for_display(&mut items);

    for item in &items {
        let hidden = item.is_folder() && ctx.config.is_hidden(&item.id);
        println!("{}", listing_line(item, hidden));
    }
    if more {
        println!("(more items available, use --all)");
    }
    debug!("Listed {} item(s)", items.len());
    Ok(ExitCode::SUCCESS)
}

/// Download a remote folder for offline playback.
pub fn sync(ctx: &Context, folder_id: &str, folder_name: &str) -> Result<ExitCode> {
    let catalog = ctx.catalog()?;
    let cache = ctx.cache();
    let sync = OfflineSync::new(catalog, cache, ctx.settings().sync.clone());

    let report = sync.download_folder_with_progress(
        folder_id,
        folder_name,
        &ctx.credentials(),
        Some(|event: &SyncEvent| match event {
            SyncEvent::FileDownloaded { name, bytes } => {
                println!("  + {name} ({})", format_bytes(*bytes));
            }
            SyncEvent::FileSkipped { name } => println!("  = {name}"),
            SyncEvent::FolderListed {
                name, audio_files, ..
            } => println!("{name}: {audio_files} track(s)"),
            SyncEvent::Failed(_) | SyncEvent::Finished { .. } => {}
        }),
    );

    println!("{}", report.summary());
    for failure in &report.failures {
        println!("  ! {:?} \"{}\": {}", failure.scope, failure.name, failure.error);
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Print the offline library.
pub fn offline(ctx: &Context, json: bool) -> Result<ExitCode> {
    let cache = ctx.cache();
    let entries = cache.entries()?;
    let stats = cache.stats();

    if json {
        let listing = LibraryListing {
            root: cache.root(),
            entries: &entries,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(ExitCode::SUCCESS);
    }

    for entry in &entries {
        println!("{}", library_line(entry));
    }
    println!(
        "{} track(s), {} file(s) using {} in {}",
        entries.len(),
        stats.entry_count,
        format_bytes(stats.total_bytes),
        cache.root().display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Remove one cached track.
pub fn remove(ctx: &Context, name: &str) -> Result<ExitCode> {
    if ctx.cache().delete(name) {
        println!("Removed {name}");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{name} is not in the offline library");
        Ok(ExitCode::FAILURE)
    }
}

/// Remove every cached track.
pub fn clear(ctx: &Context) -> Result<ExitCode> {
    let cache = ctx.cache();
    cache.delete_all()?;
    info!("Offline library cleared");
    println!("Cleared {}", cache.root().display());
    Ok(ExitCode::SUCCESS)
}

/// Hide a folder from listings.
pub fn hide(ctx: &mut Context, folder_id: &str) -> Result<ExitCode> {
    if ctx.config.hide_folder(folder_id)? {
        println!("Hidden {folder_id}");
    } else {
        println!("{folder_id} was already hidden");
    }
    Ok(ExitCode::SUCCESS)
}

/// Show a hidden folder again.
pub fn unhide(ctx: &mut Context, folder_id: &str) -> Result<ExitCode> {
    if ctx.config.unhide_folder(folder_id)? {
        println!("Unhidden {folder_id}");
    } else {
        println!("{folder_id} was not hidden");
    }
    Ok(ExitCode::SUCCESS)
}

/// Print what would play after `name` in the offline library.
pub fn upcoming(ctx: &Context, name: &str, count: Option<usize>) -> Result<ExitCode> {
    let count = count.unwrap_or(ctx.settings().playback.upcoming_count);
    let entries = ctx.cache().entries()?;
    let next = upcoming_after(&entries, name, count)?;

    if next.is_empty() {
        println!("Nothing after {name}");
    }
    for (i, item) in next.iter().enumerate() {
        println!("{:>2}. {}", i + 1, item.name);
    }
    Ok(ExitCode::SUCCESS)
}

/// Queue the offline library starting at `name` and return the lookahead.
pub fn upcoming_after(entries: &[CacheEntry], name: &str, count: usize) -> Result<Vec<CatalogItem>> {
    let items: Vec<CatalogItem> = entries
        .iter()
        .map(|e| CatalogItem::file(e.path.to_string_lossy(), e.name.clone(), None))
        .collect();

    let index = items
        .iter()
        .position(|item| item.name == name)
        .ok_or_else(|| PlaybackError::NotAvailableOffline {
            name: name.to_string(),
        })?;

    let queue = PlaybackQueue::new(items, index)?;
    Ok(queue.upcoming(count).cloned().collect())
}

fn listing_line(item: &CatalogItem, hidden: bool) -> String {
    let marker = if hidden { " (hidden)" } else { "" };
    match &item.kind {
        ItemKind::Folder {
            child_count: Some(n),
        } => format!("[dir] {}/ ({n} items){marker}  {}", item.name, item.id),
        ItemKind::Folder { child_count: None } => {
            format!("[dir] {}/{marker}  {}", item.name, item.id)
        }
        ItemKind::File { .. } if item.is_audio() => format!("[mp3] {}  {}", item.name, item.id),
        ItemKind::File { .. } => format!("      {}  {}", item.name, item.id),
    }
}

fn library_line(entry: &CacheEntry) -> String {
    let folder = entry.subfolder.as_deref().unwrap_or("-");
    format!(
        "{:<40} {:>10}  {}",
        entry.name,
        format_bytes(entry.size_bytes),
        folder
    )
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
