//! Offline download of a remote folder tree.
//!
//! [`OfflineSync`] walks a remote folder breadth-first and copies every audio
//! file it finds into the [`CacheStore`]. Files already cached by name are
//! skipped. A failure in one folder or file is recorded in the
//! [`SyncReport`] and the walk carries on with the remaining work.
//!
//! The walk is synchronous and blocking. Async callers should run it on a
//! blocking thread (`tokio::task::spawn_blocking`).
//!
//! # Example
//!
//! ```rust,ignore
//! use drivetune_core::offline::{OfflineSync, SyncOptions};
//!
//! let sync = OfflineSync::new(client, Arc::clone(&cache), SyncOptions::default());
//! let report = sync.download_folder("01ABC", "Albums", &credentials);
//! println!("{}", report.summary());
//! ```

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::CredentialProvider;
use crate::cache::{CacheStore, WriteOutcome};
use crate::catalog::{Catalog, CatalogItem, list_all_children};
use crate::error::{ErrorKind, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Options controlling an offline download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Follow `@odata.nextLink` and fetch every page of each folder.
    /// When `false`, only the first page of each folder is considered.
    #[serde(default)]
    pub follow_next_links: bool,

    /// Stop after this many audio files have been considered.
    #[serde(default)]
    pub max_items: Option<usize>,
}

impl SyncOptions {
    /// Options that fetch every page of every folder.
    #[must_use]
    pub fn complete() -> Self {
        Self {
            follow_next_links: true,
            max_items: None,
        }
    }

    /// Limit the number of audio files considered.
    #[must_use]
    pub const fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

/// What a failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Listing a folder failed; nothing below it was visited.
    Folder,
    /// Downloading a single file failed.
    File,
}

/// A recorded per-item failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Folder or file.
    pub scope: FailureScope,
    /// Display name of the folder or file.
    pub name: String,
    /// Error category.
    pub kind: ErrorKind,
    /// Error message.
    pub error: String,
}

/// Progress notification emitted during a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A folder was listed.
    FolderListed {
        /// Folder name.
        name: String,
        /// Number of subfolders queued.
        subfolders: usize,
        /// Number of audio files found.
        audio_files: usize,
    },
    /// A file was already cached.
    FileSkipped {
        /// File name.
        name: String,
    },
    /// A file was downloaded into the cache.
    FileDownloaded {
        /// File name.
        name: String,
        /// Bytes written.
        bytes: u64,
    },
    /// A folder or file failed.
    Failed(SyncFailure),
    /// The walk ended.
    Finished {
        /// Files downloaded.
        downloaded: usize,
        /// Files skipped.
        skipped: usize,
        /// Failures recorded.
        failed: usize,
    },
}

/// Outcome of [`OfflineSync::download_folder`].
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Folders whose listing was attempted.
    pub folders_visited: usize,
    /// Files downloaded.
    pub downloaded: usize,
    /// Audio files already cached.
    pub skipped: usize,
    /// Non-audio files left alone.
    pub ignored: usize,
    /// Bytes downloaded.
    pub bytes_downloaded: u64,
    /// Everything that failed.
    pub failures: Vec<SyncFailure>,
    /// Whether the walk stopped on a cancellation request.
    pub cancelled: bool,
    /// Whether the walk stopped at `max_items`.
    pub limit_reached: bool,
    /// Wall-clock time spent.
    pub duration: Duration,
}

impl SyncReport {
    /// No failures and not cancelled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// One-line human readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let head = if self.cancelled {
            "Offline download cancelled"
        } else {
            "Offline download finished"
        };
        format!(
            "{}: {} downloaded, {} already cached, {} failed across {} folder(s) in {:.2}s",
            head,
            self.downloaded,
            self.skipped,
            self.failures.len(),
            self.folders_visited,
            self.duration.as_secs_f64()
        )
    }

    fn record_failure(&mut self, failure: SyncFailure) {
        warn!(
            "Offline download of {} \"{}\" failed: {}",
            match failure.scope {
                FailureScope::Folder => "folder",
                FailureScope::File => "file",
            },
            failure.name,
            failure.error
        );
        self.failures.push(failure);
    }
}

/// Walks a remote folder tree and fills the cache.
pub struct OfflineSync<C: Catalog, F: FileSystem = RealFileSystem> {
    catalog: C,
    cache: Arc<CacheStore<F>>,
    options: SyncOptions,
    cancelled: Arc<AtomicBool>,
}

impl<C: Catalog, F: FileSystem> OfflineSync<C, F> {
    /// Create a coordinator.
    pub fn new(catalog: C, cache: Arc<CacheStore<F>>, options: SyncOptions) -> Self {
        Self {
            catalog,
            cache,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an existing cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Request cancellation. Takes effect before the next folder or file.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancellation flag that can be handed to another thread.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// The catalog in use.
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Download every audio file below a folder.
    pub fn download_folder<P>(&self, folder_id: &str, folder_name: &str, credentials: &P) -> SyncReport
    where
        P: CredentialProvider + ?Sized,
    {
        self.download_folder_with_progress(
            folder_id,
            folder_name,
            credentials,
            None::<fn(&SyncEvent)>,
        )
    }

    /// Download every audio file below a folder, reporting progress.
    ///
    /// Folders are visited breadth-first. Each file lands in a cache subfolder
    /// named after the remote folder that listed it.
    pub fn download_folder_with_progress<P, Cb>(
        &self,
        folder_id: &str,
        folder_name: &str,
        credentials: &P,
        progress: Option<Cb>,
    ) -> SyncReport
    where
        P: CredentialProvider + ?Sized,
        Cb: Fn(&SyncEvent),
    {
        let start = Instant::now();
        let emit = |event: SyncEvent| {
            if let Some(cb) = &progress {
                cb(&event);
            }
        };

        info!("Starting offline download of \"{}\"", folder_name);

        let mut report = SyncReport::default();
        let mut considered = 0usize;
        let mut pending: VecDeque<(String, String)> = VecDeque::new();
        pending.push_back((folder_id.to_string(), folder_name.to_string()));

        'folders: while let Some((id, name)) = pending.pop_front() {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.folders_visited += 1;
            let children = match self.list_folder(&id, credentials) {
                Ok(children) => children,
                Err(e) => {
                    let failure = SyncFailure {
                        scope: FailureScope::Folder,
                        name: name.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    };
                    emit(SyncEvent::Failed(failure.clone()));
                    report.record_failure(failure);
                    continue;
                }
            };

            let mut audio = Vec::new();
            let mut subfolders = 0usize;
            for child in children {
                if child.is_folder() {
                    subfolders += 1;
                    pending.push_back((child.id, child.name));
                } else if child.is_audio() {
                    audio.push(child);
                } else {
                    report.ignored += 1;
                }
            }

            debug!(
                "Folder \"{}\": {} subfolder(s), {} audio file(s)",
                name,
                subfolders,
                audio.len()
            );
            emit(SyncEvent::FolderListed {
                name: name.clone(),
                subfolders,
                audio_files: audio.len(),
            });

            for item in audio {
                if self.is_cancelled() {
                    report.cancelled = true;
                    break 'folders;
                }
                if let Some(max) = self.options.max_items
                    && considered >= max
                {
                    info!("Stopping after {} file(s)", max);
                    report.limit_reached = true;
                    break 'folders;
                }
                considered += 1;

                if self.cache.exists(&item.name) {
                    debug!("\"{}\" already cached", item.name);
                    report.skipped += 1;
                    emit(SyncEvent::FileSkipped { name: item.name });
                    continue;
                }

                match self.fetch_file(&item, &name, credentials) {
                    Ok((WriteOutcome::Stored(_), bytes)) => {
                        report.downloaded += 1;
                        report.bytes_downloaded += bytes;
                        emit(SyncEvent::FileDownloaded {
                            name: item.name,
                            bytes,
                        });
                    }
                    Ok((WriteOutcome::AlreadyPresent(_), _)) => {
                        report.skipped += 1;
                        emit(SyncEvent::FileSkipped { name: item.name });
                    }
                    Err(e) => {
                        let failure = SyncFailure {
                            scope: FailureScope::File,
                            name: item.name,
                            kind: e.kind(),
                            error: e.to_string(),
                        };
                        emit(SyncEvent::Failed(failure.clone()));
                        report.record_failure(failure);
                    }
                }
            }
        }

        report.duration = start.elapsed();
        info!("{}", report.summary());
        emit(SyncEvent::Finished {
            downloaded: report.downloaded,
            skipped: report.skipped,
            failed: report.failures.len(),
        });
        report
    }

    fn list_folder<P>(&self, folder_id: &str, credentials: &P) -> Result<Vec<CatalogItem>>
    where
        P: CredentialProvider + ?Sized,
    {
        let token = credentials.access_token()?;
        if self.options.follow_next_links {
            list_all_children(&self.catalog, &token, Some(folder_id))
        } else {
            Ok(self.catalog.list_children(&token, Some(folder_id))?.items)
        }
    }

    fn fetch_file<P>(
        &self,
        item: &CatalogItem,
        folder_name: &str,
        credentials: &P,
    ) -> Result<(WriteOutcome, u64)>
    where
        P: CredentialProvider + ?Sized,
    {
        let token = credentials.access_token()?;
        let locator = self.catalog.download_locator(&token, &item.id)?;

        let mut staged = self.cache.staging_file()?;
        let bytes = self.catalog.fetch_content(&locator, staged.as_file_mut())?;
        staged.as_file_mut().flush()?;

        let staged = staged.into_temp_path();
        let outcome = self.cache.write(&item.name, &staged, Some(folder_name))?;
        Ok((outcome, bytes))
    }
}
