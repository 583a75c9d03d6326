// src/watcher.rs
use crate::config::AppConfig;
use crate::error::WatchError;
use crate::event::RawEvent;
use notify::event::{CreateKind, EventKind as NotifyKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, FileIdMap};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, Receiver};
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Capacity of the channel between the watcher thread and the collector.
const CHANNEL_CAPACITY: usize = 256;

/// What the watcher thread forwards to the async side.
///
/// Closure of the channel is the third signal: the watcher has stopped.
#[derive(Debug)]
pub enum WatcherMessage {
    Event(RawEvent),
    Error(WatchError),
}

/// Keeps the OS watch alive. Dropping it stops watching and closes the channel.
pub struct WatcherHandle {
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

/// Starts a recursive, debounced watch on the configured folder.
///
/// The folder check, debouncer creation and watch registration all happen
/// before this returns. Events are then translated on a background thread
/// and sent through the returned channel. The debounce window is the
/// configured polling interval.
///
/// # Arguments
///
/// * `app_config` - Application configuration holding the folder and polling interval.
///
/// # Returns
///
/// A [`WatcherHandle`] that must be kept alive for watching to continue, and
/// the receiver the collector reads [`WatcherMessage`]s from.
///
/// # Errors
///
/// Returns [`WatchError`] if the folder is missing or not a directory, or if
/// the watcher cannot be created or registered on it.
pub fn start_watcher(
    app_config: &AppConfig,
) -> Result<(WatcherHandle, Receiver<WatcherMessage>), WatchError> {
    let folder = app_config.folder.as_path();
    if !folder.exists() {
        return Err(WatchError::FolderMissing(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(WatchError::NotADirectory(folder.to_path_buf()));
    }

    let (debouncer_internal_tx, debouncer_internal_rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(app_config.polling, None, debouncer_internal_tx)
        .map_err(WatchError::Create)?;

    debouncer
        .watcher()
        .watch(folder, RecursiveMode::Recursive)
        .map_err(|source| WatchError::Register {
            path: folder.to_path_buf(),
            source,
        })?;
    // Root must be in the file id cache for rename tracking to pair events.
    debouncer.cache().add_root(folder, RecursiveMode::Recursive);
    info!("Watching folder: {}", folder.display());

    let mut directories = DirectoryIndex::scan(folder);
    debug!("Indexed {} directories under {}", directories.len(), folder.display());

    let (event_tx, event_rx) = mpsc::channel::<WatcherMessage>(CHANNEL_CAPACITY);

    std::thread::spawn(move || {
        // Ends once the debouncer (owned by the handle) is dropped.
        while let Ok(debouncer_result) = debouncer_internal_rx.recv() {
            match debouncer_result {
                Ok(events) => {
                    for debounced_event in events {
                        if let Some(event) = translate(&debounced_event, &mut directories) {
                            debug!("[WatcherThread] Produced event: {:?}", event);
                            if event_tx.blocking_send(WatcherMessage::Event(event)).is_err() {
                                info!("[WatcherThread] Receiver dropped. Exiting.");
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("[WatcherThread] Watcher reported error: {:?}", e);
                        if event_tx
                            .blocking_send(WatcherMessage::Error(WatchError::Runtime(e)))
                            .is_err()
                        {
                            return;
                        }
                    }
                    return;
                }
            }
        }
        info!("[WatcherThread] Debouncer stopped. Exiting.");
    });

    Ok((
        WatcherHandle {
            _debouncer: debouncer,
        },
        event_rx,
    ))
}

/// Directories known to exist under the watched folder.
///
/// Once an entry is gone it can no longer be stat'ed, so removals and
/// rename-from halves are classified from this index instead.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    dirs: HashSet<PathBuf>,
}

impl DirectoryIndex {
    /// Indexes `root` and every directory below it.
    pub fn scan(root: &Path) -> Self {
        let mut index = Self::default();
        index.insert_tree(root);
        index
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    fn insert_tree(&mut self, root: &Path) {
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_dir() {
                self.dirs.insert(entry.into_path());
            }
        }
    }

    /// Drops `path` and everything below it. Returns whether `path` was a
    /// known directory.
    fn forget(&mut self, path: &Path) -> bool {
        let known = self.dirs.contains(path);
        if known {
            self.dirs.retain(|d| !d.starts_with(path));
        }
        known
    }

    /// Re-roots `from` and its descendants under `to`.
    fn relocate(&mut self, from: &Path, to: &Path) {
        self.forget(from);
        self.insert_tree(to);
    }
}

/// Maps a debounced notify event onto a [`RawEvent`], keeping `directories`
/// in step. Access events and events without paths are dropped.
pub fn translate(
    debounced_event: &DebouncedEvent,
    directories: &mut DirectoryIndex,
) -> Option<RawEvent> {
    let paths = &debounced_event.paths;
    let first = match paths.first() {
        Some(p) => p,
        None => {
            debug!("Received debounced event with no paths: {:?}", debounced_event);
            return None;
        }
    };

    let event = match debounced_event.kind {
        NotifyKind::Access(_) => return None,
        NotifyKind::Create(CreateKind::File) => RawEvent::created(first, false),
        NotifyKind::Create(kind) => {
            let is_dir = kind == CreateKind::Folder || first.is_dir();
            if is_dir {
                directories.insert_tree(first);
            }
            RawEvent::created(first, is_dir)
        }
        NotifyKind::Remove(kind) => {
            let known = directories.forget(first);
            RawEvent::removed(first, known || kind == RemoveKind::Folder)
        }
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            let to = &paths[1];
            let is_dir = to.is_dir() || directories.contains(first);
            if is_dir {
                directories.relocate(first, to);
            }
            RawEvent::relocated(first, to, is_dir)
        }
        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            RawEvent::removed(first, directories.forget(first))
        }
        NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => appeared(first, directories),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            // Unpaired rename halves: existence tells which side this is.
            if first.exists() {
                appeared(first, directories)
            } else {
                RawEvent::removed(first, directories.forget(first))
            }
        }
        _ => RawEvent::other(first, first.is_dir() || directories.contains(first)),
    };
    Some(event)
}

fn appeared(path: &Path, directories: &mut DirectoryIndex) -> RawEvent {
    let is_dir = path.is_dir();
    if is_dir {
        directories.insert_tree(path);
    }
    RawEvent::created(path, is_dir)
}
