// src/event.rs
use std::path::{Path, PathBuf};

/// The kind of change reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new entry appeared.
    Create,
    /// An entry was deleted.
    Remove,
    /// An entry changed name without leaving its directory.
    Rename,
    /// An entry was moved into a different directory.
    Move,
    /// Anything else (writes, metadata changes). Recorded but never reported.
    Other,
}

/// A single filesystem change as captured by the watcher.
///
/// `prior_path` is only ever populated for [`EventKind::Rename`] and
/// [`EventKind::Move`]; the constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    /// Absolute path of the entry after the operation.
    pub path: PathBuf,
    /// Absolute path of the entry before the operation.
    pub prior_path: Option<PathBuf>,
    /// Base name of the entry.
    pub name: String,
    pub is_dir: bool,
}

impl RawEvent {
    pub fn created(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::simple(EventKind::Create, path.into(), is_dir)
    }

    pub fn removed(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::simple(EventKind::Remove, path.into(), is_dir)
    }

    pub fn other(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::simple(EventKind::Other, path.into(), is_dir)
    }

    /// Builds a relocation event. Staying in the same parent directory is a
    /// rename, anything else is a move.
    pub fn relocated(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_dir: bool) -> Self {
        let from = from.into();
        let to = to.into();
        let kind = if from.parent() == to.parent() {
            EventKind::Rename
        } else {
            EventKind::Move
        };
        Self {
            kind,
            name: base_name(&to),
            path: to,
            prior_path: Some(from),
            is_dir,
        }
    }

    fn simple(kind: EventKind, path: PathBuf, is_dir: bool) -> Self {
        Self {
            kind,
            name: base_name(&path),
            path,
            prior_path: None,
            is_dir,
        }
    }
}

/// Last path component, or the whole path when it has none (e.g. `/`).
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
