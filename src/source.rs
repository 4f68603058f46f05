//! Normalizes the different ways files arrive (explicit picks, dropped paths,
//! flat pre-resolved lists) into batches of file descriptors

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::selection::{FileDescriptor, FileHandle};
use crate::walker::{self, Entry};

/// One item from a drop operation. Platforms with real directory support hand
/// over paths; platforms that only expose flat file lists hand over the bytes
/// together with whatever relative path they carry.
#[derive(Debug)]
pub enum DropItem {
    Path(PathBuf),
    Flat(FlatFile),
}

/// A file that arrives already resolved, with no directory handle behind it
#[derive(Debug)]
pub struct FlatFile {
    pub name: String,
    /// Relative path the platform exposed for folder selections, if any
    pub relative_path: Option<String>,
    pub contents: Vec<u8>,
}

/// Probe a path once and build the closed entry variant for the walker.
/// Returns `None` for anything that is neither file nor directory.
fn entry_for_path(path: &Path) -> std::io::Result<Option<Entry>> {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return Ok(None),
    };
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        Ok(Some(Entry::File { name, path: path.to_path_buf() }))
    } else if metadata.is_dir() {
        Ok(Some(Entry::Directory { name, path: path.to_path_buf() }))
    } else {
        Ok(None)
    }
}

/// Collect descriptors for explicitly picked paths.
///
/// An empty pick is a cancellation, not an error: the result is simply an
/// empty batch. A path that cannot be read is logged and skipped; the rest of
/// the pick still goes through.
pub async fn collect_picked(paths: &[PathBuf]) -> Vec<FileDescriptor> {
    let mut descriptors = Vec::new();
    for path in paths {
        match entry_for_path(path) {
            Ok(Some(entry)) => match walker::read_entry(entry, "").await {
                Ok(batch) => descriptors.extend(batch),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "skipping inaccessible path"),
        }
    }
    descriptors
}

/// Collect descriptors for a drop operation's item list.
pub async fn collect_dropped(items: Vec<DropItem>) -> Vec<FileDescriptor> {
    let mut descriptors = Vec::new();
    for item in items {
        match item {
            DropItem::Path(path) => match entry_for_path(&path) {
                Ok(Some(entry)) => match walker::read_entry(entry, "").await {
                    Ok(batch) => descriptors.extend(batch),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable entry"),
                },
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping inaccessible path"),
            },
            DropItem::Flat(file) => descriptors.push(descriptor_for_flat(file)),
        }
    }
    descriptors
}

/// Collect descriptors for a flat file list (the legacy directory-input
/// fallback). Every item is a file; its relative path is preserved when the
/// platform exposed one, otherwise the file lands at the root.
pub fn collect_flat(files: Vec<FlatFile>) -> Vec<FileDescriptor> {
    files.into_iter().map(descriptor_for_flat).collect()
}

fn descriptor_for_flat(file: FlatFile) -> FileDescriptor {
    let path = match file.relative_path.as_deref() {
        Some(rel) if !rel.trim_matches('/').is_empty() => normalize_relative(rel),
        _ => format!("/{}", file.name),
    };
    FileDescriptor {
        name: file.name,
        path,
        size: file.contents.len() as u64,
        handle: FileHandle::Memory(file.contents),
    }
}

/// Normalize a platform-supplied relative path to the selection invariant:
/// '/' separators, exactly one leading slash, no trailing slash.
fn normalize_relative(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let trimmed = unified.trim_matches('/');
    format!("/{}", trimmed)
}
