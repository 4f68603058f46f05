//! Recursive enumeration of filesystem entries into flat file descriptors

use std::io;
use std::path::PathBuf;

use crate::selection::{FileDescriptor, FileHandle};

/// A native reference to a file or directory before its contents are read.
/// The source adapter probes the filesystem exactly once and hands the walker
/// this closed variant, so no capability re-probing happens during recursion.
#[derive(Debug, Clone)]
pub enum Entry {
    File { name: String, path: PathBuf },
    Directory { name: String, path: PathBuf },
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File { name, .. } | Entry::Directory { name, .. } => name,
        }
    }
}

/// Join a base path and a child name into a selection-relative path.
/// An empty base yields `/name`, keeping the single-leading-slash invariant.
fn join_path(base: &str, name: &str) -> String {
    format!("{}/{}", base, name)
}

/// Flatten one entry into the file descriptors beneath it.
///
/// A file yields exactly one descriptor; a directory is listed and each child
/// visited in listing order. The recursion awaits every listing call, so a
/// whole batch materializes before anything is appended to a selection.
/// Children that are neither file nor directory (sockets, fifos, dangling
/// symlinks) are skipped. Symlink cycles are not detected.
pub async fn read_entry(entry: Entry, base_path: &str) -> io::Result<Vec<FileDescriptor>> {
    match entry {
        Entry::File { name, path } => {
            let metadata = tokio::fs::metadata(&path).await?;
            Ok(vec![FileDescriptor {
                path: join_path(base_path, &name),
                size: metadata.len(),
                handle: FileHandle::Disk(path),
                name,
            }])
        }
        Entry::Directory { name, path } => {
            let child_base = join_path(base_path, &name);
            let mut descriptors = Vec::new();

            let mut listing = tokio::fs::read_dir(&path).await?;
            while let Some(child) = listing.next_entry().await? {
                let file_type = child.file_type().await?;
                let child_name = child.file_name().to_string_lossy().into_owned();

                let child_entry = if file_type.is_file() {
                    Entry::File { name: child_name, path: child.path() }
                } else if file_type.is_dir() {
                    Entry::Directory { name: child_name, path: child.path() }
                } else {
                    continue;
                };

                let batch = Box::pin(read_entry(child_entry, &child_base)).await?;
                descriptors.extend(batch);
            }

            Ok(descriptors)
        }
    }
}
