//! The staged selection: descriptors for every file queued for the next upload

use std::path::PathBuf;

/// Where the bytes of a staged file live until the upload consumes them
#[derive(Debug, Clone)]
pub enum FileHandle {
    /// A file on the local filesystem, read at upload time
    Disk(PathBuf),
    /// Bytes already resident in memory (flat sources hand these over directly)
    Memory(Vec<u8>),
}

/// One file staged for upload
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Original filename, no directory components
    pub name: String,
    /// POSIX-style path relative to the pick/drop root.
    /// Invariant: single leading slash, no trailing slash, '/' separators.
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Ownership of the payload until the upload consumes it
    pub handle: FileHandle,
}

/// Ordered sequence of staged files. Insertion order is significant (it is the
/// order fields are appended to the outgoing request) and duplicates are legal.
#[derive(Debug, Default)]
pub struct Selection {
    files: Vec<FileDescriptor>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate a batch to the end of the selection, preserving existing
    /// entries. Successive drops/picks each append one whole batch.
    pub fn append(&mut self, descriptors: Vec<FileDescriptor>) {
        self.files.extend(descriptors);
    }

    /// Remove exactly one descriptor. Out-of-range indices are a no-op.
    pub fn remove_at(&mut self, index: usize) {
        if index < self.files.len() {
            self.files.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// Total payload size in bytes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Render a byte count using binary (1024) units with two-decimal precision.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    if exponent == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[exponent])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, size: u64) -> FileDescriptor {
        let name = path.rsplit('/').next().unwrap().to_string();
        FileDescriptor {
            name,
            path: path.to_string(),
            size,
            handle: FileHandle::Memory(vec![0; size as usize]),
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut selection = Selection::new();
        selection.append(vec![descriptor("/a.txt", 1), descriptor("/b.txt", 2)]);
        selection.append(vec![descriptor("/c/d.txt", 3)]);

        let paths: Vec<&str> = selection.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.txt", "/b.txt", "/c/d.txt"]);
        assert_eq!(selection.total_size(), 6);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut selection = Selection::new();
        selection.append(vec![descriptor("/a.txt", 1)]);
        selection.append(vec![descriptor("/a.txt", 1)]);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_remove_at() {
        let mut selection = Selection::new();
        selection.append(vec![
            descriptor("/a.txt", 1),
            descriptor("/b.txt", 2),
            descriptor("/c.txt", 3),
        ]);

        selection.remove_at(1);
        let paths: Vec<&str> = selection.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.txt", "/c.txt"]);

        // Out of range is a no-op
        selection.remove_at(5);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut selection = Selection::new();
        selection.append(vec![descriptor("/a.txt", 1)]);
        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }
}
