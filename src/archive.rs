//! Zip packaging for multi-file transfers

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive name shown to the recipient, e.g. `iTransfer_2608311230.zip`
pub fn archive_name(now: DateTime<Local>) -> String {
    format!("iTransfer_{}.zip", now.format("%y%m%d%H%M"))
}

/// Write the given (relative path, bytes) pairs into a deflate-compressed zip
/// at `destination`. Leading slashes are stripped so entries unpack relative
/// to the extraction directory.
pub fn build_zip(destination: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    let file = File::create(destination)
        .with_context(|| format!("Failed to create archive at {}", destination.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, bytes) in entries {
        let entry_name = path.trim_start_matches('/');
        writer
            .start_file(entry_name, options)
            .with_context(|| format!("Failed to start zip entry {}", entry_name))?;
        writer
            .write_all(bytes)
            .with_context(|| format!("Failed to write zip entry {}", entry_name))?;
    }

    writer.finish().context("Failed to finalize archive")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;

    #[test]
    fn test_archive_name_format() {
        let when = Local.with_ymd_and_hms(2026, 8, 31, 12, 30, 0).unwrap();
        assert_eq!(archive_name(when), "iTransfer_2608311230.zip");
    }

    #[test]
    fn test_zip_entries_keep_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.zip");
        let entries = vec![
            ("/folder/a.txt".to_string(), b"hello".to_vec()),
            ("/folder/b/c.txt".to_string(), b"world!".to_vec()),
        ];

        build_zip(&destination, &entries).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut first = archive.by_name("folder/a.txt").unwrap();
        let mut content = String::new();
        first.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
        drop(first);

        assert!(archive.by_name("folder/b/c.txt").is_ok());
    }
}
