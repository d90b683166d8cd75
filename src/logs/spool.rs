//! Inbound Log Spool
//!
//! A directory of uploaded log batches. Writers create a hidden or
//! `.tmp` file and rename it into place once complete, so any visible
//! non-`.tmp` file is fully written. Files may be gzip compressed.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use flate2::bufread::GzDecoder;
use uuid::Uuid;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether a spool entry name marks a complete batch.
pub fn is_eligible(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.ends_with(".tmp")
}

/// Eligible batch files in `dir`, sorted by name.
pub fn pending_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_eligible(name) {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Open a batch for line reading, decompressing gzip transparently.
pub fn open_batch(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if compressed {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Atomically publish `contents` as a new batch in `dir`.
///
/// The data is written to a hidden temp file first and renamed into
/// place, so the ingestor never sees a partial batch.
pub fn write_batch(dir: &Path, prefix: &str, contents: &[u8]) -> io::Result<PathBuf> {
    let name = format!("{}-{}", prefix, Uuid::new_v4().simple());
    let temp = dir.join(format!(".{}.tmp", name));
    let target = dir.join(name);

    let mut file = File::create(&temp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, &target)?;
    Ok(target)
}

/// Move a batch that could not be read out of the eligible set.
pub fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("batch");
    let target = path.with_file_name(format!(".{}.bad", name));
    fs::rename(path, &target)?;
    Ok(target)
}
