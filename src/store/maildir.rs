//! Mail directory reader.
//!
//! Lists message files in a Maildir (`cur/` and `new/`) or in a flat
//! directory of message files, and reads just their header block.
//! Bodies are never loaded.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};

use crate::error::{AliasError, Result};
use crate::parser::header::MessageHeaders;

/// Read buffer for header blocks.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Headers larger than this are truncated (256 KB).
const MAX_HEADER_SIZE: usize = 256 * 1024;

/// Maildir subdirectories holding delivered messages.
const MAILDIR_SUBDIRS: [&str; 2] = ["cur", "new"];

/// One mail source directory.
#[derive(Debug, Clone)]
pub struct Maildir {
    path: PathBuf,
    message_dirs: Vec<PathBuf>,
}

impl Maildir {
    /// Open a mail directory.
    ///
    /// Fails with [`AliasError::SourceRead`] if `path` is missing, not a
    /// directory, or cannot be listed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|e| AliasError::source_read(&path, e))?;
        if !meta.is_dir() {
            return Err(AliasError::source_read(
                &path,
                std::io::Error::other("not a directory"),
            ));
        }
        // Fail early on permission problems rather than halfway through a run.
        std::fs::read_dir(&path).map_err(|e| AliasError::source_read(&path, e))?;

        let subdirs: Vec<PathBuf> = MAILDIR_SUBDIRS
            .iter()
            .map(|sub| path.join(sub))
            .filter(|p| p.is_dir())
            .collect();
        let message_dirs = if subdirs.is_empty() {
            vec![path.clone()]
        } else {
            subdirs
        };
        debug!(path = %path.display(), dirs = message_dirs.len(), "Opened mail directory");

        Ok(Self { path, message_dirs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Message files, sorted by file name.
    ///
    /// With `max_age_days > 0`, files last modified more than that many days
    /// before `now` are skipped. Hidden files and subdirectories are ignored.
    pub fn messages(&self, max_age_days: u32, now: SystemTime) -> Result<Vec<PathBuf>> {
        let cutoff = (max_age_days > 0)
            .then(|| now.checked_sub(Duration::from_secs(u64::from(max_age_days) * 86_400)))
            .flatten();

        let mut files = Vec::new();
        let mut skipped_old = 0usize;
        for dir in &self.message_dirs {
            let entries = std::fs::read_dir(dir).map_err(|e| AliasError::source_read(dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| AliasError::source_read(dir, e))?;
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                if let (Some(cutoff), Ok(modified)) = (cutoff, meta.modified()) {
                    if modified < cutoff {
                        skipped_old += 1;
                        continue;
                    }
                }
                files.push(entry.path());
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!(
            path = %self.path.display(),
            messages = files.len(),
            skipped_old,
            "Listed messages"
        );
        Ok(files)
    }
}

/// Read and unfold the header block of one message file.
pub fn read_headers(path: &Path) -> Result<MessageHeaders> {
    let file = File::open(path).map_err(|e| AliasError::io(path, e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut block: Vec<u8> = Vec::with_capacity(4096);
    let mut line: Vec<u8> = Vec::with_capacity(256);
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| AliasError::io(path, e))?;
        if n == 0 || line == b"\n" || line == b"\r\n" {
            break;
        }
        if block.len() + line.len() > MAX_HEADER_SIZE {
            debug!(path = %path.display(), "Header block truncated");
            break;
        }
        block.extend_from_slice(&line);
    }

    let headers = MessageHeaders::from_bytes(&block);
    trace!(path = %path.display(), headers = headers.len(), "Read headers");
    Ok(headers)
}
