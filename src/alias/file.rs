//! The alias file on disk: loading, backups and atomic publication.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{AliasError, Result};
use crate::model::alias::StoreLine;

/// How the alias file may be read, created and replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Keep the previous content next to the alias file before replacing it.
    pub backup: bool,
    /// Suffix appended to the file name for the backup.
    pub backup_suffix: String,
    /// Start from an empty store when the file does not exist.
    pub create: bool,
    /// Ignore the existing content and start from an empty store.
    pub fresh: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backup: true,
            backup_suffix: ".bak".to_string(),
            create: true,
            fresh: false,
        }
    }
}

/// An alias file loaded into memory.
#[derive(Debug)]
pub struct AliasStore {
    path: PathBuf,
    lines: Vec<StoreLine>,
    existed: bool,
    options: StoreOptions,
}

impl AliasStore {
    /// Load the alias file at `path`.
    ///
    /// A missing file is an error unless `options.create` is set. With
    /// `options.fresh` the existing content is not loaded at all; it is
    /// copied to the backup path when the new content is published.
    pub fn load(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let existed = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                return Err(AliasError::StoreRead {
                    path,
                    source: std::io::Error::other("is a directory"),
                })
            }
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !options.create {
                    return Err(AliasError::StoreNotFound(path));
                }
                false
            }
            Err(source) => return Err(AliasError::StoreRead { path, source }),
        };

        let lines = if existed && !options.fresh {
            let bytes = std::fs::read(&path).map_err(|source| AliasError::StoreRead {
                path: path.clone(),
                source,
            })?;
            split_store_bytes(&path, &bytes)
        } else {
            Vec::new()
        };

        info!(
            path = %path.display(),
            lines = lines.len(),
            existed,
            fresh = options.fresh,
            "Loaded alias file"
        );

        Ok(Self {
            path,
            lines,
            existed,
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines as loaded, in file order.
    pub fn lines(&self) -> &[StoreLine] {
        &self.lines
    }

    /// Take the loaded lines, e.g. to hand them to a merge.
    pub fn take_lines(&mut self) -> Vec<StoreLine> {
        std::mem::take(&mut self.lines)
    }

    /// Did the file exist when it was loaded?
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Where the backup goes.
    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.path, &self.options.backup_suffix)
    }

    /// Replace the alias file with `lines`.
    ///
    /// The content is written to a temporary file in the same directory and
    /// renamed over the alias file. If anything fails before the rename the
    /// temporary file is removed and the alias file is left as it was.
    pub fn publish(&self, lines: &[StoreLine]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !self.existed {
            std::fs::create_dir_all(&dir).map_err(|e| AliasError::store_write(&dir, e))?;
        }

        let mut tmp =
            NamedTempFile::new_in(&dir).map_err(|e| AliasError::store_write(&dir, e))?;
        let write_err = |e| AliasError::store_write(tmp_path_of(&self.path), e);
        tmp.write_all(&render(lines)).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        if self.existed {
            // Keep the alias file's permissions; temp files are created 0600.
            if let Ok(meta) = std::fs::metadata(&self.path) {
                if let Err(e) = std::fs::set_permissions(tmp.path(), meta.permissions()) {
                    warn!(error = %e, "Could not copy alias file permissions");
                }
            }
            self.backup()?;
        }

        tmp.persist(&self.path)
            .map_err(|e| AliasError::store_write(&self.path, e.error))?;
        info!(path = %self.path.display(), lines = lines.len(), "Alias file written");
        Ok(())
    }

    /// Copy the current file to the backup path. The alias file itself stays
    /// in place until the rename replaces it.
    fn backup(&self) -> Result<()> {
        if !self.options.backup {
            return Ok(());
        }
        let backup = self.backup_path();
        std::fs::copy(&self.path, &backup).map_err(|e| AliasError::store_write(&backup, e))?;
        debug!(
            backup = %backup.display(),
            fresh = self.options.fresh,
            "Copied alias file to backup"
        );
        Ok(())
    }
}

/// Backup path: the alias file name with `suffix` appended.
///
/// Example: `~/.mutt/aliases` → `~/.mutt/aliases.bak`
pub fn backup_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Lines joined with `\n`, with a trailing newline when non-empty.
///
/// Loaded lines are written back byte for byte, whatever their encoding.
pub fn render(lines: &[StoreLine]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Only used to give write errors on the temp file a meaningful path.
fn tmp_path_of(path: &Path) -> PathBuf {
    backup_path_for(path, ".tmp")
}

/// Split the file into lines, each keeping the bytes it was read from.
///
/// Alias files are normally UTF-8; a line that is not is read as
/// Windows-1252 for classification only.
fn split_store_bytes(path: &Path, bytes: &[u8]) -> Vec<StoreLine> {
    let mut chunks: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    if chunks.last().is_some_and(|c| c.is_empty()) {
        chunks.pop();
    }

    let mut legacy = 0usize;
    let lines: Vec<StoreLine> = chunks
        .into_iter()
        .map(|chunk| {
            let text = match std::str::from_utf8(chunk) {
                Ok(s) => std::borrow::Cow::Borrowed(s),
                Err(_) => {
                    legacy += 1;
                    encoding_rs::WINDOWS_1252.decode_without_bom_handling(chunk).0
                }
            };
            StoreLine::parse(&text).with_original(chunk)
        })
        .collect();

    if legacy > 0 {
        warn!(
            path = %path.display(),
            lines = legacy,
            "Alias file is not UTF-8, reading those lines as Windows-1252"
        );
    }
    lines
}
