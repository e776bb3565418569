// ABOUTME: Local bookmark cache stored as one JSON file with atomic writes
// ABOUTME: Upserts by bookmark id while preserving insertion order

use crate::{Bookmark, Error, Result};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence collaborator of the sync engine.
pub trait BookmarkStore {
    /// All cached bookmarks, in the order they were first stored.
    fn load(&self) -> Result<Vec<Bookmark>>;

    /// Inserts or replaces the bookmark with the same id.
    fn store(&mut self, bookmark: &Bookmark) -> Result<()>;
}

pub const PRIVATE_MODE: u32 = 0o600;

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BookmarkStore for FileStore {
    fn load(&self) -> Result<Vec<Bookmark>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn store(&mut self, bookmark: &Bookmark) -> Result<()> {
        let mut bookmarks = self.load()?;
        match bookmarks.iter_mut().find(|b| b.id == bookmark.id) {
            Some(existing) => *existing = bookmark.clone(),
            None => bookmarks.push(bookmark.clone()),
        }

        let json = serde_json::to_vec_pretty(&bookmarks)
            .map_err(|e| Error::Storage(format!("failed to serialize bookmarks: {}", e)))?;
        write_atomic(&self.path, &json, PRIVATE_MODE)
    }
}

/// Writes via a temp file in the target's directory, then renames over it.
/// `mode` is applied on unix only.
pub fn write_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = dir.join(format!(".{:x}.part", random));

    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}
