//! Storage root management and safe file-name resolution.
//!
//! The storage root is one flat directory; every client-visible file is a
//! direct child of it. All name handling funnels through
//! [`Storage::resolve`], which is the only way an untrusted name becomes an
//! on-disk path.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ShareError;

/// Longest accepted file name, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Prefix of scratch files holding in-flight uploads. Dot-prefixed, so they
/// are invisible to listing and unreachable through `resolve`.
const SCRATCH_PREFIX: &str = ".";

/// Suffix of scratch files, also matched when sweeping leftovers at startup.
const SCRATCH_SUFFIX: &str = ".part";

// See: https://learn.microsoft.com/en-us/windows/win32/fileio/naming-a-file
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL",
    "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9",
    "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// One file inside the storage root, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedFile {
    pub name: String,
    pub size: u64,
}

/// Handle to the storage root. Cheap to clone; the canonical root path never
/// changes after [`Storage::open`].
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open the storage root, creating it (and missing parents) if absent,
    /// and pin it to its canonical path. Scratch files orphaned by an
    /// earlier run that was killed mid-upload are swept here, since nothing
    /// else can ever reach them again.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("cannot create storage directory {}", root.display()))?;
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("cannot canonicalize storage directory {}", root.display()))?;
        tracing::debug!("storage root: {}", root.display());
        let storage = Self { root };
        storage.sweep_stale_scratch().await;
        Ok(storage)
    }

    /// Remove leftover `.{uuid}.part` files from interrupted runs.
    async fn sweep_stale_scratch(&self) {
        let Ok(mut dir) = tokio::fs::read_dir(&self.root).await else {
            return;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(SCRATCH_PREFIX) || !name.ends_with(SCRATCH_SUFFIX) {
                continue;
            }
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => {}
                _ => continue,
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => tracing::info!("swept stale scratch file {:?}", name),
                Err(e) => tracing::warn!("cannot sweep stale scratch file {:?}: {e}", name),
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a client-supplied name to a path strictly inside the root.
    ///
    /// Anything that is not a plain visible file name is rejected: empty or
    /// overlong input, path separators, control characters, `.` and `..`,
    /// dot-prefixed (hidden) names, Windows reserved device names, and names
    /// whose existing on-disk target escapes the root through a symlink.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ShareError> {
        let invalid = || ShareError::InvalidPath(name.to_string());

        // 1. Shape checks that need no filesystem access
        if name.trim().is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(invalid());
        }
        if name.contains(['/', '\\']) || name.chars().any(|c| c.is_control()) {
            return Err(invalid());
        }
        if name.starts_with('.') {
            return Err(invalid());
        }
        if RESERVED_NAMES.iter().any(|r| name.eq_ignore_ascii_case(r)) {
            return Err(invalid());
        }

        // 2. join() swaps the base path out entirely when the name smuggles
        // in an absolute or drive-relative component; the parent and
        // file_name comparison catches that
        let candidate = self.root.join(name);
        if candidate.parent() != Some(self.root.as_path())
            || candidate.file_name() != Some(OsStr::new(name))
        {
            return Err(invalid());
        }

        // 3. An existing entry may be a symlink pointing anywhere; follow it
        // and require the real path to stay under the root
        if let Ok(real) = std::fs::canonicalize(&candidate) {
            if !real.starts_with(&self.root) {
                return Err(invalid());
            }
        }

        Ok(candidate)
    }

    /// Snapshot of the visible files in the root: regular files only, hidden
    /// entries skipped, sorted by name. An empty or missing root yields an
    /// empty list.
    pub async fn list(&self) -> Result<Vec<SharedFile>, ShareError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ShareError::Internal(format!(
                    "cannot read storage directory: {e}"
                )));
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ShareError::Internal(format!("cannot read storage directory: {e}")))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                // Non-UTF-8 names are not addressable over the API
                Err(_) => continue,
            };
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed between readdir and stat
                Err(_) => continue,
            };
            if !meta.is_file() {
                continue;
            }
            files.push(SharedFile {
                name,
                size: meta.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Open `name` for reading, returning the handle and its current size.
    pub async fn open_file(&self, name: &str) -> Result<(tokio::fs::File, u64), ShareError> {
        let path = self.resolve(name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ShareError::NotFound(name.to_string()));
            }
            Err(e) => return Err(ShareError::Internal(format!("cannot open {name:?}: {e}"))),
        };
        let meta = file
            .metadata()
            .await
            .map_err(|e| ShareError::Internal(format!("cannot stat {name:?}: {e}")))?;
        if !meta.is_file() {
            return Err(ShareError::NotFound(name.to_string()));
        }
        Ok((file, meta.len()))
    }

    /// Remove `name` from the root. Deleting an absent file succeeds with
    /// `false` since the end state is the same; a name that resolves to
    /// something other than a regular file is reported as missing and never
    /// removed.
    pub async fn delete(&self, name: &str) -> Result<bool, ShareError> {
        let path = self.resolve(name)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ShareError::Internal(format!("cannot stat {name:?}: {e}"))),
        };
        if !meta.is_file() {
            return Err(ShareError::NotFound(name.to_string()));
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("deleted {:?}", name);
                Ok(true)
            }
            // Lost a race with a concurrent delete; the end state holds
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShareError::Internal(format!("cannot delete {name:?}: {e}"))),
        }
    }

    /// Fresh scratch path for an in-flight upload.
    pub fn scratch_path(&self) -> PathBuf {
        self.root.join(format!(
            "{}{}{}",
            SCRATCH_PREFIX,
            Uuid::new_v4().simple(),
            SCRATCH_SUFFIX
        ))
    }
}
