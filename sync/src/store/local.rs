//! Local directory store using walkdir and tokio::fs

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::warn;
use walkdir::WalkDir;

use super::{ItemStore, StoreResolver};
use crate::error::{ConfigError, Side, StoreError};
use crate::item::{Fingerprint, Listing};

/// Files under a root directory, keyed by their `/`-separated relative path
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    allow_missing_root: bool,
}

impl LocalStore {
    /// Store over an existing directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allow_missing_root: false,
        }
    }

    /// Treat a missing root as empty; it is created on first write
    pub fn allow_missing_root(mut self, allow: bool) -> Self {
        self.allow_missing_root = allow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, rejecting anything that escapes it
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if key.is_empty() || escapes {
            return Err(StoreError::Malformed {
                key: key.to_string(),
                message: "key is not a relative path".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Key for a file under `root`. `None` when the relative path is empty or
    /// not valid UTF-8, since such a key could not be mapped back to the file.
    fn key_for(root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    async fn fingerprint_path(&self, key: &str, path: &Path) -> Result<Fingerprint, StoreError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| StoreError::from_io(key, e))?;

        let mut file = fs::File::open(path)
            .await
            .map_err(|e| StoreError::from_io(key, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0; 8192];
        loop {
            let bytes_read = file
                .read(&mut buffer)
                .await
                .map_err(|e| StoreError::from_io(key, e))?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Fingerprint {
            size: metadata.len(),
            hash: Some(hasher.finalize().to_hex().to_string()),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

#[async_trait]
impl ItemStore for LocalStore {
    async fn list(&self) -> Result<Listing, StoreError> {
        let root_key = self.root.display().to_string();
        match fs::metadata(&self.root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::Malformed {
                    key: root_key,
                    message: "path is not a directory".to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && self.allow_missing_root => {
                return Ok(Listing::new());
            }
            Err(e) => return Err(StoreError::from_io(root_key, e)),
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    match e.into_io_error() {
                        Some(io) => StoreError::from_io(path, io),
                        None => StoreError::Malformed {
                            key: path,
                            message: "filesystem loop".to_string(),
                        },
                    }
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match Self::key_for(&root, entry.path()) {
                    Some(key) => files.push((key, entry.into_path())),
                    None => warn!(path = %entry.path().display(), "Skipping file with a non UTF-8 name"),
                }
            }
            Ok::<_, StoreError>(files)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("listing task failed: {}", e)))??;

        let mut listing = Listing::new();
        for (key, path) in files {
            let fingerprint = self.fingerprint_path(&key, &path).await?;
            listing.insert(key, fingerprint);
        }
        Ok(listing)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| StoreError::from_io(key, e))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(key, e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| StoreError::from_io(key, e))
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::from_io(key, e)),
        }
    }

    async fn fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        let path = self.path_for(key)?;
        match self.fingerprint_path(key, &path).await {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Resolves plain paths and `file://` locators to local directories.
///
/// The destination may not exist yet. The source must.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalResolver;

impl StoreResolver for LocalResolver {
    fn open(&self, locator: &str, side: Side) -> Result<Arc<dyn ItemStore>, ConfigError> {
        let path = match locator.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return Err(ConfigError::UnsupportedLocator(locator.to_string())),
            None => locator,
        };
        let store = LocalStore::new(path).allow_missing_root(side == Side::Destination);
        Ok(Arc::new(store))
    }
}
