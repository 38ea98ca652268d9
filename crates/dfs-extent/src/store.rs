//! Path-mapped extent storage

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use dfs_common::is_directory_name;

use crate::error::ExtentError;

const DENIED_DIR: &str = "_denied_";

/// File storage rooted at one directory
#[derive(Debug, Clone)]
pub struct ExtentStore {
    root: PathBuf,
}

impl ExtentStore {
    /// Create a store rooted at `root`; the directory is created if missing
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ExtentError> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        debug!(root = %root.display(), "Extent store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical name to a path under the root
    ///
    /// Names that would leave the root resolve to `_denied_/x` under it.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.map(name)
            .unwrap_or_else(|| self.root.join(DENIED_DIR).join("x"))
    }

    fn map(&self, name: &str) -> Option<PathBuf> {
        let cleaned = name.trim_start_matches('/');
        let mut resolved = self.root.clone();
        let depth = self.root.components().count();

        for component in Path::new(cleaned).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir if resolved.components().count() > depth => {
                    resolved.pop();
                }
                _ => return None,
            }
        }
        Some(resolved)
    }

    /// Read a file, or list a directory when `name` ends in `/`
    ///
    /// A listing holds one child per line with subdirectories suffixed by `/`.
    /// Returns `None` when nothing of the requested kind exists.
    pub async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, ExtentError> {
        if name.is_empty() {
            return Err(ExtentError::EmptyName);
        }
        let Some(path) = self.map(name) else {
            debug!(name = %name, "Name escapes the extent root");
            return Ok(None);
        };

        if is_directory_name(name) {
            return self.list(&path).await;
        }

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(fs::read(&path).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, path: &Path) -> Result<Option<Vec<u8>>, ExtentError> {
        let mut dir = match fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(child) = dir.next_entry().await? {
            let mut child_name = child.file_name().to_string_lossy().into_owned();
            if child.file_type().await?.is_dir() {
                child_name.push('/');
            }
            names.push(child_name);
        }
        names.sort();

        Ok(Some(names.join("\n").into_bytes()))
    }

    /// Write, create, or delete `name`
    ///
    /// With data, a file is written (parents created) and a directory is
    /// created recursively. Without data, a file is deleted and a directory is
    /// deleted only if empty. Returns whether the operation took effect.
    pub async fn put(&self, name: &str, data: Option<&[u8]>) -> Result<bool, ExtentError> {
        if name.is_empty() {
            return Err(ExtentError::EmptyName);
        }
        let Some(path) = self.map(name) else {
            debug!(name = %name, "Name escapes the extent root");
            return Ok(false);
        };
        let directory = is_directory_name(name);

        match (directory, data) {
            (true, Some(_)) => {
                fs::create_dir_all(&path).await?;
                Ok(fs::metadata(&path).await?.is_dir())
            }
            (true, None) => {
                if !is_dir(&path).await {
                    return Ok(false);
                }
                let mut dir = fs::read_dir(&path).await?;
                if dir.next_entry().await?.is_some() {
                    debug!(name = %name, "Directory not empty, kept");
                    return Ok(false);
                }
                fs::remove_dir(&path).await?;
                Ok(true)
            }
            (false, Some(bytes)) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, bytes).await?;
                Ok(true)
            }
            (false, None) => {
                if !is_file(&path).await {
                    return Ok(false);
                }
                fs::remove_file(&path).await?;
                Ok(true)
            }
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
