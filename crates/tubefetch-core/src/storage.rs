//! The downloads folder: listing, lookup and removal of finished files

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the folder if needed and prove it is writable
    pub async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let root = self.root.clone();
        let probe = tokio::task::spawn_blocking(move || tempfile::NamedTempFile::new_in(&root))
            .await
            .map_err(|e| StorageError::NotWritable(e.to_string()))?;

        match probe {
            Ok(_) => {
                debug!("Downloads folder is writable: {}", self.root.display());
                Ok(())
            }
            Err(e) => Err(StorageError::NotWritable(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
        }
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Path of a stored file; `name` must be a plain file name
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let candidate = Path::new(name);
        let mut components = candidate.components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if name.is_empty() || !plain || name.starts_with('.') {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        let path = self.root.join(candidate);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(StorageError::NotFound(name.to_string())),
        }
    }

    /// Files in the folder, newest first
    pub async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !meta.is_file() || filename.starts_with('.') {
                continue;
            }
            files.push(StoredFile {
                filename,
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.filename.cmp(&b.filename)));
        Ok(files)
    }

    pub async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name).await?;
        tokio::fs::remove_file(&path).await?;
        info!("Removed {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_ready_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("downloads"));
        assert!(!storage.exists());

        storage.ensure_ready().await.unwrap();

        assert!(storage.exists());
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());

        for bad in ["../etc/passwd", "/etc/passwd", "a/b.mp4", "..", ".hidden", ""] {
            assert!(
                matches!(storage.resolve(bad).await, Err(StorageError::InvalidName(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("Video_22.mp4"), b"data").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert!(storage.resolve("Video_22.mp4").await.is_ok());
        assert!(matches!(
            storage.resolve("nested").await,
            Err(StorageError::NotFound(_))
        ));

        let files = storage.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "Video_22.mp4");
        assert_eq!(files[0].size, 4);

        storage.remove("Video_22.mp4").await.unwrap();
        assert!(matches!(
            storage.remove("Video_22.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
