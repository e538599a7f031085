//! Image file storage behind a small capability trait.
//!
//! Services only see [`FileStorage`]; the local implementation writes under a
//! configured root and hands back forward-slash relative paths.

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// A decoded upload waiting to be stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub alt_text: Option<String>,
}

pub trait FileStorage: Send + Sync {
    /// Store `file` under `folder` and return its relative path.
    fn save_file(&self, file: &UploadedFile, folder: &str) -> AppResult<String>;

    /// Remove a previously stored file. Returns false when nothing was removed.
    fn delete_file(&self, relative_path: &str) -> bool;
}

pub type SharedFileStorage = Arc<dyn FileStorage>;

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    max_file_bytes: usize,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, max_file_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_file_bytes,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir, config.max_file_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path onto the storage root, rejecting anything that escapes it.
    pub fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        let relative = Path::new(relative_path);
        if relative_path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn extension_of(file_name: &str) -> AppResult<String> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| AppError::ValidationError(format!("Missing file extension: {file_name}")))?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::ValidationError(format!(
                "Unsupported image type: {ext}"
            )));
        }
        Ok(ext)
    }

    fn is_valid_folder(folder: &str) -> bool {
        !folder.is_empty()
            && folder.split('/').all(|part| {
                !part.is_empty()
                    && part != ".."
                    && part != "."
                    && part
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
    }
}

impl FileStorage for LocalFileStorage {
    fn save_file(&self, file: &UploadedFile, folder: &str) -> AppResult<String> {
        if file.bytes.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Empty file: {}",
                file.file_name
            )));
        }
        if file.bytes.len() > self.max_file_bytes {
            return Err(AppError::ValidationError(format!(
                "File {} exceeds {} bytes",
                file.file_name, self.max_file_bytes
            )));
        }
        if !Self::is_valid_folder(folder) {
            return Err(AppError::InternalError(format!(
                "Invalid storage folder: {folder}"
            )));
        }
        let ext = Self::extension_of(&file.file_name)?;

        let dir = self.root.join(folder);
        std::fs::create_dir_all(&dir)?;
        let name = format!("{}.{ext}", uuid::Uuid::new_v4());
        std::fs::write(dir.join(&name), &file.bytes)?;

        let relative = format!("{folder}/{name}");
        log::debug!("Stored upload {} as {relative}", file.file_name);
        Ok(relative)
    }

    fn delete_file(&self, relative_path: &str) -> bool {
        let Some(path) = self.resolve(relative_path) else {
            log::warn!("Refusing to delete path outside upload root: {relative_path}");
            return false;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete stored file {relative_path}: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
            alt_text: None,
        }
    }

    #[test]
    fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), 1024);

        let path = storage
            .save_file(&upload("Front.JPG", b"jpeg-bytes"), "listings/7")
            .unwrap();
        assert!(path.starts_with("listings/7/"));
        assert!(path.ends_with(".jpg"));
        assert!(dir.path().join(&path).exists());

        assert!(storage.delete_file(&path));
        assert!(!dir.path().join(&path).exists());
        assert!(!storage.delete_file(&path));
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), 4);

        assert!(storage.save_file(&upload("a.exe", b"abc"), "listings").is_err());
        assert!(storage.save_file(&upload("a.png", b""), "listings").is_err());
        assert!(storage.save_file(&upload("a.png", b"too-big"), "listings").is_err());
        assert!(storage.save_file(&upload("a.png", b"ok"), "../escape").is_err());
    }

    #[test]
    fn test_resolve_blocks_traversal() {
        let storage = LocalFileStorage::new("/srv/uploads", 1024);
        assert!(storage.resolve("listings/1/a.png").is_some());
        assert!(storage.resolve("../etc/passwd").is_none());
        assert!(storage.resolve("/etc/passwd").is_none());
        assert!(storage.resolve("").is_none());
    }
}
