//! Product image storage on local disk.
//!
//! Files land in the configured upload directory and are served back by the
//! router under `/public/uploads`.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Public path the upload directory is mounted on
pub const PUBLIC_PATH: &str = "/public/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Accepted MIME types and the extension stored files get
pub fn extension_for(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpeg"),
        "image/jpg" => Some("jpg"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Validate the MIME type and write the file, returning the stored name
    pub async fn save(
        &self,
        original_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let ext = extension_for(mime).ok_or_else(|| UploadError::InvalidFileType(mime.to_string()))?;
        let name = stored_name(original_name, ext, Utc::now().timestamp_millis());

        self.ensure_dir().await?;
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        debug!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(name)
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, name: &str) -> Result<(), UploadError> {
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Upload {} was already removed", name);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every file referenced by the given public URLs, logging failures
    pub async fn remove_urls<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            let Some(name) = name_from_url(url) else {
                continue;
            };
            if let Err(err) = self.remove(name).await {
                warn!("Failed to remove upload {}: {}", name, err);
            }
        }
    }
}

/// `<original name, spaces to dashes>-<epoch millis>.<ext>`
pub fn stored_name(original_name: &str, ext: &str, millis: i64) -> String {
    let base = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload");
    format!("{}-{}.{}", base.replace(' ', "-"), millis, ext)
}

/// `http://<host>/public/uploads/<name>`
pub fn public_url(host: &str, name: &str) -> String {
    format!("http://{}{}/{}", host, PUBLIC_PATH, name)
}

/// Stored file name behind a public URL, if it points into the upload path
pub fn name_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once(PUBLIC_PATH)?;
    let name = rest.strip_prefix('/')?;
    (!name.is_empty() && !name.contains('/') && name != "..").then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_png_and_jpeg_are_accepted() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpeg"));
        assert_eq!(extension_for("image/jpg"), Some("jpg"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for("text/plain"), None);
    }

    #[test]
    fn names_replace_spaces_and_drop_directories() {
        assert_eq!(stored_name("red shoe.png", "png", 42), "red-shoe.png-42.png");
        assert_eq!(stored_name("../../etc/passwd", "jpg", 1), "passwd-1.jpg");
        assert_eq!(stored_name("", "jpeg", 7), "upload-7.jpeg");
    }

    #[test]
    fn urls_map_back_to_names() {
        let url = public_url("localhost:3000", "a-1.png");
        assert_eq!(url, "http://localhost:3000/public/uploads/a-1.png");
        assert_eq!(name_from_url(&url), Some("a-1.png"));
        assert_eq!(name_from_url("http://x/public/uploads/"), None);
        assert_eq!(name_from_url("http://x/public/uploads/a/b.png"), None);
        assert_eq!(name_from_url("http://x/other/a.png"), None);
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = std::env::temp_dir().join(format!("eshop-uploads-{}", uuid::Uuid::new_v4()));
        let store = UploadStore::new(&dir);

        let name = store.save("pic.png", "image/png", b"not really a png").await.unwrap();
        assert!(dir.join(&name).exists());

        store.remove(&name).await.unwrap();
        assert!(!dir.join(&name).exists());
        // second removal is a no-op
        store.remove(&name).await.unwrap();

        let err = store.save("pic.gif", "image/gif", b"gif").await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileType(_)));

        let _ = std::fs::remove_dir_all(dir);
    }
}
