//! Local filesystem storage backend.
//!
//! Keys map directly onto paths under a root directory. Uploads go through a
//! sibling `.part` file followed by a rename so readers never observe a
//! half-written blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ScopedDownload, Storage, StorageError};

pub struct FilesystemStorage {
    root_dir: PathBuf,
}

impl FilesystemStorage {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    fn io_err(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Keys use "/" separators regardless of platform; the last segment of
        // the prefix may be a partial filename, so list the parent directory
        // and filter by name.
        let (dir_part, name_part) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };

        let mut dir = self.root_dir.clone();
        for component in dir_part.split('/').filter(|c| !c.is_empty()) {
            dir.push(component);
        }

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err(prefix, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_err(prefix, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(name_part) {
                continue;
            }
            if dir_part.is_empty() {
                keys.push(name);
            } else {
                keys.push(format!("{}/{}", dir_part, name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn download(&self, key: &str) -> Result<ScopedDownload, StorageError> {
        let source = self.root_dir.join(key);

        let tmpdir = tempfile::tempdir().map_err(|e| Self::io_err(key, e))?;
        let dest = tmpdir.path().join("blob");

        match fs::copy(&source, &dest).await {
            Ok(_) => Ok(ScopedDownload::new(tmpdir, dest)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(Self::io_err(key, e)),
        }
    }

    async fn upload(&self, source: &Path, key: &str) -> Result<(), StorageError> {
        let dest = self.root_dir.join(key);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(key, e))?;
        }

        // Stage next to the destination so the rename stays on one filesystem.
        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);

        fs::copy(source, &part)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        fs::rename(&part, &dest)
            .await
            .map_err(|e| Self::io_err(key, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(tmp: &tempfile::TempDir) -> FilesystemStorage {
        FilesystemStorage::new(tmp.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        let src = tmp.path().join("input.bin");
        tokio::fs::write(&src, b"payload").await.unwrap();

        s.upload(&src, "3/7/0001.jpg").await.unwrap();

        let downloaded = s.download("3/7/0001.jpg").await.unwrap();
        let bytes = tokio::fs::read(downloaded.path()).await.unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_upload_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        let src = tmp.path().join("input.bin");
        tokio::fs::write(&src, b"one").await.unwrap();
        s.upload(&src, "3/7/a.png").await.unwrap();

        tokio::fs::write(&src, b"two").await.unwrap();
        s.upload(&src, "3/7/a.png").await.unwrap();

        let downloaded = s.download("3/7/a.png").await.unwrap();
        let bytes = tokio::fs::read(downloaded.path()).await.unwrap();
        assert_eq!(bytes, b"two");
    }

    #[tokio::test]
    async fn test_upload_leaves_no_part_file() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        let src = tmp.path().join("input.bin");
        tokio::fs::write(&src, b"data").await.unwrap();
        s.upload(&src, "3/7/a.png").await.unwrap();

        let keys = s.list_keys("3/7/").await.unwrap();
        assert_eq!(keys, vec!["3/7/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_download_missing_key_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        match s.download("3/7/missing.jpg").await {
            Err(StorageError::NotFound(key)) => assert_eq!(key, "3/7/missing.jpg"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_list_keys_missing_prefix_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);
        assert!(s.list_keys("9/9/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_keys_filters_by_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        let src = tmp.path().join("input.bin");
        tokio::fs::write(&src, b"x").await.unwrap();
        s.upload(&src, "3/7/a.png").await.unwrap();
        s.upload(&src, "3/7/b.png").await.unwrap();
        s.upload(&src, "3/8/c.png").await.unwrap();

        let keys = s.list_keys("3/7/").await.unwrap();
        assert_eq!(
            keys,
            vec!["3/7/a.png".to_string(), "3/7/b.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_scoped_download_cleans_up_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let s = storage(&tmp);

        let src = tmp.path().join("input.bin");
        tokio::fs::write(&src, b"x").await.unwrap();
        s.upload(&src, "3/7/a.png").await.unwrap();

        let path = {
            let downloaded = s.download("3/7/a.png").await.unwrap();
            downloaded.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
