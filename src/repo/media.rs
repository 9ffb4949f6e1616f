//! Stored page binaries.
//!
//! The number of media files present under an illustration's prefix is the
//! completeness signal the sync engine compares against the remote page
//! count. Sidecars such as `illust.json` never count.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::storage::Storage;

use super::illust_prefix;

/// Recognized page-binary extensions, compared case-insensitively.
const MEDIA_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "mp4", "webm"];

fn is_media_key(key: &str) -> bool {
    Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&lower.as_str())
        })
}

pub struct IllustMediaRepo {
    storage: Arc<dyn Storage>,
}

impl IllustMediaRepo {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Keys of the page binaries already stored for an illustration.
    pub async fn stored_page_keys(
        &self,
        illust_id: u64,
        user_id: u64,
    ) -> anyhow::Result<Vec<String>> {
        let prefix = illust_prefix(user_id, illust_id);
        let keys = self
            .storage
            .list_keys(&prefix)
            .await
            .with_context(|| format!("failed to enumerate stored pages under {}", prefix))?;

        Ok(keys.into_iter().filter(|key| is_media_key(key)).collect())
    }

    /// Upload one fetched page file under the illustration's prefix, named by
    /// its local filename. Re-fetching a page replaces it.
    pub async fn store_page(
        &self,
        illust_id: u64,
        user_id: u64,
        file: &Path,
    ) -> anyhow::Result<()> {
        let filename = file
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("downloaded file has no usable name: {}", file.display()))?;

        let key = format!("{}{}", illust_prefix(user_id, illust_id), filename);
        self.storage
            .upload(file, &key)
            .await
            .with_context(|| format!("failed to store page at {}", key))?;

        Ok(())
    }
}
