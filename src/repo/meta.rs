//! Illustration metadata records.
//!
//! One JSON record per illustration at `"{user_id}/{illust_id}/illust.json"`.
//! `found_at` records when the illustration first entered the mirror and is
//! preserved across every later write; `updated_at` records the moment of the
//! most recent write.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Storage, StorageError};

use super::illust_prefix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IllustMetaRecord {
    /// The remote illustration object, stored verbatim.
    pub illust: Value,
    #[serde(default)]
    pub found_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct IllustMetaRepo {
    storage: Arc<dyn Storage>,
}

fn meta_key(user_id: u64, illust_id: u64) -> String {
    format!("{}illust.json", illust_prefix(user_id, illust_id))
}

impl IllustMetaRepo {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the stored record for an illustration.
    ///
    /// A missing key and an unparsable record both yield `None`; the latter
    /// is logged. Any other storage failure propagates.
    pub async fn get(
        &self,
        illust_id: u64,
        user_id: u64,
    ) -> anyhow::Result<Option<IllustMetaRecord>> {
        let key = meta_key(user_id, illust_id);

        let file = match self.storage.download(&key).await {
            Ok(file) => file,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read metadata at {}", key))
            }
        };

        let text = tokio::fs::read_to_string(file.path())
            .await
            .with_context(|| format!("failed to read downloaded metadata at {}", key))?;

        match serde_json::from_str::<IllustMetaRecord>(&text) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "unparsable illust metadata, treating as absent");
                Ok(None)
            }
        }
    }

    /// Write (or rewrite) the record for an illustration.
    ///
    /// Re-reads the existing record first: an existing `found_at` overrides
    /// `observed_at`. `updated_at` is always the moment of this write.
    pub async fn upsert(
        &self,
        illust_id: u64,
        user_id: u64,
        illust: &Value,
        observed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let key = meta_key(user_id, illust_id);

        let found_at = match self.get(illust_id, user_id).await? {
            Some(old) => old.found_at.unwrap_or(observed_at),
            None => observed_at,
        };

        let record = IllustMetaRecord {
            illust: illust.clone(),
            found_at: Some(found_at),
            updated_at: Some(Utc::now()),
        };

        let tmpdir = tempfile::tempdir().context("failed to create scratch directory")?;
        let tmpfile = tmpdir.path().join("illust.json");
        let json = serde_json::to_string(&record).context("failed to serialize metadata")?;
        tokio::fs::write(&tmpfile, json)
            .await
            .context("failed to stage metadata")?;

        self.storage
            .upload(&tmpfile, &key)
            .await
            .with_context(|| format!("failed to store metadata at {}", key))?;

        Ok(())
    }
}
