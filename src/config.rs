//! Runtime configuration built from the CLI.
//!
//! All validation happens here, before any remote interaction: backend
//! selection, credential completeness, and interval sanity are fatal at
//! startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;

use crate::cli::{BookmarkArgs, SearchTagArgs, StorageArgs, SyncArgs};
use crate::storage::s3::S3Options;
use crate::storage::{FilesystemStorage, S3Storage, Storage};
use crate::sync::SyncOptions;

/// Selected storage backend.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Filesystem { root_dir: PathBuf },
    S3(S3Options),
}

impl StorageConfig {
    pub fn from_args(args: StorageArgs) -> anyhow::Result<Self> {
        match (args.root_dir, args.s3_bucket) {
            (Some(_), Some(_)) => {
                bail!("choose one storage backend: --root-dir or --s3-bucket, not both")
            }
            (None, None) => bail!(
                "no storage backend configured: set --root-dir (XIVBKMDL_ROOT_DIR) \
                 or --s3-bucket (XIVBKMDL_S3_BUCKET)"
            ),
            (Some(root_dir), None) => Ok(Self::Filesystem { root_dir }),
            (None, Some(bucket)) => {
                if args.s3_access_key_id.is_some() != args.s3_secret_access_key.is_some() {
                    bail!(
                        "--s3-access-key-id and --s3-secret-access-key must be given together"
                    );
                }
                Ok(Self::S3(S3Options {
                    bucket,
                    region: args.s3_region,
                    endpoint_url: args.s3_endpoint,
                    force_path_style: args.s3_force_path_style,
                    access_key_id: args.s3_access_key_id,
                    secret_access_key: args.s3_secret_access_key,
                    session_token: args.s3_session_token,
                }))
            }
        }
    }

    pub async fn build(self) -> Arc<dyn Storage> {
        match self {
            StorageConfig::Filesystem { root_dir } => {
                tracing::info!(root_dir = %root_dir.display(), "using filesystem storage");
                Arc::new(FilesystemStorage::new(root_dir))
            }
            StorageConfig::S3(options) => {
                tracing::info!(bucket = %options.bucket, "using S3 storage");
                Arc::new(S3Storage::connect(options).await)
            }
        }
    }
}

fn interval(name: &str, seconds: f64) -> anyhow::Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("--{} must be a non-negative number of seconds, got {}", name, seconds);
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn sync_options(args: &SyncArgs) -> anyhow::Result<SyncOptions> {
    Ok(SyncOptions {
        force_recrawl: args.recrawl,
        download_interval: interval("download-interval", args.download_interval)?,
        page_interval: interval("page-interval", args.page_interval)?,
        retry_interval: interval("retry-interval", args.retry_interval)?,
    })
}

/// Settings shared by both subcommands.
pub struct RunConfig {
    pub refresh_token: String,
    pub storage: StorageConfig,
    pub sync: SyncOptions,
}

impl RunConfig {
    fn new(sync: SyncArgs, storage: StorageArgs) -> anyhow::Result<Self> {
        if sync.refresh_token.is_empty() {
            bail!("--refresh-token (XIVBKMDL_REFRESH_TOKEN) must not be empty");
        }
        Ok(Self {
            storage: StorageConfig::from_args(storage)?,
            sync: sync_options(&sync)?,
            refresh_token: sync.refresh_token,
        })
    }
}

pub struct BookmarkConfig {
    pub user_id: u64,
    pub run: RunConfig,
}

impl BookmarkConfig {
    pub fn from_args(args: BookmarkArgs) -> anyhow::Result<Self> {
        Ok(Self {
            user_id: args.user_id,
            run: RunConfig::new(args.sync, args.storage)?,
        })
    }
}

pub struct SearchTagConfig {
    pub keyword: String,
    pub descending: bool,
    pub run: RunConfig,
}

impl SearchTagConfig {
    pub fn from_args(args: SearchTagArgs) -> anyhow::Result<Self> {
        if args.keyword.is_empty() {
            bail!("--keyword (XIVBKMDL_KEYWORD) must not be empty");
        }
        Ok(Self {
            keyword: args.keyword,
            descending: args.desc,
            run: RunConfig::new(args.sync, args.storage)?,
        })
    }
}
