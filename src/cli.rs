use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "xivbkmdl-rs",
    about = "Mirror pixiv bookmarks and tag searches into durable storage"
)]
pub struct Cli {
    /// Default log filter (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror a user's public bookmarks (newest first)
    Bookmark(BookmarkArgs),
    /// Mirror an exact-tag search
    SearchTag(SearchTagArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Storage backend selection. Exactly one of `--root-dir` or `--s3-bucket`
/// must be configured.
#[derive(Args, Debug)]
pub struct StorageArgs {
    /// Root directory of a filesystem mirror
    #[arg(long, env = "XIVBKMDL_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Bucket of an S3-compatible mirror
    #[arg(long, env = "XIVBKMDL_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Bucket region
    #[arg(long, env = "XIVBKMDL_S3_REGION")]
    pub s3_region: Option<String>,

    /// Custom endpoint URL for S3-compatible services (MinIO, R2)
    #[arg(long, env = "XIVBKMDL_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "XIVBKMDL_S3_FORCE_PATH_STYLE")]
    pub s3_force_path_style: bool,

    /// Explicit access key (default: the SDK credential chain)
    #[arg(long, env = "XIVBKMDL_S3_ACCESS_KEY_ID")]
    pub s3_access_key_id: Option<String>,

    #[arg(long, env = "XIVBKMDL_S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub s3_secret_access_key: Option<String>,

    #[arg(long, env = "XIVBKMDL_S3_SESSION_TOKEN", hide_env_values = true)]
    pub s3_session_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// pixiv OAuth refresh token.
    /// WARNING: passing via --refresh-token is visible in process listings;
    /// prefer the XIVBKMDL_REFRESH_TOKEN environment variable.
    #[arg(long, env = "XIVBKMDL_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: String,

    /// Re-download everything encountered, ignoring local completeness
    #[arg(long)]
    pub recrawl: bool,

    /// Seconds to wait after each page-binary download
    #[arg(long, env = "XIVBKMDL_DOWNLOAD_INTERVAL", default_value_t = 1.0)]
    pub download_interval: f64,

    /// Seconds to wait between listing-page fetches
    #[arg(long, env = "XIVBKMDL_PAGE_INTERVAL", default_value_t = 3.0)]
    pub page_interval: f64,

    /// Base seconds between listing-page retry attempts
    #[arg(long, env = "XIVBKMDL_RETRY_INTERVAL", default_value_t = 10.0)]
    pub retry_interval: f64,
}

#[derive(Args, Debug)]
pub struct BookmarkArgs {
    /// pixiv user id whose bookmarks to mirror
    #[arg(long, env = "XIVBKMDL_USER_ID")]
    pub user_id: u64,

    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Args, Debug)]
pub struct SearchTagArgs {
    /// Tag to match exactly
    #[arg(long, env = "XIVBKMDL_KEYWORD")]
    pub keyword: String,

    /// Search newest first (default is oldest first)
    #[arg(long)]
    pub desc: bool,

    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bookmark_minimal() {
        let cli = Cli::try_parse_from([
            "xivbkmdl-rs",
            "bookmark",
            "--user-id",
            "3",
            "--refresh-token",
            "tok",
            "--root-dir",
            "/data/mirror",
        ])
        .unwrap();

        match cli.command {
            Command::Bookmark(args) => {
                assert_eq!(args.user_id, 3);
                assert_eq!(args.sync.refresh_token, "tok");
                assert!(!args.sync.recrawl);
                assert_eq!(args.sync.download_interval, 1.0);
                assert_eq!(args.sync.page_interval, 3.0);
                assert_eq!(args.sync.retry_interval, 10.0);
            }
            other => panic!("expected bookmark, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_tag_with_desc_and_intervals() {
        let cli = Cli::try_parse_from([
            "xivbkmdl-rs",
            "search-tag",
            "--keyword",
            "風景",
            "--desc",
            "--refresh-token",
            "tok",
            "--root-dir",
            "/data/mirror",
            "--download-interval",
            "0.5",
        ])
        .unwrap();

        match cli.command {
            Command::SearchTag(args) => {
                assert_eq!(args.keyword, "風景");
                assert!(args.desc);
                assert_eq!(args.sync.download_interval, 0.5);
            }
            other => panic!("expected search-tag, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_s3_storage_flags() {
        let cli = Cli::try_parse_from([
            "xivbkmdl-rs",
            "bookmark",
            "--user-id",
            "3",
            "--refresh-token",
            "tok",
            "--s3-bucket",
            "mirror",
            "--s3-endpoint",
            "http://localhost:9000",
            "--s3-force-path-style",
        ])
        .unwrap();

        match cli.command {
            Command::Bookmark(args) => {
                assert_eq!(args.storage.s3_bucket.as_deref(), Some("mirror"));
                assert!(args.storage.s3_force_path_style);
                assert!(args.storage.root_dir.is_none());
            }
            other => panic!("expected bookmark, got {:?}", other),
        }
    }

    #[test]
    fn test_bookmark_requires_user_id() {
        let result = Cli::try_parse_from([
            "xivbkmdl-rs",
            "bookmark",
            "--refresh-token",
            "tok",
            "--root-dir",
            "/data",
        ]);
        if std::env::var_os("XIVBKMDL_USER_ID").is_none() {
            assert!(result.is_err());
        }
    }
}
