//! xivbkmdl-rs — Rust rewrite of xivbookmarkdl.
//!
//! Incrementally mirrors a pixiv user's bookmarks (or an exact-tag search)
//! into a local directory or an S3-compatible bucket. Each run pages through
//! the remote listing newest first, keeps only illustrations that are new or
//! incomplete locally, then downloads them oldest first so interrupted runs
//! resume deterministically. Metadata records keep a sticky first-seen
//! timestamp across re-syncs.

#![warn(clippy::all)]

mod cli;
mod config;
mod pixiv;
mod repo;
mod retry;
mod storage;
mod sync;

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::{BookmarkConfig, SearchTagConfig};
use pixiv::{AppApiClient, AppApiListing, ListingEndpoint, SearchOrder};
use repo::{IllustMediaRepo, IllustMetaRepo};
use sync::SyncStats;

fn log_summary(stats: &SyncStats) {
    tracing::info!(
        illusts = stats.illusts_synced,
        pages = stats.pages_stored,
        failed_pages = stats.pages_failed,
        "sync complete"
    );
}

async fn run_bookmark(config: BookmarkConfig) -> anyhow::Result<()> {
    let storage = config.run.storage.build().await;
    let meta_repo = IllustMetaRepo::new(storage.clone());
    let media_repo = IllustMediaRepo::new(storage);

    let client = Arc::new(AppApiClient::authenticate(&config.run.refresh_token).await?);

    tracing::info!(user_id = config.user_id, "fetching bookmarks");
    let first_page = client.user_bookmarks(config.user_id).await?;

    // One timestamp for every record this run commits.
    let updated_at_utc = Utc::now();
    let source = AppApiListing::new(client, ListingEndpoint::UserBookmarks);

    let stats = sync::sync_descending(
        &source,
        first_page,
        &meta_repo,
        &media_repo,
        &config.run.sync,
        updated_at_utc,
    )
    .await?;

    log_summary(&stats);
    Ok(())
}

async fn run_search_tag(config: SearchTagConfig) -> anyhow::Result<()> {
    let storage = config.run.storage.build().await;
    let meta_repo = IllustMetaRepo::new(storage.clone());
    let media_repo = IllustMediaRepo::new(storage);

    let client = Arc::new(AppApiClient::authenticate(&config.run.refresh_token).await?);

    let order = if config.descending {
        SearchOrder::DateDesc
    } else {
        SearchOrder::DateAsc
    };

    tracing::info!(keyword = %config.keyword, ?order, "searching by tag");
    let first_page = client.search_illust(&config.keyword, order).await?;

    let updated_at_utc = Utc::now();
    let source = AppApiListing::new(client, ListingEndpoint::SearchIllust);

    let stats = if config.descending {
        sync::sync_descending(
            &source,
            first_page,
            &meta_repo,
            &media_repo,
            &config.run.sync,
            updated_at_utc,
        )
        .await?
    } else {
        sync::sync_ascending(
            &source,
            first_page,
            &meta_repo,
            &media_repo,
            &config.run.sync,
            updated_at_utc,
        )
        .await?
    };

    log_summary(&stats);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str())),
        )
        .init();

    match cli.command {
        Command::Bookmark(args) => run_bookmark(BookmarkConfig::from_args(args)?).await,
        Command::SearchTag(args) => run_search_tag(SearchTagConfig::from_args(args)?).await,
    }
}
