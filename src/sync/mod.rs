//! Incremental sync engine.
//!
//! Two phases per run. DISCOVER pages through the remote listing newest
//! first, keeping only illustrations that are new or incomplete locally; a
//! page contributing nothing stops the walk, since a time-ordered listing
//! with one fully-mirrored page implies everything older is mirrored too.
//! FETCH then processes the collected pages oldest first, so an interrupted
//! run leaves a prefix of completed work and the next run resumes from the
//! front deterministically.
//!
//! The single-pass ascending variant serves oldest-first tag searches: the
//! same inclusion test, but each illustration downloads as soon as it is
//! seen and paging never short-circuits.

pub mod source;

pub use source::ListingSource;

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::pixiv::{continuation_params, Illust, ListingPage};
use crate::repo::{IllustMediaRepo, IllustMetaRepo};
use crate::retry::{retry_with_linear_backoff, RetryConfig};

/// Listing-page fetch attempts before the run aborts.
const PAGE_FETCH_ATTEMPTS: u32 = 3;

/// Throttling and filtering knobs for one run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Skip the completeness check and re-fetch everything encountered.
    pub force_recrawl: bool,
    /// Pause after each successful page-binary download.
    pub download_interval: Duration,
    /// Pause before each listing-page fetch.
    pub page_interval: Duration,
    /// Base delay between listing-page retry attempts.
    pub retry_interval: Duration,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Illustrations whose metadata was committed this run.
    pub illusts_synced: u64,
    /// Page binaries fetched and stored.
    pub pages_stored: u64,
    /// Page downloads that failed and were skipped.
    pub pages_failed: u64,
}

/// Whether an illustration needs (re-)fetching.
///
/// New means no stored metadata record; incomplete means the stored
/// page-binary count differs from the remote page count.
async fn needs_fetch(
    illust: &Illust,
    meta_repo: &IllustMetaRepo,
    media_repo: &IllustMediaRepo,
    force_recrawl: bool,
) -> anyhow::Result<bool> {
    if force_recrawl {
        return Ok(true);
    }

    if meta_repo.get(illust.id, illust.user.id).await?.is_none() {
        return Ok(true);
    }

    let stored = media_repo
        .stored_page_keys(illust.id, illust.user.id)
        .await?
        .len();
    Ok(stored != illust.expected_page_count())
}

/// Resolve the continuation of `next_url` and fetch it, retrying transient
/// failures. `None` means the listing is exhausted; exhausting retries is
/// fatal to the run.
async fn next_listing_page(
    source: &dyn ListingSource,
    next_url: Option<&str>,
    options: &SyncOptions,
) -> anyhow::Result<Option<ListingPage>> {
    let params = match next_url.and_then(continuation_params) {
        Some(params) => params,
        None => return Ok(None),
    };

    tokio::time::sleep(options.page_interval).await;

    let retry = RetryConfig {
        attempts: PAGE_FETCH_ATTEMPTS,
        interval: options.retry_interval,
    };
    let page = retry_with_linear_backoff(retry, || source.fetch_next(&params))
        .await
        .context("listing page fetch failed after retries")?;
    Ok(Some(page))
}

/// Download every page of one illustration into the media repository.
///
/// A failed page download is logged and skipped; the gap is picked up by the
/// completeness check on a future run.
async fn fetch_illust(
    source: &dyn ListingSource,
    media_repo: &IllustMediaRepo,
    illust: &Illust,
    download_interval: Duration,
    stats: &mut SyncStats,
) -> anyhow::Result<()> {
    for url in illust.page_urls() {
        tracing::info!(url, "downloading page");

        let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
        match source.download(url, scratch.path()).await {
            Ok(()) => {
                let mut entries = tokio::fs::read_dir(scratch.path())
                    .await
                    .context("failed to read scratch directory")?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .context("failed to read scratch directory")?
                {
                    media_repo
                        .store_page(illust.id, illust.user.id, &entry.path())
                        .await?;
                }
                stats.pages_stored += 1;
                tokio::time::sleep(download_interval).await;
            }
            Err(e) => {
                stats.pages_failed += 1;
                tracing::warn!(url, error = %e, "page download failed, skipping");
            }
        }
    }
    Ok(())
}

async fn commit_metadata(
    meta_repo: &IllustMetaRepo,
    illust: &Illust,
    updated_at_utc: DateTime<Utc>,
) -> anyhow::Result<()> {
    let metadata =
        serde_json::to_value(illust).context("failed to encode illustration metadata")?;
    meta_repo
        .upsert(illust.id, illust.user.id, &metadata, updated_at_utc)
        .await
}

/// Descending sync: DISCOVER newest-first, then FETCH the result oldest-first.
///
/// `first_page` is the initial query result already fetched by the caller;
/// `updated_at_utc` is the run timestamp stamped into every record committed
/// by this run.
pub async fn sync_descending(
    source: &dyn ListingSource,
    first_page: ListingPage,
    meta_repo: &IllustMetaRepo,
    media_repo: &IllustMediaRepo,
    options: &SyncOptions,
    updated_at_utc: DateTime<Utc>,
) -> anyhow::Result<SyncStats> {
    let mut page = first_page;
    let mut pending_pages: Vec<Vec<Illust>> = Vec::new();
    let mut pending_total = 0usize;

    loop {
        let ListingPage { illusts, next_url } = page;

        let mut page_batch = Vec::new();
        for illust in illusts {
            if needs_fetch(&illust, meta_repo, media_repo, options.force_recrawl).await? {
                page_batch.push(illust);
            }
        }

        if page_batch.is_empty() {
            tracing::info!("no new illustrations in page, stopping discovery");
            break;
        }

        pending_total += page_batch.len();
        pending_pages.push(page_batch);
        tracing::info!(found = pending_total, "paging");

        match next_listing_page(source, next_url.as_deref(), options).await? {
            Some(next) => page = next,
            None => break,
        }
    }

    tracing::info!(count = pending_total, "new illustrations discovered");

    // Oldest first: reverse the page order, keep each page's own order.
    let mut stats = SyncStats::default();
    let mut index = 0usize;
    for illust in pending_pages.into_iter().rev().flatten() {
        index += 1;
        tracing::info!(
            progress = %format!("{}/{}", index, pending_total),
            user_id = illust.user.id,
            user_name = %illust.user.name,
            illust_id = illust.id,
            title = %illust.title,
            "fetching illustration"
        );

        fetch_illust(source, media_repo, &illust, options.download_interval, &mut stats).await?;
        commit_metadata(meta_repo, &illust, updated_at_utc).await?;
        stats.illusts_synced += 1;
    }

    Ok(stats)
}

/// Ascending sync: one forward pass, downloading each new or incomplete
/// illustration as it is encountered. Used when the remote listing is
/// already oldest-first, so there is no short-circuit: only listing
/// exhaustion ends the walk.
pub async fn sync_ascending(
    source: &dyn ListingSource,
    first_page: ListingPage,
    meta_repo: &IllustMetaRepo,
    media_repo: &IllustMediaRepo,
    options: &SyncOptions,
    updated_at_utc: DateTime<Utc>,
) -> anyhow::Result<SyncStats> {
    let mut stats = SyncStats::default();
    let mut page = first_page;
    let mut page_index = 0u64;

    loop {
        let ListingPage { illusts, next_url } = page;
        page_index += 1;
        tracing::info!(page = page_index, count = illusts.len(), "processing page");

        let total = illusts.len();
        for (index, illust) in illusts.iter().enumerate() {
            if !needs_fetch(illust, meta_repo, media_repo, options.force_recrawl).await? {
                continue;
            }

            tracing::info!(
                page = page_index,
                progress = %format!("{}/{}", index + 1, total),
                user_id = illust.user.id,
                user_name = %illust.user.name,
                illust_id = illust.id,
                title = %illust.title,
                "fetching illustration"
            );

            fetch_illust(source, media_repo, illust, options.download_interval, &mut stats)
                .await?;
            commit_metadata(meta_repo, illust, updated_at_utc).await?;
            stats.illusts_synced += 1;
        }

        match next_listing_page(source, next_url.as_deref(), options).await? {
            Some(next) => page = next,
            None => break,
        }
    }

    Ok(stats)
}
