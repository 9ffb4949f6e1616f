//! App-API HTTP client.
//!
//! Mirrors the mobile client's behavior: OAuth refresh-token exchange with
//! the `X-Client-Time`/`X-Client-Hash` signature headers, bearer-authed
//! listing requests, and media downloads with the app Referer (pximg rejects
//! requests without it).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::sync::ListingSource;

use super::error::ApiError;
use super::types::{ListingPage, SearchOrder};

const APP_BASE_URL: &str = "https://app-api.pixiv.net";
const AUTH_TOKEN_URL: &str = "https://oauth.secure.pixiv.net/auth/token";
const DOWNLOAD_REFERER: &str = "https://app-api.pixiv.net/";

// Mobile app credentials; public knowledge, required by the token endpoint.
const CLIENT_ID: &str = "MOBrBDS8blbauoSck0ZfDbtuzpyT";
const CLIENT_SECRET: &str = "lsACyCD94FhDUtGTXi3QzcFE2uU1hqtDaKeqrdwj";
const HASH_SECRET: &str = "28c1fdd170a5204386cb1313c7077b34f83e4aaf4aa829ce78c231e05b0bae2c";
const USER_AGENT: &str = "PixivAndroidApp/5.0.234 (Android 11; Pixel 5)";

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Parse a listing's `next_url` into the opaque continuation parameters for
/// the next page request. `None` means the listing is exhausted.
pub fn continuation_params(next_url: &str) -> Option<HashMap<String, String>> {
    let url = Url::parse(next_url).ok()?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

/// Paginated listing endpoints the engine can page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEndpoint {
    UserBookmarks,
    SearchIllust,
}

impl ListingEndpoint {
    fn path(&self) -> &'static str {
        match self {
            ListingEndpoint::UserBookmarks => "/v1/user/bookmarks/illust",
            ListingEndpoint::SearchIllust => "/v1/search/illust",
        }
    }
}

/// Authenticated app-API client.
pub struct AppApiClient {
    http: reqwest::Client,
    access_token: String,
}

impl std::fmt::Debug for AppApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppApiClient")
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl AppApiClient {
    /// Exchange a refresh token for an access token.
    pub async fn authenticate(refresh_token: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Http {
                url: AUTH_TOKEN_URL.to_string(),
                source: e,
            })?;

        let client_time = Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string();
        let client_hash = md5_hex(&format!("{}{}", client_time, HASH_SECRET));

        let form = [
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("get_secure_url", "1"),
            ("include_policy", "true"),
        ];

        let response = http
            .post(AUTH_TOKEN_URL)
            .header("X-Client-Time", &client_time)
            .header("X-Client-Hash", &client_hash)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                url: AUTH_TOKEN_URL.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Auth(format!(
                "token refresh rejected with status {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| ApiError::Http {
            url: AUTH_TOKEN_URL.to_string(),
            source: e,
        })?;

        let access_token = body
            .pointer("/response/access_token")
            .or_else(|| body.get("access_token"))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Auth("token response missing access_token".to_string()))?
            .to_string();

        tracing::debug!("authenticated against the app API");
        Ok(Self { http, access_token })
    }

    async fn get_listing<Q: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<ListingPage, ApiError> {
        let url = format!("{}{}", APP_BASE_URL, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: Value = response.json().await.map_err(|e| ApiError::Http {
            url: url.clone(),
            source: e,
        })?;

        ListingPage::from_response(&body)
    }

    /// First page of a user's public bookmarks, newest first.
    pub async fn user_bookmarks(&self, user_id: u64) -> Result<ListingPage, ApiError> {
        self.get_listing(
            ListingEndpoint::UserBookmarks.path(),
            &[
                ("user_id", user_id.to_string()),
                ("restrict", "public".to_string()),
                ("filter", "for_ios".to_string()),
            ],
        )
        .await
    }

    /// First page of an exact-tag search in the requested date order.
    pub async fn search_illust(
        &self,
        word: &str,
        order: SearchOrder,
    ) -> Result<ListingPage, ApiError> {
        self.get_listing(
            ListingEndpoint::SearchIllust.path(),
            &[
                ("word", word.to_string()),
                ("search_target", "exact_match_for_tags".to_string()),
                ("sort", order.as_sort_param().to_string()),
                ("filter", "for_ios".to_string()),
            ],
        )
        .await
    }

    /// Fetch a continuation page using the parameters parsed from the
    /// previous page's `next_url`.
    pub async fn fetch_listing(
        &self,
        endpoint: ListingEndpoint,
        params: &HashMap<String, String>,
    ) -> Result<ListingPage, ApiError> {
        self.get_listing(endpoint.path(), params).await
    }

    /// Download one media URL into `dest_dir`, named by the URL's basename.
    pub async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let filename = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|segments| segments.last().map(str::to_owned))
            })
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse(format!("unusable media URL: {}", url)))?;

        let dest = dest_dir.join(&filename);

        let response = self
            .http
            .get(url)
            .header("Referer", DOWNLOAD_REFERER)
            .send()
            .await
            .map_err(|e| ApiError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| ApiError::Disk {
                path: dest.display().to_string(),
                source: e,
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Http {
                url: url.to_string(),
                source: e,
            })?;
            file.write_all(&chunk).await.map_err(|e| ApiError::Disk {
                path: dest.display().to_string(),
                source: e,
            })?;
        }
        file.flush().await.map_err(|e| ApiError::Disk {
            path: dest.display().to_string(),
            source: e,
        })?;

        Ok(dest)
    }
}

/// A paged listing bound to one endpoint, consumable by the sync engine.
pub struct AppApiListing {
    client: Arc<AppApiClient>,
    endpoint: ListingEndpoint,
}

impl AppApiListing {
    pub fn new(client: Arc<AppApiClient>, endpoint: ListingEndpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl ListingSource for AppApiListing {
    async fn fetch_next(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<ListingPage, ApiError> {
        self.client.fetch_listing(self.endpoint, params).await
    }

    async fn download(&self, url: &str, dest_dir: &Path) -> Result<(), ApiError> {
        self.client.download(url, dest_dir).await.map(|_| ())
    }
}
