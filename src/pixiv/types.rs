//! Listing models.
//!
//! Only the fields the sync engine reads are typed; everything else the API
//! returns is retained in `#[serde(flatten)]` maps so a persisted record is
//! the full remote object, not a lossy projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Present (with a URL) only for single-page illustrations; an empty object
/// for multi-page ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaSinglePage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageImageUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaPage {
    #[serde(default)]
    pub image_urls: PageImageUrls,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One illustration summary from a listing page. Read-only to this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Illust {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub user: User,
    #[serde(default)]
    pub meta_single_page: MetaSinglePage,
    #[serde(default)]
    pub meta_pages: Vec<MetaPage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Illust {
    pub fn is_single_page(&self) -> bool {
        self.meta_single_page.original_image_url.is_some()
    }

    /// How many page binaries a complete local mirror of this illustration
    /// holds. Never zero, even if the API reports an empty page list.
    pub fn expected_page_count(&self) -> usize {
        if self.is_single_page() {
            1
        } else {
            self.meta_pages.len().max(1)
        }
    }

    /// Original-quality URLs for every page, in page order.
    pub fn page_urls(&self) -> Vec<&str> {
        if let Some(url) = &self.meta_single_page.original_image_url {
            vec![url.as_str()]
        } else {
            self.meta_pages
                .iter()
                .filter_map(|page| page.image_urls.original.as_deref())
                .collect()
        }
    }
}

/// One batch of results from a paginated listing query. Ephemeral.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub illusts: Vec<Illust>,
    /// Continuation URL; absent means the listing is exhausted.
    pub next_url: Option<String>,
}

/// Sort order for tag searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrder {
    DateDesc,
    DateAsc,
}

impl SearchOrder {
    pub fn as_sort_param(&self) -> &'static str {
        match self {
            SearchOrder::DateDesc => "date_desc",
            SearchOrder::DateAsc => "date_asc",
        }
    }
}

impl ListingPage {
    /// Decode a listing response body.
    ///
    /// A body without an `illusts` array (rate-limit notices, auth errors)
    /// is reported as [`ApiError::MalformedResponse`] so the caller's retry
    /// loop can take over.
    pub fn from_response(value: &Value) -> Result<Self, ApiError> {
        let entries = value
            .get("illusts")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::MalformedResponse(summarize(value)))?;

        let mut illusts = Vec::with_capacity(entries.len());
        for entry in entries {
            let illust: Illust = serde_json::from_value(entry.clone())
                .map_err(|e| ApiError::MalformedResponse(format!("bad illust entry: {}", e)))?;
            illusts.push(illust);
        }

        let next_url = value
            .get("next_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_owned);

        Ok(Self { illusts, next_url })
    }
}

fn summarize(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 200 {
        let mut short: String = text.chars().take(200).collect();
        short.push('…');
        short
    } else {
        text
    }
}
