use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::pixiv::{ApiError, ListingPage};

/// Paged listing source consumed by the sync engine.
///
/// The engine never constructs requests itself: continuation parameters are
/// whatever [`crate::pixiv::continuation_params`] extracted from the previous
/// page, passed back verbatim. Implemented by `pixiv::AppApiListing` in
/// production and by mocks in tests.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the listing page identified by `params`.
    async fn fetch_next(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<ListingPage, ApiError>;

    /// Fetch one media URL into `dest_dir`.
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<(), ApiError>;
}
