//! Pixiv app-API client.
//!
//! Speaks the mobile app endpoints: refresh-token OAuth, paginated bookmark
//! and tag-search listings, and direct media downloads (which require the
//! app Referer header). The sync engine consumes this through the
//! `ListingSource` trait rather than calling it directly.

pub mod client;
pub mod error;
pub mod types;

pub use client::{continuation_params, AppApiClient, AppApiListing, ListingEndpoint};
pub use error::ApiError;
pub use types::{Illust, ListingPage, SearchOrder};
