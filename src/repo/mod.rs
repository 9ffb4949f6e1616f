//! Repositories over the blob store.
//!
//! One illustration occupies the key space `"{user_id}/{illust_id}/"`:
//! `illust.json` holds the metadata record, everything else is a page binary
//! named after its original remote filename.

pub mod media;
pub mod meta;

pub use media::IllustMediaRepo;
pub use meta::{IllustMetaRecord, IllustMetaRepo};

/// Key prefix for everything belonging to one illustration.
pub(crate) fn illust_prefix(user_id: u64, illust_id: u64) -> String {
    format!("{}/{}/", user_id, illust_id)
}
