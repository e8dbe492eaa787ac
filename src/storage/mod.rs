//! Record persistence
//!
//! One trait, one SQLite implementation. Records are keyed by the
//! site-assigned ad id; writing is an upsert so re-scraping a listing
//! refreshes the stored row instead of duplicating it.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::extract::ListingRecord;
use thiserror::Error;

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// A record without a resolved ad id cannot be keyed
    #[error("record has no ad id: {url}")]
    MissingAdId { url: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence contract for extracted listings
pub trait Store {
    /// Whether a listing with this ad id is already stored
    fn exists(&self, ad_id: i64) -> Result<bool, StorageError>;

    /// Inserts the record, replacing any existing row with the same ad id
    fn upsert(&self, record: &ListingRecord) -> Result<(), StorageError>;

    /// Number of stored listings
    fn count(&self) -> Result<i64, StorageError>;
}
