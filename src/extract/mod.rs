//! Listing extraction: HTML detail page in, normalized record out
//!
//! The extractor is deliberately tolerant. The site serves several markup
//! variants, so structure is probed in layers (tables, definition lists,
//! sequential text) and every field that cannot be resolved is simply left
//! absent. Only ad identity is mandatory, and that is enforced by the
//! pipeline, not here.

mod detail;
mod kv;
mod record;
mod text;

pub use detail::{extract_listing, parse_trailing_ad_id};
pub use kv::extract_kv_pairs;
pub use record::{ListingRecord, SellerType};
pub use text::{normalize_label, parse_int, strip_accents};
