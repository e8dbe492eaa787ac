//! The normalized listing record produced by the detail extractor

use std::collections::BTreeMap;

/// Who is offering the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerType {
    Dealer,
    Private,
    Unknown,
}

impl SellerType {
    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::Dealer => "dealer",
            Self::Private => "private",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "dealer" => Some(Self::Dealer),
            "private" => Some(Self::Private),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// One extracted vehicle listing
///
/// Every field except the URL is optional: the extractor degrades gracefully
/// on missing signals rather than failing. A record is only persistable once
/// `ad_id` has been resolved (from the page's ad-code field or the URL).
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Site-assigned ad identifier; the store key
    pub ad_id: Option<i64>,
    pub url: String,

    // Commercial
    pub price: Option<i64>,
    pub price_discount: Option<i64>,
    pub currency: Option<String>,

    // Vehicle
    pub year: Option<i64>,
    /// Raw year/month text as shown on the page, e.g. "2014/5"
    pub year_month: Option<String>,
    pub mileage_km: Option<i64>,
    pub fuel: Option<String>,
    pub engine_cc: Option<i64>,
    pub power_kw: Option<i64>,
    pub power_hp: Option<i64>,
    pub transmission: Option<String>,
    pub drivetrain: Option<String>,
    pub body_type: Option<String>,
    pub color: Option<String>,

    // Seller
    pub seller_name: Option<String>,
    pub seller_type: SellerType,
    pub location: Option<String>,

    // Content
    pub title: Option<String>,
    pub description: Option<String>,
    /// De-duplicated, in discovery order
    pub equipment: Vec<String>,
    /// De-duplicated absolute URLs, in discovery order
    pub images: Vec<String>,

    /// Every harvested label/value pair, verbatim, including unmapped ones
    pub attributes: BTreeMap<String, String>,

    /// Raw page HTML when retention is enabled
    pub raw_html: Option<String>,
}

impl ListingRecord {
    /// An empty record for the given URL
    pub fn new(url: &str) -> Self {
        Self {
            ad_id: None,
            url: url.to_string(),
            price: None,
            price_discount: None,
            currency: None,
            year: None,
            year_month: None,
            mileage_km: None,
            fuel: None,
            engine_cc: None,
            power_kw: None,
            power_hp: None,
            transmission: None,
            drivetrain: None,
            body_type: None,
            color: None,
            seller_name: None,
            seller_type: SellerType::Unknown,
            location: None,
            title: None,
            description: None,
            equipment: Vec::new(),
            images: Vec::new(),
            attributes: BTreeMap::new(),
            raw_html: None,
        }
    }
}
