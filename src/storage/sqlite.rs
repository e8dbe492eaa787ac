//! SQLite-backed listing store

use crate::extract::ListingRecord;
use crate::storage::{StorageError, Store};
use rusqlite::{named_params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS listings (
    ad_id           INTEGER PRIMARY KEY,
    url             TEXT NOT NULL,
    price           INTEGER,
    price_discount  INTEGER,
    currency        TEXT,
    year            INTEGER,
    year_month      TEXT,
    mileage_km      INTEGER,
    fuel            TEXT,
    engine_cc       INTEGER,
    power_kw        INTEGER,
    power_hp        INTEGER,
    transmission    TEXT,
    drivetrain      TEXT,
    body_type       TEXT,
    color           TEXT,
    seller_name     TEXT,
    seller_type     TEXT NOT NULL,
    location        TEXT,
    title           TEXT,
    description     TEXT,
    equipment_json  TEXT NOT NULL,
    images_json     TEXT NOT NULL,
    attributes_json TEXT NOT NULL,
    raw_html        TEXT,
    scraped_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_listings_url ON listings(url);
";

/// Listing store on a single SQLite file
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Stored URL for an ad id, if present
    pub fn url_for(&self, ad_id: i64) -> Result<Option<String>, StorageError> {
        let url = self
            .conn
            .query_row(
                "SELECT url FROM listings WHERE ad_id = :ad_id",
                named_params! { ":ad_id": ad_id },
                |row| row.get(0),
            )
            .optional()?;
        Ok(url)
    }
}

impl Store for SqliteStore {
    fn exists(&self, ad_id: i64) -> Result<bool, StorageError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM listings WHERE ad_id = :ad_id",
                named_params! { ":ad_id": ad_id },
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert(&self, record: &ListingRecord) -> Result<(), StorageError> {
        let ad_id = record.ad_id.ok_or_else(|| StorageError::MissingAdId {
            url: record.url.clone(),
        })?;

        let equipment_json = serde_json::to_string(&record.equipment)?;
        let images_json = serde_json::to_string(&record.images)?;
        let attributes_json = serde_json::to_string(&record.attributes)?;
        let scraped_at = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO listings (
                ad_id, url, price, price_discount, currency,
                year, year_month, mileage_km, fuel, engine_cc,
                power_kw, power_hp, transmission, drivetrain, body_type,
                color, seller_name, seller_type, location, title,
                description, equipment_json, images_json, attributes_json,
                raw_html, scraped_at
            ) VALUES (
                :ad_id, :url, :price, :price_discount, :currency,
                :year, :year_month, :mileage_km, :fuel, :engine_cc,
                :power_kw, :power_hp, :transmission, :drivetrain, :body_type,
                :color, :seller_name, :seller_type, :location, :title,
                :description, :equipment_json, :images_json, :attributes_json,
                :raw_html, :scraped_at
            )
            ON CONFLICT(ad_id) DO UPDATE SET
                url = excluded.url,
                price = excluded.price,
                price_discount = excluded.price_discount,
                currency = excluded.currency,
                year = excluded.year,
                year_month = excluded.year_month,
                mileage_km = excluded.mileage_km,
                fuel = excluded.fuel,
                engine_cc = excluded.engine_cc,
                power_kw = excluded.power_kw,
                power_hp = excluded.power_hp,
                transmission = excluded.transmission,
                drivetrain = excluded.drivetrain,
                body_type = excluded.body_type,
                color = excluded.color,
                seller_name = excluded.seller_name,
                seller_type = excluded.seller_type,
                location = excluded.location,
                title = excluded.title,
                description = excluded.description,
                equipment_json = excluded.equipment_json,
                images_json = excluded.images_json,
                attributes_json = excluded.attributes_json,
                raw_html = excluded.raw_html,
                scraped_at = excluded.scraped_at",
            named_params! {
                ":ad_id": ad_id,
                ":url": record.url,
                ":price": record.price,
                ":price_discount": record.price_discount,
                ":currency": record.currency,
                ":year": record.year,
                ":year_month": record.year_month,
                ":mileage_km": record.mileage_km,
                ":fuel": record.fuel,
                ":engine_cc": record.engine_cc,
                ":power_kw": record.power_kw,
                ":power_hp": record.power_hp,
                ":transmission": record.transmission,
                ":drivetrain": record.drivetrain,
                ":body_type": record.body_type,
                ":color": record.color,
                ":seller_name": record.seller_name,
                ":seller_type": record.seller_type.to_db_string(),
                ":location": record.location,
                ":title": record.title,
                ":description": record.description,
                ":equipment_json": equipment_json,
                ":images_json": images_json,
                ":attributes_json": attributes_json,
                ":raw_html": record.raw_html,
                ":scraped_at": scraped_at,
            },
        )?;
        Ok(())
    }

    fn count(&self) -> Result<i64, StorageError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count)
    }
}
