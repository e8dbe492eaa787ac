//! Detail-page extractor
//!
//! Converts one listing's HTML into a [`ListingRecord`]. Pure function of its
//! inputs: no I/O, and no failure path — every missing signal leaves the
//! corresponding field absent instead of raising. Correctness failures
//! manifest as absent fields, which is why unresolvable ad identity is
//! checked loudly by the pipeline rather than here.

use crate::extract::kv::{document_text_lines, element_text, extract_kv_pairs};
use crate::extract::record::{ListingRecord, SellerType};
use crate::extract::text::{normalize_label, parse_int, strip_accents};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Amount followed by a currency marker, as rendered in visible text
/// ("1 990 000 Ft", "14 500 EUR").
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9][0-9\s\u{00a0}.]*)\s*(Ft|HUF|EUR|€)").unwrap());

/// kW part of a composite power value ("66 kW, 90 LE")
static POWER_KW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*kW").unwrap());

/// Horsepower part, both the Hungarian LE and the English hp marker
static POWER_HP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:LE|hp)").unwrap());

/// Trailing numeric path segment of a listing URL
static TRAILING_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)$").unwrap());

/// Page-embedded ad-code labels, in lookup order. The embedded code takes
/// priority over the URL-derived id.
const AD_CODE_LABELS: &[&str] = &["Hirdeteskod", "Hirdetes kod", "HirdetesKod"];

const SELLER_LABELS: &[&str] = &["Kereskedes", "Hirdeto"];
const LOCATION_LABELS: &[&str] = &["Hely", "Telephely", "Cim"];

fn map_currency(symbol: &str) -> Option<&'static str> {
    match symbol {
        "Ft" | "HUF" => Some("HUF"),
        "EUR" | "€" => Some("EUR"),
        _ => None,
    }
}

/// Typed fields a harvested label can map to
enum MappedField {
    YearMonth,
    MileageKm,
    Fuel,
    EngineCc,
    Power,
    Transmission,
    Drivetrain,
    BodyType,
    Color,
}

/// Fixed label table, keyed by the accent-folded label
fn map_label(label: &str) -> Option<MappedField> {
    match label {
        "Evjarat" | "Evjarat (gyartasi ev)" => Some(MappedField::YearMonth),
        "Km. ora allas" => Some(MappedField::MileageKm),
        "Uzemanyag" => Some(MappedField::Fuel),
        "Hengerurtartalom" => Some(MappedField::EngineCc),
        "Teljesitmeny" => Some(MappedField::Power),
        "Sebessegvalto" => Some(MappedField::Transmission),
        "Hajtas" => Some(MappedField::Drivetrain),
        "Kivitel" => Some(MappedField::BodyType),
        "Szin" => Some(MappedField::Color),
        _ => None,
    }
}

/// Parses the leading integer of a value like "2014/5 (garantált)"
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Extracts the numeric ad id from the trailing URL path segment
pub fn parse_trailing_ad_id(url: &str) -> Option<i64> {
    TRAILING_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Reads a `<meta>` tag's content by property/name
fn extract_meta(document: &Html, name: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[{}="{}"]"#, attr, name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|tag| tag.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn extract_title(document: &Html) -> Option<String> {
    if let Ok(h1_sel) = Selector::parse("h1") {
        if let Some(h1) = document.select(&h1_sel).next() {
            let text = element_text(h1);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    extract_meta(document, "og:title", "property")
}

/// Finds the parent element of the first text node matching a label after
/// accent folding, case-insensitively
fn find_heading_parent<'a>(document: &'a Html, label_ascii: &str) -> Option<ElementRef<'a>> {
    let needle = label_ascii.to_lowercase();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            if strip_accents(text).to_lowercase().contains(&needle) {
                if let Some(parent) = node.parent() {
                    if let Some(element) = ElementRef::wrap(parent) {
                        return Some(element);
                    }
                }
            }
        }
    }
    None
}

fn extract_description(document: &Html) -> Option<String> {
    if let Some(container) = find_heading_parent(document, "Leiras") {
        let text = element_text(container);
        // A bare heading matches its own label; require real content.
        if text.chars().count() > 20 {
            return Some(text);
        }
    }
    extract_meta(document, "og:description", "property")
}

fn extract_equipment(document: &Html) -> Vec<String> {
    let mut equipment: Vec<String> = Vec::new();
    let li_sel = match Selector::parse("li") {
        Ok(sel) => sel,
        Err(_) => return equipment,
    };

    if let Some(container) = find_heading_parent(document, "Felszereltseg") {
        for li in container.select(&li_sel) {
            let text = element_text(li);
            if !text.is_empty() && !equipment.contains(&text) {
                equipment.push(text);
            }
        }
    }

    if equipment.is_empty() {
        if let Ok(id_sel) = Selector::parse("section[id], div[id]") {
            for node in document.select(&id_sel) {
                let id = node.value().attr("id").unwrap_or("");
                if !id.to_lowercase().contains("felszerelt") {
                    continue;
                }
                for li in node.select(&li_sel) {
                    let text = element_text(li);
                    if !text.is_empty() && !equipment.contains(&text) {
                        equipment.push(text);
                    }
                }
            }
        }
    }

    equipment
}

/// The registrable site domain used to keep images on-site
/// ("www.hasznaltauto.hu" -> "hasznaltauto.hu")
fn site_domain(base_url: &Url) -> Option<String> {
    base_url
        .host_str()
        .map(|host| host.trim_start_matches("www.").to_string())
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();
    let img_sel = match Selector::parse("img") {
        Ok(sel) => sel,
        Err(_) => return images,
    };
    let domain = site_domain(base_url);

    for img in document.select(&img_sel) {
        let src = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(mut src) = src.map(str::to_string) else {
            continue;
        };
        if src.starts_with("//") {
            src = format!("https:{}", src);
        }
        let Ok(resolved) = base_url.join(&src) else {
            continue;
        };
        if let Some(domain) = &domain {
            let on_site = resolved
                .host_str()
                .map(|host| host.ends_with(domain.as_str()))
                .unwrap_or(false);
            if !on_site {
                continue;
            }
        }
        let resolved = resolved.to_string();
        if !images.contains(&resolved) {
            images.push(resolved);
        }
    }

    images
}

/// Resolves price, discounted price, and currency
///
/// Page metadata wins; otherwise visible text lines are scanned for a
/// number-plus-currency pattern. A line carrying the "Akció" marker feeds
/// the discounted-price field; the base price stops scanning at its first
/// match while discount scanning continues across all lines.
fn extract_prices(
    document: &Html,
    record: &mut ListingRecord,
) {
    for meta_name in ["product:price:amount", "og:price:amount"] {
        if record.price.is_some() {
            break;
        }
        if let Some(value) = extract_meta(document, meta_name, "property") {
            record.price = parse_int(&value);
        }
    }
    if let Some(currency) = extract_meta(document, "product:price:currency", "property") {
        record.currency = Some(currency);
    }

    if record.price.is_some() {
        return;
    }

    for line in document_text_lines(document) {
        let folded = strip_accents(&line);
        if folded.contains("Akcio") {
            if let Some(caps) = PRICE_RE.captures(&line) {
                record.price_discount = parse_int(&caps[1]);
                if let Some(code) = map_currency(&caps[2]) {
                    record.currency = Some(code.to_string());
                }
            }
        }
        if record.price.is_none() {
            if let Some(caps) = PRICE_RE.captures(&line) {
                record.price = parse_int(&caps[1]);
                if let Some(code) = map_currency(&caps[2]) {
                    record.currency = Some(code.to_string());
                }
            }
        }
    }
}

/// Extracts one listing page into a normalized record
///
/// Never fails: any field the page does not expose stays absent. The caller
/// is responsible for rejecting records whose ad id cannot be resolved.
pub fn extract_listing(html: &str, url: &str, base_url: &str) -> ListingRecord {
    let document = Html::parse_document(html);
    let mut record = ListingRecord::new(url);

    record.title = extract_title(&document);
    record.description = extract_description(&document);
    record.equipment = extract_equipment(&document);
    if let Ok(base) = Url::parse(base_url) {
        record.images = extract_images(&document, &base);
    }

    let kv = extract_kv_pairs(&document);

    // Ad identity: the page-embedded ad code wins over the URL id.
    for label in AD_CODE_LABELS {
        if let Some(value) = kv.get(*label) {
            record.ad_id = parse_int(value);
            break;
        }
    }
    if record.ad_id.is_none() {
        record.ad_id = parse_trailing_ad_id(url);
    }

    extract_prices(&document, &mut record);

    for (raw_key, value) in &kv {
        let normalized = normalize_label(raw_key);
        let mapped = map_label(&normalized).or_else(|| map_label(raw_key));
        let Some(mapped) = mapped else {
            continue;
        };
        match mapped {
            MappedField::YearMonth => {
                record.year_month = Some(value.clone());
                record.year = parse_leading_int(value);
            }
            MappedField::MileageKm => record.mileage_km = parse_int(value),
            MappedField::EngineCc => record.engine_cc = parse_int(value),
            MappedField::Power => {
                if let Some(caps) = POWER_KW_RE.captures(value) {
                    record.power_kw = caps[1].parse().ok();
                }
                if let Some(caps) = POWER_HP_RE.captures(value) {
                    record.power_hp = caps[1].parse().ok();
                }
            }
            MappedField::Fuel => record.fuel = Some(value.clone()),
            MappedField::Transmission => record.transmission = Some(value.clone()),
            MappedField::Drivetrain => record.drivetrain = Some(value.clone()),
            MappedField::BodyType => record.body_type = Some(value.clone()),
            MappedField::Color => record.color = Some(value.clone()),
        }
    }

    for label in SELLER_LABELS {
        if let Some(name) = kv.get(*label) {
            record.seller_name = Some(name.clone());
            record.seller_type = SellerType::Dealer;
            break;
        }
    }
    if record.seller_name.is_none() && kv.contains_key("Maganszemely") {
        record.seller_type = SellerType::Private;
    }

    for label in LOCATION_LABELS {
        if let Some(location) = kv.get(*label) {
            record.location = Some(location.clone());
            break;
        }
    }

    record.attributes = kv;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.hasznaltauto.hu";

    fn detail_page() -> String {
        r#"<html>
        <head>
            <title>Opel Astra</title>
            <meta property="og:description" content="Rövid leírás a hirdetésről."/>
        </head>
        <body>
            <h1>OPEL ASTRA 1.4</h1>
            <div>1 990 000 Ft</div>
            <table>
                <tr><th>Évjárat</th><td>2014/5</td></tr>
                <tr><th>Km. óra állás</th><td>149 000 km</td></tr>
                <tr><th>Üzemanyag</th><td>Benzin</td></tr>
                <tr><th>Hengerűrtartalom</th><td>1 398 cm³</td></tr>
                <tr><th>Teljesítmény</th><td>66 kW, 90 LE</td></tr>
                <tr><th>Sebességváltó</th><td>Manuális (5 fokozatú)</td></tr>
                <tr><th>Kivitel</th><td>Ferdehátú</td></tr>
                <tr><th>Szín</th><td>Szürke</td></tr>
                <tr><th>Kereskedés</th><td>Autó Kft.</td></tr>
                <tr><th>Hely</th><td>Budapest XIII.</td></tr>
            </table>
            <div><span>Hirdetéskód</span><span>21479633</span></div>
            <section id="felszereltseg">
                <h2>Felszereltség</h2>
                <ul><li>klíma</li><li>ABS</li><li>klíma</li></ul>
            </section>
            <img src="/kep/auto-1.jpg"/>
            <img data-src="//www.hasznaltauto.hu/kep/auto-2.jpg"/>
            <img src="https://cdn.other-site.com/tracker.gif"/>
        </body>
        </html>"#
            .to_string()
    }

    #[test]
    fn test_full_detail_extraction() {
        let url = "https://www.hasznaltauto.hu/szemelyauto/opel/astra/opel-astra-1-4-18000000";
        let record = extract_listing(&detail_page(), url, BASE);

        assert_eq!(record.title.as_deref(), Some("OPEL ASTRA 1.4"));
        assert_eq!(record.price, Some(1_990_000));
        assert_eq!(record.currency.as_deref(), Some("HUF"));
        assert_eq!(record.year, Some(2014));
        assert_eq!(record.year_month.as_deref(), Some("2014/5"));
        assert_eq!(record.mileage_km, Some(149_000));
        assert_eq!(record.fuel.as_deref(), Some("Benzin"));
        assert_eq!(record.engine_cc, Some(1398));
        assert_eq!(record.power_kw, Some(66));
        assert_eq!(record.power_hp, Some(90));
        assert_eq!(record.transmission.as_deref(), Some("Manuális (5 fokozatú)"));
        assert_eq!(record.body_type.as_deref(), Some("Ferdehátú"));
        assert_eq!(record.color.as_deref(), Some("Szürke"));
        assert_eq!(record.seller_name.as_deref(), Some("Autó Kft."));
        assert_eq!(record.seller_type, SellerType::Dealer);
        assert_eq!(record.location.as_deref(), Some("Budapest XIII."));
        assert_eq!(record.equipment, vec!["klíma".to_string(), "ABS".to_string()]);
        assert_eq!(record.images.len(), 2);
        assert!(record.images[0].ends_with("/kep/auto-1.jpg"));
        // Unmapped labels survive in the attributes map.
        assert!(record.attributes.contains_key("Évjárat"));
        assert!(record.attributes.contains_key("Evjarat"));
    }

    #[test]
    fn test_ad_code_beats_url_id() {
        let url = "https://www.hasznaltauto.hu/szemelyauto/opel/astra/opel-astra-1-4-18000000";
        let record = extract_listing(&detail_page(), url, BASE);
        assert_eq!(record.ad_id, Some(21_479_633));
    }

    #[test]
    fn test_url_id_fallback() {
        let html = "<html><body><h1>Teszt</h1></body></html>";
        let url = "https://www.hasznaltauto.hu/szemelyauto/teszt-auto-12345678";
        let record = extract_listing(html, url, BASE);
        assert_eq!(record.ad_id, Some(12_345_678));
    }

    #[test]
    fn test_parse_trailing_ad_id() {
        assert_eq!(
            parse_trailing_ad_id("https://x.hu/szemelyauto/opel-astra-19876543"),
            Some(19_876_543)
        );
        assert_eq!(parse_trailing_ad_id("https://x.hu/szemelyauto/opel-astra"), None);
    }

    #[test]
    fn test_discount_price_line() {
        let html = r#"<html><body>
            <p>2 490 000 Ft</p>
            <p>Akció! Most csak 1 750 000 Ft</p>
        </body></html>"#;
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert_eq!(record.price, Some(2_490_000));
        assert_eq!(record.price_discount, Some(1_750_000));
        assert_eq!(record.currency.as_deref(), Some("HUF"));
    }

    #[test]
    fn test_price_from_meta_skips_text_scan() {
        let html = r#"<html><head>
            <meta property="product:price:amount" content="3200000"/>
            <meta property="product:price:currency" content="HUF"/>
        </head><body><p>1 000 000 Ft</p></body></html>"#;
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert_eq!(record.price, Some(3_200_000));
        assert_eq!(record.currency.as_deref(), Some("HUF"));
        assert_eq!(record.price_discount, None);
    }

    #[test]
    fn test_euro_price() {
        let html = "<html><body><p>14 500 EUR</p></body></html>";
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert_eq!(record.price, Some(14_500));
        assert_eq!(record.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_private_seller() {
        let html = r#"<html><body><table>
            <tr><th>Magánszemély</th><td>igen</td></tr>
        </table></body></html>"#;
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert_eq!(record.seller_type, SellerType::Private);
        assert_eq!(record.seller_name, None);
    }

    #[test]
    fn test_missing_everything_still_yields_record() {
        let record = extract_listing("<html></html>", "https://x.hu/szemelyauto/a-9", BASE);
        assert_eq!(record.ad_id, Some(9));
        assert_eq!(record.price, None);
        assert_eq!(record.seller_type, SellerType::Unknown);
        assert!(record.images.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let url = "https://www.hasznaltauto.hu/szemelyauto/opel-astra-18000000";
        let html = detail_page();
        let first = extract_listing(&html, url, BASE);
        let second = extract_listing(&html, url, BASE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_description_falls_back_to_meta() {
        let html = r#"<html><head>
            <meta property="og:description" content="Megkímélt állapotú autó."/>
        </head><body><h2>Leírás</h2></body></html>"#;
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert_eq!(record.description.as_deref(), Some("Megkímélt állapotú autó."));
    }

    #[test]
    fn test_description_from_heading_container() {
        let html = r#"<html><body>
            <div>Leírás Első tulajdonostól, vezetett szervizkönyvvel eladó.</div>
        </body></html>"#;
        let record = extract_listing(html, "https://x.hu/szemelyauto/a-1", BASE);
        assert!(record
            .description
            .as_deref()
            .unwrap()
            .contains("szervizkönyvvel"));
    }
}
