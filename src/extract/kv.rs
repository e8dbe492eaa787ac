//! Label/value harvesting from loosely structured listing markup
//!
//! Pairs are collected from three sources in fixed precedence order: table
//! rows, definition lists, and finally a sequential-text heuristic for
//! layouts that render attributes as bare consecutive lines. A later source
//! never overwrites an already-collected label; structured markup is trusted
//! over the line heuristic. Each key is additionally stored accent-folded so
//! downstream mapping works regardless of the markup's accent encoding.

use crate::extract::text::strip_accents;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Labels the sequential-text fallback recognizes (accent-folded form)
const SEQUENTIAL_LABELS: &[&str] = &[
    "Evjarat",
    "Km. ora allas",
    "Uzemanyag",
    "Hengerurtartalom",
    "Teljesitmeny",
];

/// Collects an element's text the way a human reads it: node texts trimmed
/// and joined with single spaces.
pub fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flattens the document into trimmed, non-empty text lines
pub fn document_text_lines(document: &Html) -> Vec<String> {
    let mut lines = Vec::new();
    for text in document.root_element().text() {
        for line in text.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
    lines
}

fn add_pair(kv: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if key.is_empty() || value.is_empty() {
        return;
    }
    kv.entry(key.to_string())
        .or_insert_with(|| value.to_string());
    let folded = strip_accents(key);
    if folded != key {
        kv.entry(folded).or_insert_with(|| value.to_string());
    }
}

/// True when every cased character is uppercase (and at least one exists)
fn is_all_upper(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_alphabetic() {
            has_cased = true;
        }
    }
    has_cased
}

/// Harvests every label/value pair the page exposes
pub fn extract_kv_pairs(document: &Html) -> BTreeMap<String, String> {
    let mut kv = BTreeMap::new();

    // Table rows: first two header/data cells per row.
    if let (Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table tr"),
        Selector::parse("th, td"),
    ) {
        for row in document.select(&row_sel) {
            let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();
            if cells.len() >= 2 {
                add_pair(&mut kv, &cells[0], &cells[1]);
            }
        }
    }

    // Definition lists: terms zipped with definitions.
    if let (Ok(dl_sel), Ok(dt_sel), Ok(dd_sel)) = (
        Selector::parse("dl"),
        Selector::parse("dt"),
        Selector::parse("dd"),
    ) {
        for dl in document.select(&dl_sel) {
            let terms = dl.select(&dt_sel).map(element_text);
            let defs = dl.select(&dd_sel).map(element_text);
            for (term, definition) in terms.zip(defs) {
                add_pair(&mut kv, &term, &definition);
            }
        }
    }

    // Fallback: pair a short known-label line with the line right after it.
    let lines = document_text_lines(document);
    for idx in 0..lines.len().saturating_sub(1) {
        let line = &lines[idx];
        if kv.contains_key(line.as_str()) {
            continue;
        }
        let next = &lines[idx + 1];
        if line.chars().count() >= 64 || next.chars().count() >= 128 {
            continue;
        }
        if line.contains(':') || is_all_upper(line) {
            continue;
        }
        let folded = strip_accents(line);
        if folded.to_lowercase().starts_with("hirdeteskod") {
            add_pair(&mut kv, "Hirdeteskod", next);
        }
        if SEQUENTIAL_LABELS.contains(&folded.as_str()) {
            add_pair(&mut kv, &folded, next);
        }
    }

    kv
}
