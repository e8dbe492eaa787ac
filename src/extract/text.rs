//! Text normalization helpers for label matching and numeric parsing
//!
//! Hungarian labels arrive with inconsistent accent encoding depending on
//! which markup variant served the page, so label matching runs on an
//! accent-folded form. Values are always preserved verbatim.

/// Folds Hungarian accented letters to their ASCII equivalents.
/// Only letters used by the site's labels are mapped; everything else
/// passes through untouched.
pub fn strip_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' => 'a',
            'Á' => 'A',
            'é' => 'e',
            'É' => 'E',
            'í' => 'i',
            'Í' => 'I',
            'ó' => 'o',
            'Ó' => 'O',
            'ö' => 'o',
            'Ö' => 'O',
            'ő' => 'o',
            'Ő' => 'O',
            'ú' => 'u',
            'Ú' => 'U',
            'ü' => 'u',
            'Ü' => 'U',
            'ű' => 'u',
            'Ű' => 'U',
            other => other,
        })
        .collect()
}

/// Trims and accent-folds a label for lookup.
pub fn normalize_label(text: &str) -> String {
    strip_accents(text.trim())
}

/// Parses the first integer hidden in locale-formatted text by dropping
/// every non-digit character ("1 990 000 Ft" -> 1990000).
pub fn parse_int(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("Évjárat"), "Evjarat");
        assert_eq!(strip_accents("Hengerűrtartalom"), "Hengerurtartalom");
        assert_eq!(strip_accents("Km. óra állás"), "Km. ora allas");
        assert_eq!(strip_accents("Sebességváltó"), "Sebessegvalto");
        assert_eq!(strip_accents("plain ascii"), "plain ascii");
    }

    #[test]
    fn test_normalize_label_trims() {
        assert_eq!(normalize_label("  Üzemanyag  "), "Uzemanyag");
    }

    #[test]
    fn test_parse_int_grouped_number() {
        assert_eq!(parse_int("1 990 000"), Some(1_990_000));
        assert_eq!(parse_int("149\u{a0}000 km"), Some(149_000));
        assert_eq!(parse_int("1.395 cm\u{b3}"), Some(1395));
    }

    #[test]
    fn test_parse_int_no_digits() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("nincs adat"), None);
    }
}
