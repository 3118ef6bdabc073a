//! Field extraction from delivery note page text.
//!
//! Each field group is matched independently by ordered pattern rules;
//! a rule either yields a typed value or leaves the field absent.
//! Extraction never aborts early: a page missing its quantity still
//! reports whether identity and site matched, maximizing diagnostic
//! context for quarantine.

pub mod plate;

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::PageFields;

static IDENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Num\. D\.D\.T\. ([\d.]+)/(\w{2}) Data D\.D\.T\. (\d{2}/\d{2}/\d{4}) Pag")
        .unwrap()
});

/// Site layouts in fixed priority: the delivery block wins over the
/// departure block when both are present.
static SITE_LAYOUTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(
                r"Luogo di consegna\r?\n([\w\s.&\-']+?)\r?\n.+\r?\n(\d{0,5}) ?([\w\s']+?) \(?(\w{2})\)?\r?\n",
            )
            .unwrap(),
            "delivery",
        ),
        (
            Regex::new(
                r"Luogo di partenza: .+\r?\n([\w\s.&\-']+?)\r?\n(\d{5}) ([\w\s']+?) \(?(\w{2})\)?\r?\n",
            )
            .unwrap(),
            "departure",
        ),
    ]
});

static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Quantità Prezzo\r?\n.+)? (L|KG) ([\d.]+),000\r?\n").unwrap());

static VEHICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Peso soggetto accisa\r?\n([A-Za-z0-9]{7})\r?\n").unwrap());

/// Extract every field the page text yields. Pure function.
pub fn extract_page(text: &str) -> PageFields {
    let mut fields = PageFields::default();

    if let Some(caps) = IDENTITY.captures(text) {
        fields.record_number = parse_grouped_number(caps.get(1).map_or("", |m| m.as_str()));
        fields.record_kind = caps.get(2).map(|m| m.as_str().to_string());
        fields.record_date = caps
            .get(3)
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").ok());
        // The delivery date mirrors the document date in this layout
        fields.secondary_date = fields.record_date;
    }

    for (pattern, layout) in SITE_LAYOUTS.iter() {
        if let Some(caps) = pattern.captures(text) {
            fields.issuer = caps.get(1).map(|m| m.as_str().trim().to_string());
            fields.site = caps.get(3).map(|m| m.as_str().trim().to_string());
            tracing::trace!(layout, "site block matched");
            break;
        }
    }

    if let Some(caps) = QUANTITY.captures(text) {
        fields.quantity = parse_grouped_number(caps.get(2).map_or("", |m| m.as_str()));
    }

    if let Some(caps) = VEHICLE.captures(text) {
        fields.vehicle_id = caps.get(1).map(|m| m.as_str().to_uppercase());
    }

    fields
}

/// Parse an integer written with thousands separators, e.g. "1.200" -> 1200.
fn parse_grouped_number(s: &str) -> Option<i64> {
    let digits = s.replace('.', "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PAGE: &str = "Num. D.D.T. 1.234/AB Data D.D.T. 15/03/2024 Pag. 1\n\
        Luogo di partenza: Deposito Nord\n\
        Verdi Petroli S.P.A.\n\
        55100 Lucca (LU)\n\
        Luogo di consegna\n\
        Rossi Carburanti S.R.L.\n\
        Via Roma 12\n\
        50100 Firenze (FI)\n\
        Quantità Prezzo\n\
        Gasolio autotrazione L 1.200,000\n\
        Peso soggetto accisa\n\
        ES745WH\n";

    #[test]
    fn test_full_page_extracts_every_field() {
        let fields = extract_page(FULL_PAGE);
        assert!(fields.is_complete());
        assert_eq!(fields.record_number, Some(1234));
        assert_eq!(fields.record_kind.as_deref(), Some("AB"));
        assert_eq!(fields.record_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(fields.secondary_date, fields.record_date);
        assert_eq!(fields.quantity, Some(1200));
        assert_eq!(fields.vehicle_id.as_deref(), Some("ES745WH"));
    }

    #[test]
    fn test_delivery_layout_wins_over_departure() {
        let fields = extract_page(FULL_PAGE);
        assert_eq!(fields.issuer.as_deref(), Some("Rossi Carburanti S.R.L."));
        assert_eq!(fields.site.as_deref(), Some("Firenze"));
    }

    #[test]
    fn test_departure_layout_as_fallback() {
        let text = "Num. D.D.T. 56/AB Data D.D.T. 02/01/2024 Pag. 1\n\
            Luogo di partenza: Deposito Nord\n\
            Verdi Petroli S.P.A.\n\
            55100 Lucca (LU)\n\
            Totale L 800,000\n\
            Peso soggetto accisa\n\
            FC065ZW\n";
        let fields = extract_page(text);
        assert_eq!(fields.issuer.as_deref(), Some("Verdi Petroli S.P.A."));
        assert_eq!(fields.site.as_deref(), Some("Lucca"));
        assert_eq!(fields.quantity, Some(800));
    }

    #[test]
    fn test_missing_quantity_leaves_other_fields() {
        let text = "Num. D.D.T. 7/AB Data D.D.T. 05/06/2024 Pag. 1\n\
            Luogo di consegna\n\
            Rossi Carburanti S.R.L.\n\
            Via Roma 12\n\
            50100 Firenze (FI)\n\
            Peso soggetto accisa\n\
            ES745WH\n";
        let fields = extract_page(text);
        assert!(!fields.is_complete());
        assert_eq!(fields.first_gap(), Some("quantity"));
        assert_eq!(fields.record_number, Some(7));
        assert_eq!(fields.vehicle_id.as_deref(), Some("ES745WH"));
    }

    #[test]
    fn test_blank_page_extracts_nothing() {
        let fields = extract_page("nothing to see here\n");
        assert_eq!(fields, PageFields::default());
        assert_eq!(fields.first_gap(), Some("identity"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "Num. D.D.T. 9/AB Data D.D.T. 10/02/2024 Pag. 1\r\n\
            Luogo di consegna\r\n\
            Bianchi & Figli S.N.C.\r\n\
            Piazza Grande 1\r\n\
            41100 Modena (MO)\r\n\
            Totale L 2.500,000\r\n\
            Peso soggetto accisa\r\n\
            FC065ZW\r\n";
        let fields = extract_page(text);
        assert!(fields.is_complete());
        assert_eq!(fields.issuer.as_deref(), Some("Bianchi & Figli S.N.C."));
        assert_eq!(fields.site.as_deref(), Some("Modena"));
        assert_eq!(fields.quantity, Some(2500));
    }

    #[test]
    fn test_grouped_number_parsing() {
        assert_eq!(parse_grouped_number("1.234"), Some(1234));
        assert_eq!(parse_grouped_number("800"), Some(800));
        assert_eq!(parse_grouped_number(""), None);
        assert_eq!(parse_grouped_number("x"), None);
    }
}
