//! Delivery record models.
//!
//! A `PageRecord` is one validated delivery note page; a `PageFields`
//! accumulates whatever the extractor could determine for a page, each
//! field independently optional, so a failed page still carries maximum
//! diagnostic context into quarantine.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A persisted delivery note page.
///
/// Uniqueness is enforced on (source, page) and on
/// (record_number, record_kind, year of record_date). Rows are
/// immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub record_number: i64,
    /// Short code distinguishing the document series, e.g. "AB".
    pub record_kind: String,
    pub record_date: NaiveDate,
    pub issuer: String,
    pub site: String,
    pub quantity: i64,
    /// Delivery date; mirrors record_date in the source layout.
    pub secondary_date: NaiveDate,
    pub vehicle_id: String,
    /// Name of the source document this page came from.
    pub source: String,
    /// 1-based page number within the source document.
    pub page: i64,
    pub registered_at: DateTime<Utc>,
}

impl PageRecord {
    /// Year component of the record date, part of the dedup key.
    pub fn year(&self) -> i32 {
        self.record_date.year()
    }
}

/// Per-field extraction result for one page.
///
/// Every field is independently optional; extraction never aborts
/// early, so a page missing the quantity still reports whether the
/// identity block matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFields {
    pub record_number: Option<i64>,
    pub record_kind: Option<String>,
    pub record_date: Option<NaiveDate>,
    pub issuer: Option<String>,
    pub site: Option<String>,
    pub quantity: Option<i64>,
    pub secondary_date: Option<NaiveDate>,
    pub vehicle_id: Option<String>,
}

impl PageFields {
    /// True iff identity, site, quantity and vehicle are all present.
    pub fn is_complete(&self) -> bool {
        self.first_gap().is_none()
    }

    /// Name of the first missing mandatory field, in extraction order.
    pub fn first_gap(&self) -> Option<&'static str> {
        if self.record_number.is_none()
            || self.record_kind.is_none()
            || self.record_date.is_none()
        {
            return Some("identity");
        }
        if self.issuer.is_none() || self.site.is_none() {
            return Some("site");
        }
        if self.quantity.is_none() {
            return Some("quantity");
        }
        if self.vehicle_id.is_none() {
            return Some("vehicle");
        }
        None
    }

    /// Build a persistable record from these fields.
    ///
    /// Returns None unless the field set is complete.
    pub fn to_record(
        &self,
        source: &str,
        page: i64,
        registered_at: DateTime<Utc>,
    ) -> Option<PageRecord> {
        let record_date = self.record_date?;
        Some(PageRecord {
            record_number: self.record_number?,
            record_kind: self.record_kind.clone()?,
            record_date,
            issuer: self.issuer.clone()?,
            site: self.site.clone()?,
            quantity: self.quantity?,
            secondary_date: self.secondary_date.unwrap_or(record_date),
            vehicle_id: self.vehicle_id.clone()?,
            source: source.to_string(),
            page,
            registered_at,
        })
    }
}

/// A quarantined page: partial fields, the exported artifact, and the
/// diagnostic message it is linked to.
///
/// Rows are never deleted; `resolved` flips to true exactly once when
/// reconciliation promotes the entry into the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedPage {
    pub id: i64,
    pub fields: PageFields,
    pub source: String,
    pub page: i64,
    pub artifact: String,
    pub message_id: i64,
    pub resolved: bool,
}
