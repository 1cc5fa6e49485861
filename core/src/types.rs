//! Shared primitive types used across the entire engine.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A stable account identifier.
///
/// Cycle deduplication relies on lexicographic comparison of these ids
/// (every cycle is anchored at its smallest member — see
/// [`crate::circular`]). Switching to numeric or UUID ids changes which
/// node is treated as the anchor, not which cycles exist.
pub type AccountId = String;

/// A raw transaction record as handed over by the validation collaborator.
///
/// The amount and timestamp may still be malformed (non-finite or negative
/// amount, unparseable timestamp string); sanitization happens at graph
/// construction, where bad records are silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: f64,
    pub timestamp: String,
}

/// Date-time formats accepted for transaction timestamps, tried in order.
/// RFC 3339 / ISO-8601 and bare dates are handled separately.
const TS_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Parse a transaction timestamp. Returns None for anything unparseable —
/// the caller drops the record rather than erroring.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in TS_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    // Bare date: midnight.
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Render a timestamp in the report's canonical format.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
