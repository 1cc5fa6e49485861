//! Report types — the engine's output contract.
//!
//! Field names match the report consumer's schema exactly; do not rename
//! without coordinating with the reporting side. Detectors carry 2-decimal
//! score precision internally; the aggregator rounds to 1 decimal for the
//! final report.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::types::AccountId;

/// The laundering topology a ring was detected under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Cycle,
    FanIn,
    FanOut,
    ShellNetwork,
}

/// A detected group of accounts participating in one pattern instance.
/// Rings are immutable once produced; ring ids are unique per run but
/// each detector mints its own numbering scheme (`RING_###`,
/// `SMURF_IN_<id>` / `SMURF_OUT_<id>`, `SHELL_###`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<AccountId>,
    pub pattern_type: PatternType,
    pub risk_score: f64,
    /// Timestamp of the latest contributing transaction,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub detected_at: Option<String>,
}

/// One flagged account. An account flagged by several detectors is merged
/// by the aggregator: max score wins, pattern labels are unioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account_id: AccountId,
    pub suspicion_score: f64,
    pub detected_patterns: Vec<String>,
    pub ring_id: String,
}

/// What a single detector hands back to the aggregator.
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub rings: Vec<FraudRing>,
    pub accounts: Vec<SuspiciousAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
}

/// The engine's full output, serialized verbatim by the report writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub summary: Summary,
}

impl DetectionReport {
    /// Pretty-printed JSON in the consumer's schema.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
