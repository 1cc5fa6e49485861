//! The detection engine — graph construction, the three detectors, and
//! result aggregation.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Graph builder
//!   2. Circular fund routing detector
//!   3. Smurfing detector
//!   4. Shell network detector
//!   5. Aggregation
//!
//! RULES:
//!   - Detectors read ONLY the shared immutable graph; none sees another's
//!     output. They are pure and could run concurrently; we run them
//!     sequentially — batches are bounded and the detectors dominate
//!     nothing worth a thread pool.
//!   - A detector invariant violation panics and aborts the whole run.
//!     Silently reporting two detectors' results as if they were three is
//!     worse than no report.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::circular;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::graph::TransactionGraph;
use crate::report::{round1, DetectionReport, DetectorOutput, SuspiciousAccount, Summary};
use crate::shell;
use crate::smurfing;
use crate::types::{AccountId, TransactionRecord};

pub struct DetectionEngine {
    config: EngineConfig,
}

impl DetectionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one full detection pass over a transaction batch.
    ///
    /// The engine is stateless between runs: everything derived here is
    /// discarded when the report is returned.
    pub fn run(&self, records: &[TransactionRecord]) -> EngineResult<DetectionReport> {
        let started = Instant::now();

        let graph = TransactionGraph::build(records);
        log::info!(
            "engine: {} records in, {} accounts, {} edges, {} skipped",
            records.len(),
            graph.node_count(),
            graph.edge_count(),
            graph.skipped_records()
        );

        let outputs = [
            circular::detect_cycles(&graph, &self.config.cycle),
            smurfing::detect_smurfing(&graph, &self.config.smurfing),
            shell::detect_shell_networks(&graph, &self.config.shell),
        ];

        let report = aggregate(&graph, outputs, started);
        log::info!(
            "engine: {} suspicious accounts, {} rings in {:.1}s",
            report.summary.suspicious_accounts_flagged,
            report.summary.fraud_rings_detected,
            report.summary.processing_time_seconds
        );
        Ok(report)
    }
}

/// Merged per-account state while folding detector outputs.
struct MergedAccount {
    score: f64,
    patterns: BTreeSet<String>,
    ring_id: String,
}

fn aggregate(
    graph: &TransactionGraph,
    outputs: [DetectorOutput; 3],
    started: Instant,
) -> DetectionReport {
    let mut order: Vec<AccountId> = Vec::new();
    let mut merged: HashMap<AccountId, MergedAccount> = HashMap::new();
    let mut fraud_rings = Vec::new();

    for output in outputs {
        for record in output.accounts {
            match merged.get_mut(&record.account_id) {
                Some(existing) => {
                    // Max score wins; the ring id follows the score.
                    if record.suspicion_score > existing.score {
                        existing.score = record.suspicion_score;
                        existing.ring_id = record.ring_id;
                    }
                    existing.patterns.extend(record.detected_patterns);
                }
                None => {
                    order.push(record.account_id.clone());
                    merged.insert(
                        record.account_id,
                        MergedAccount {
                            score: record.suspicion_score,
                            patterns: record.detected_patterns.into_iter().collect(),
                            ring_id: record.ring_id,
                        },
                    );
                }
            }
        }
        fraud_rings.extend(output.rings);
    }

    let mut suspicious_accounts: Vec<SuspiciousAccount> = order
        .into_iter()
        .map(|account_id| {
            let m = merged.remove(&account_id).expect("merged entry exists");
            SuspiciousAccount {
                account_id,
                suspicion_score: round1(m.score),
                detected_patterns: m.patterns.into_iter().collect(),
                ring_id: m.ring_id,
            }
        })
        .collect();

    // Descending score, ascending id as tie-break: stable, testable order.
    suspicious_accounts.sort_by(|a, b| {
        b.suspicion_score
            .partial_cmp(&a.suspicion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    for ring in &mut fraud_rings {
        ring.risk_score = round1(ring.risk_score);
    }

    let summary = Summary {
        // Census over the raw batch, not over surviving graph nodes: an
        // account mentioned only on skipped records was still analyzed.
        total_accounts_analyzed: graph.accounts_seen(),
        suspicious_accounts_flagged: suspicious_accounts.len(),
        fraud_rings_detected: fraud_rings.len(),
        processing_time_seconds: round1(started.elapsed().as_secs_f64()),
    };

    DetectionReport {
        suspicious_accounts,
        fraud_rings,
        summary,
    }
}
