//! Smurfing detector (fan-in / fan-out aggregation).
//!
//! For every account, the incoming and outgoing transactions are scanned
//! with a two-pointer 72-hour sliding window tracking a multiset of
//! unique counterparties. The first window reaching the fan threshold
//! emits one ring for that account and direction; scanning then stops —
//! at most one fan-in and one fan-out ring per account.
//!
//! Accounts with 20+ transactions in a direction are skipped: genuinely
//! high-volume parties (payroll, merchants) would otherwise dominate the
//! results.

use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;

use crate::config::SmurfingConfig;
use crate::graph::TransactionGraph;
use crate::report::{DetectorOutput, FraudRing, PatternType, SuspiciousAccount};
use crate::types::{format_timestamp, AccountId};

/// Flagged rings start here; each unique counterparty adds a point.
const BASE_SCORE: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    FanIn,
    FanOut,
}

impl Direction {
    fn pattern_type(self) -> PatternType {
        match self {
            Self::FanIn => PatternType::FanIn,
            Self::FanOut => PatternType::FanOut,
        }
    }

    fn center_label(self) -> &'static str {
        match self {
            Self::FanIn => "fan_in",
            Self::FanOut => "fan_out",
        }
    }

    fn member_label(self) -> &'static str {
        match self {
            Self::FanIn => "fan_in_member",
            Self::FanOut => "fan_out_member",
        }
    }

    fn ring_id(self, center: &str) -> String {
        match self {
            Self::FanIn => format!("SMURF_IN_{center}"),
            Self::FanOut => format!("SMURF_OUT_{center}"),
        }
    }
}

/// Pure function: same graph in, same rings out.
pub fn detect_smurfing(graph: &TransactionGraph, config: &SmurfingConfig) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for center in graph.nodes() {
        for direction in [Direction::FanIn, Direction::FanOut] {
            let txns = direction_txns(graph, center, direction);
            if let Some(hit) = scan_window(&txns, config) {
                emit_ring(center, direction, hit, &mut output);
            }
        }
    }

    log::info!(
        "smurfing: {} rings across {} accounts",
        output.rings.len(),
        graph.node_count()
    );

    output
}

/// The account's transactions in one direction as (counterparty, time)
/// pairs, time-sorted with the counterparty id as tie-break so ordering
/// never depends on batch permutation.
fn direction_txns(
    graph: &TransactionGraph,
    center: &str,
    direction: Direction,
) -> Vec<(AccountId, NaiveDateTime)> {
    let neighbors = match direction {
        Direction::FanIn => graph.in_neighbors(center),
        Direction::FanOut => graph.out_neighbors(center),
    };

    let mut txns: Vec<(AccountId, NaiveDateTime)> = Vec::new();
    for counterparty in neighbors {
        let edge = match direction {
            Direction::FanIn => graph.edge(counterparty, center),
            Direction::FanOut => graph.edge(center, counterparty),
        };
        if let Some(edge) = edge {
            for ts in &edge.timestamps {
                txns.push((counterparty.clone(), *ts));
            }
        }
    }
    txns.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    txns
}

struct WindowHit {
    /// Unique counterparties of the triggering window, in time order.
    members: Vec<AccountId>,
    unique_count: usize,
    detected_at: NaiveDateTime,
}

/// Two-pointer sliding window over time-sorted transactions. Returns the
/// first window whose unique-counterparty count reaches the threshold.
fn scan_window(
    txns: &[(AccountId, NaiveDateTime)],
    config: &SmurfingConfig,
) -> Option<WindowHit> {
    // Detection floor and high-volume exclusion band.
    if txns.len() < config.fan_threshold || txns.len() >= config.exclusion_threshold {
        return None;
    }

    let window = Duration::hours(config.window_hours);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut start = 0;

    for (i, (counterparty, ts)) in txns.iter().enumerate() {
        *counts.entry(counterparty.as_str()).or_insert(0) += 1;

        while start < i && *ts - txns[start].1 > window {
            let leaving = txns[start].0.as_str();
            if let Some(n) = counts.get_mut(leaving) {
                *n -= 1;
                if *n == 0 {
                    counts.remove(leaving);
                }
            }
            start += 1;
        }

        if counts.len() >= config.fan_threshold {
            let mut members = Vec::new();
            for (cp, _) in &txns[start..=i] {
                if !members.contains(cp) {
                    members.push(cp.clone());
                }
            }
            return Some(WindowHit {
                members,
                unique_count: counts.len(),
                detected_at: *ts,
            });
        }
    }
    None
}

fn emit_ring(center: &str, direction: Direction, hit: WindowHit, output: &mut DetectorOutput) {
    let ring_id = direction.ring_id(center);
    let score = (BASE_SCORE + hit.unique_count as f64).min(100.0);

    log::warn!(
        "smurfing: {} on {center} — {} unique counterparties in window",
        direction.center_label(),
        hit.unique_count
    );

    // Members: counterparties feed the center (fan-in) or the center
    // feeds the counterparties (fan-out); list them in flow order.
    let member_accounts: Vec<AccountId> = match direction {
        Direction::FanIn => hit
            .members
            .iter()
            .cloned()
            .chain(std::iter::once(center.to_string()))
            .collect(),
        Direction::FanOut => std::iter::once(center.to_string())
            .chain(hit.members.iter().cloned())
            .collect(),
    };

    output.rings.push(FraudRing {
        ring_id: ring_id.clone(),
        member_accounts,
        pattern_type: direction.pattern_type(),
        risk_score: score,
        detected_at: Some(format_timestamp(hit.detected_at)),
    });

    output.accounts.push(SuspiciousAccount {
        account_id: center.to_string(),
        suspicion_score: score,
        detected_patterns: vec![direction.center_label().to_string()],
        ring_id: ring_id.clone(),
    });
    for member in &hit.members {
        output.accounts.push(SuspiciousAccount {
            account_id: member.clone(),
            suspicion_score: score,
            detected_patterns: vec![direction.member_label().to_string()],
            ring_id: ring_id.clone(),
        });
    }
}
