//! Circular fund routing detector.
//!
//! Pipeline:
//!   1. Hub pruning — accounts whose degree exceeds
//!      `max(hub_degree_limit, floor(0.1 × node_count))` are assumed to be
//!      merchants or exchanges and excluded from the search.
//!   2. Simple-cycle enumeration, lengths 3–5, anchored at the
//!      lexicographically smallest member.
//!   3. CRS scoring — five weighted factors, each clamped to [0, 1].
//!
//! Zero-degree nodes are NOT pruned: a node with no inbound or no
//! outbound edge cannot sit on a directed cycle, so removing it changes
//! nothing the search can observe.

use std::collections::{HashMap, HashSet};

use crate::config::CycleConfig;
use crate::graph::TransactionGraph;
use crate::report::{clamp01, round2, DetectorOutput, FraudRing, PatternType, SuspiciousAccount};
use crate::types::{format_timestamp, AccountId};

// ── Constants ────────────────────────────────────────────────────────────────

const MIN_CYCLE_LEN: usize = 3;
const MAX_CYCLE_LEN: usize = 5;

/// CRS weights. Fixed by design — see config.rs for why these are not
/// configurable. They must sum to 1.
const W_LENGTH: f64 = 0.25;
const W_AMOUNT: f64 = 0.20;
const W_TIME: f64 = 0.20;
const W_FREQUENCY: f64 = 0.20;
const W_VOLUME: f64 = 0.15;

/// A cycle with more than this many repeat occurrences in the batch
/// saturates the frequency factor.
const FREQUENCY_SATURATION: f64 = 3.0;

/// An account whose best cycle scores above this is tagged high_velocity.
const HIGH_VELOCITY_SCORE: f64 = 85.0;

/// Accounts in more than this many cycles are flagged even when every
/// individual score is zero.
const HIGH_RISK_CYCLE_COUNT: usize = 3;

// ── Detector ─────────────────────────────────────────────────────────────────

/// Pure function: same graph in, same rings out.
pub fn detect_cycles(graph: &TransactionGraph, config: &CycleConfig) -> DetectorOutput {
    let pruned = hub_accounts(graph, config);
    let cycles = enumerate_cycles(graph, &pruned);

    log::info!(
        "circular: {} cycles (3-5 hops) after pruning {} hubs from {} accounts",
        cycles.len(),
        pruned.len(),
        graph.node_count()
    );

    // Occurrence count per canonical cycle. Enumeration is already
    // rotation-deduplicated, so within one batch every count is 1; the
    // factor then contributes a constant 1/3 of its weight, matching the
    // reference behavior. Kept as a real count so repeat tracking has a
    // seam to land in.
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for cycle in &cycles {
        *occurrences.entry(cycle.join("->")).or_insert(0) += 1;
    }

    let mut rings = Vec::with_capacity(cycles.len());
    let mut account_order: Vec<AccountId> = Vec::new();
    let mut account_entries: HashMap<AccountId, Vec<CycleEntry>> = HashMap::new();

    for (idx, cycle) in cycles.iter().enumerate() {
        let count = occurrences.get(&cycle.join("->")).copied().unwrap_or(1);
        let score = score_cycle(graph, cycle, count, config);
        let ring_id = format!("RING_{:03}", idx + 1);

        rings.push(FraudRing {
            ring_id: ring_id.clone(),
            member_accounts: cycle.clone(),
            pattern_type: PatternType::Cycle,
            risk_score: score,
            detected_at: completion_time(graph, cycle),
        });

        for account in cycle {
            let entries = account_entries.entry(account.clone()).or_insert_with(|| {
                account_order.push(account.clone());
                Vec::new()
            });
            entries.push(CycleEntry {
                score,
                ring_id: ring_id.clone(),
                cycle_len: cycle.len(),
            });
        }
    }

    let mut accounts = Vec::new();
    for account in &account_order {
        let entries = &account_entries[account];
        let max_score = entries.iter().map(|e| e.score).fold(0.0_f64, f64::max);

        if max_score <= 0.0 && entries.len() <= HIGH_RISK_CYCLE_COUNT {
            continue;
        }

        let mut patterns: Vec<String> = Vec::new();
        if entries.iter().any(|e| e.cycle_len == MIN_CYCLE_LEN) {
            patterns.push("cycle_length_3".to_string());
        }
        if entries.iter().any(|e| e.score > HIGH_VELOCITY_SCORE) {
            patterns.push("high_velocity".to_string());
        }
        patterns.sort();

        accounts.push(SuspiciousAccount {
            account_id: account.clone(),
            suspicion_score: round2(max_score),
            detected_patterns: patterns,
            ring_id: entries[0].ring_id.clone(),
        });
    }

    DetectorOutput { rings, accounts }
}

struct CycleEntry {
    score: f64,
    ring_id: String,
    cycle_len: usize,
}

// ── Pruning ──────────────────────────────────────────────────────────────────

fn hub_accounts(graph: &TransactionGraph, config: &CycleConfig) -> HashSet<AccountId> {
    let threshold = config
        .hub_degree_limit
        .max((config.hub_node_fraction * graph.node_count() as f64) as usize);

    let hubs: HashSet<AccountId> = graph
        .nodes()
        .iter()
        .filter(|id| {
            graph
                .stats(id)
                .map(|s| s.degree() as usize > threshold)
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    if !hubs.is_empty() {
        log::debug!(
            "circular: hub threshold {threshold}, pruned {} accounts",
            hubs.len()
        );
    }
    hubs
}

// ── Enumeration ──────────────────────────────────────────────────────────────

/// Enumerate simple directed cycles of length 3–5.
///
/// Uniqueness contract: a path may only extend to neighbors whose id
/// sorts strictly greater than the start account, so every cycle is
/// discovered exactly once, anchored at its lexicographically smallest
/// member. This depends on string ordering of account ids.
fn enumerate_cycles(graph: &TransactionGraph, pruned: &HashSet<AccountId>) -> Vec<Vec<AccountId>> {
    let mut starts: Vec<&AccountId> = graph
        .nodes()
        .iter()
        .filter(|id| !pruned.contains(*id))
        .collect();
    starts.sort();

    let mut cycles = Vec::new();
    for start in starts {
        let mut path = vec![start.clone()];
        let mut on_path: HashSet<AccountId> = HashSet::new();
        on_path.insert(start.clone());
        extend_path(graph, pruned, start, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn extend_path(
    graph: &TransactionGraph,
    pruned: &HashSet<AccountId>,
    start: &str,
    path: &mut Vec<AccountId>,
    on_path: &mut HashSet<AccountId>,
    cycles: &mut Vec<Vec<AccountId>>,
) {
    let current = path.last().cloned().unwrap_or_default();
    for next in graph.out_neighbors(&current) {
        if pruned.contains(next) {
            continue;
        }
        if next == start {
            if path.len() >= MIN_CYCLE_LEN {
                cycles.push(path.clone());
            }
            continue;
        }
        // Anchor rule: only walk into ids greater than the start.
        if next.as_str() <= start {
            continue;
        }
        if path.len() == MAX_CYCLE_LEN || on_path.contains(next) {
            continue;
        }
        path.push(next.clone());
        on_path.insert(next.clone());
        extend_path(graph, pruned, start, path, on_path, cycles);
        on_path.remove(next);
        path.pop();
    }
}

fn cycle_edges(cycle: &[AccountId]) -> Vec<(&AccountId, &AccountId)> {
    (0..cycle.len())
        .map(|i| (&cycle[i], &cycle[(i + 1) % cycle.len()]))
        .collect()
}

/// Timestamp of the last transaction that completes the cycle.
fn completion_time(graph: &TransactionGraph, cycle: &[AccountId]) -> Option<String> {
    cycle_edges(cycle)
        .iter()
        .filter_map(|(u, v)| graph.edge(u, v))
        .flat_map(|e| e.timestamps.iter())
        .max()
        .copied()
        .map(format_timestamp)
}

// ── CRS scoring ──────────────────────────────────────────────────────────────

/// Compute the Circular Routing Score for one cycle, in [0, 100] with
/// 2-decimal precision. A cycle outside the 3–5 length bound reaching
/// this point is a search-bound bug, not bad input.
fn score_cycle(
    graph: &TransactionGraph,
    cycle: &[AccountId],
    occurrence_count: usize,
    config: &CycleConfig,
) -> f64 {
    assert!(
        (MIN_CYCLE_LEN..=MAX_CYCLE_LEN).contains(&cycle.len()),
        "cycle of length {} escaped the search bounds",
        cycle.len()
    );

    let edges = cycle_edges(cycle);
    let raw = W_LENGTH * length_score(cycle.len())
        + W_AMOUNT * amount_similarity_score(graph, &edges)
        + W_TIME * time_score(graph, &edges, config.max_span_days)
        + W_FREQUENCY * frequency_score(occurrence_count)
        + W_VOLUME * volume_score(graph, cycle, &edges);

    round2(100.0 * clamp01(raw))
}

/// Shorter cycles score higher: 3 hops → 1.0, 5 hops → 1/3.
fn length_score(len: usize) -> f64 {
    clamp01((MAX_CYCLE_LEN - len + 1) as f64 / (MAX_CYCLE_LEN - MIN_CYCLE_LEN + 1) as f64)
}

/// 1 − stddev/mean over the per-edge average amounts. Uniform amounts
/// along the loop are the classic round-trip signature.
fn amount_similarity_score(graph: &TransactionGraph, edges: &[(&AccountId, &AccountId)]) -> f64 {
    let amounts: Vec<f64> = edges
        .iter()
        .filter_map(|(u, v)| graph.edge(u, v))
        .map(|e| e.avg_amount())
        .collect();

    if amounts.is_empty() {
        return 0.0;
    }
    if amounts.len() == 1 {
        return 1.0;
    }
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>()
        / (amounts.len() - 1) as f64;
    clamp01(1.0 - variance.sqrt() / mean)
}

/// 1 − span/horizon over every transaction timestamp on the cycle's
/// edges, floored at 0. Fewer than two timestamps is neutral (0.5).
fn time_score(
    graph: &TransactionGraph,
    edges: &[(&AccountId, &AccountId)],
    max_span_days: i64,
) -> f64 {
    let timestamps: Vec<_> = edges
        .iter()
        .filter_map(|(u, v)| graph.edge(u, v))
        .flat_map(|e| e.timestamps.iter())
        .collect();

    if timestamps.len() < 2 {
        return 0.5;
    }
    let min = timestamps.iter().min().copied().copied().unwrap_or_default();
    let max = timestamps.iter().max().copied().copied().unwrap_or_default();
    let span = (max - min).num_seconds() as f64;
    let horizon = (max_span_days * 24 * 3600) as f64;
    clamp01(1.0 - span / horizon)
}

fn frequency_score(occurrence_count: usize) -> f64 {
    clamp01(occurrence_count as f64 / FREQUENCY_SATURATION)
}

/// Cycle's routed volume relative to its members' total outbound volume.
fn volume_score(
    graph: &TransactionGraph,
    cycle: &[AccountId],
    edges: &[(&AccountId, &AccountId)],
) -> f64 {
    let cycle_volume: f64 = edges
        .iter()
        .filter_map(|(u, v)| graph.edge(u, v))
        .map(|e| e.total_amount)
        .sum();

    let total_outgoing: f64 = cycle
        .iter()
        .filter_map(|id| graph.stats(id))
        .map(|s| s.total_outbound)
        .sum();

    if total_outgoing == 0.0 {
        return 0.0;
    }
    clamp01(cycle_volume / total_outgoing)
}
