//! Layered shell-chain detector.
//!
//! Pipeline:
//!   1. Classify shells: accounts with 2–3 total transactions.
//!   2. From every account adjacent to a shell, search chains of 3–5 hops
//!      whose interior nodes are all shells and whose end is a non-shell.
//!   3. Validate each chain by picking a monotonically non-decreasing
//!      transaction timestamp per hop; reject chains the money could not
//!      actually have traversed in order.
//!   4. Score: length weight, time decay, intermediary concentration,
//!      endpoint-degree and small-dataset damping.
//!   5. Merge chains sharing an intermediate shell into one ring via
//!      union-find.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

use crate::config::ShellConfig;
use crate::graph::TransactionGraph;
use crate::report::{round2, DetectorOutput, FraudRing, PatternType, SuspiciousAccount};
use crate::types::{format_timestamp, AccountId};

// ── Constants ────────────────────────────────────────────────────────────────

/// Chain score weights. Shell status is a constant factor: every chain
/// reaching the scorer already passed the shell-interior constraint.
const W_LENGTH: f64 = 0.25;
const W_SHELL_STATUS: f64 = 0.35;
const W_TIME: f64 = 0.25;
const W_CONCENTRATION: f64 = 0.15;

// ── Detector ─────────────────────────────────────────────────────────────────

/// Pure function: same graph in, same rings out.
pub fn detect_shell_networks(graph: &TransactionGraph, config: &ShellConfig) -> DetectorOutput {
    if graph.node_count() < config.min_accounts {
        return DetectorOutput::default();
    }

    let shells = classify_shells(graph, config);
    if shells.len() < config.min_shells {
        return DetectorOutput::default();
    }

    let chains = find_chains(graph, &shells, config);
    log::info!(
        "shell: {} shells, {} validated chains",
        shells.len(),
        chains.len()
    );
    if chains.is_empty() {
        return DetectorOutput::default();
    }

    cluster_chains(&chains)
}

/// An account is a shell iff its total transaction count sits in the
/// configured band (2–3 by default).
fn classify_shells(graph: &TransactionGraph, config: &ShellConfig) -> HashSet<AccountId> {
    graph
        .nodes()
        .iter()
        .filter(|id| {
            graph
                .stats(id)
                .map(|s| {
                    (config.shell_min_txns..=config.shell_max_txns).contains(&s.total_txns())
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

// ── Path search ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Chain {
    nodes: Vec<AccountId>,
    /// Chosen per-hop timestamps, monotonically non-decreasing.
    timestamps: Vec<NaiveDateTime>,
    score: f64,
}

/// Depth-bounded DFS through shell interiors. A chain may end at a
/// non-shell neighbor only once at least `min_hops` edges have been
/// traversed. Distinct node sequences are recorded once.
fn find_chains(
    graph: &TransactionGraph,
    shells: &HashSet<AccountId>,
    config: &ShellConfig,
) -> Vec<Chain> {
    let mut chains = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for start in graph.nodes() {
        let touches_shell = graph
            .out_neighbors(start)
            .iter()
            .any(|n| shells.contains(n));
        if !touches_shell {
            continue;
        }

        let mut path = vec![start.clone()];
        let mut on_path: HashSet<AccountId> = HashSet::new();
        on_path.insert(start.clone());
        walk(
            graph, shells, config, &mut path, &mut on_path, &mut seen, &mut chains,
        );
    }

    chains
}

fn walk(
    graph: &TransactionGraph,
    shells: &HashSet<AccountId>,
    config: &ShellConfig,
    path: &mut Vec<AccountId>,
    on_path: &mut HashSet<AccountId>,
    seen: &mut HashSet<String>,
    chains: &mut Vec<Chain>,
) {
    let hops = path.len() - 1;
    if hops >= config.max_hops {
        return;
    }

    let current = path.last().cloned().unwrap_or_default();
    for next in graph.out_neighbors(&current) {
        if on_path.contains(next) {
            continue;
        }
        if shells.contains(next) {
            path.push(next.clone());
            on_path.insert(next.clone());
            walk(graph, shells, config, path, on_path, seen, chains);
            on_path.remove(next);
            path.pop();
        } else if hops + 1 >= config.min_hops {
            // Chain end: a non-shell destination after enough layering.
            let mut nodes = path.clone();
            nodes.push(next.clone());
            let signature = nodes.join("->");
            if !seen.insert(signature) {
                continue;
            }
            if let Some(chain) = validate_chain(graph, nodes, config) {
                chains.push(chain);
            }
        }
    }
}

// ── Validation & scoring ─────────────────────────────────────────────────────

/// Pick the earliest transaction per hop that does not move backwards in
/// time. A chain with no such assignment cannot represent money actually
/// flowing through the layers and is dropped.
fn validate_chain(
    graph: &TransactionGraph,
    nodes: Vec<AccountId>,
    config: &ShellConfig,
) -> Option<Chain> {
    let mut timestamps = Vec::with_capacity(nodes.len() - 1);
    let mut prev: Option<NaiveDateTime> = None;

    for pair in nodes.windows(2) {
        let edge = graph.edge(&pair[0], &pair[1])?;
        let chosen = edge
            .timestamps
            .iter()
            .filter(|ts| prev.map_or(true, |p| **ts >= p))
            .min()
            .copied()?;
        timestamps.push(chosen);
        prev = Some(chosen);
    }

    let score = score_chain(graph, &nodes, &timestamps, config);
    Some(Chain {
        nodes,
        timestamps,
        score,
    })
}

fn score_chain(
    graph: &TransactionGraph,
    nodes: &[AccountId],
    timestamps: &[NaiveDateTime],
    config: &ShellConfig,
) -> f64 {
    let hops = nodes.len() - 1;
    assert!(
        (config.min_hops..=config.max_hops).contains(&hops),
        "chain of {hops} hops escaped the search bounds"
    );

    // Narrowly-used intermediaries concentrate the flow: mean of
    // 1/counterparty_count across the interior shells.
    let interior = &nodes[1..nodes.len() - 1];
    let concentration = if interior.is_empty() {
        0.0
    } else {
        interior
            .iter()
            .map(|id| 1.0 / graph.counterparty_count(id).max(1) as f64)
            .sum::<f64>()
            / interior.len() as f64
    };

    let length_weight = match hops {
        3 => 0.50,
        4 => 0.67,
        5 => 1.00,
        // Non-default hop bounds fall back to a linear ramp.
        _ => (hops as f64 / config.max_hops as f64).min(1.0),
    };

    let span = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*last - *first).num_seconds() as f64,
        _ => 0.0,
    };
    let horizon = (config.span_days * 24 * 3600) as f64;
    let time_weight = 1.0 - (span / horizon).min(1.0);

    let raw = 100.0
        * (W_LENGTH * length_weight
            + W_SHELL_STATUS * 1.0
            + W_TIME * time_weight
            + W_CONCENTRATION * concentration);

    // Tiny datasets make every account look narrowly used; ramp the
    // score down linearly below the floor.
    let dataset_penalty = if graph.node_count() < config.small_dataset_floor {
        graph.node_count() as f64 / config.small_dataset_floor as f64
    } else {
        1.0
    };

    // High-degree endpoints are likelier to be ordinary busy accounts
    // than laundering termini; damp logarithmically.
    let mut degree_penalty = 1.0;
    for endpoint in [&nodes[0], &nodes[nodes.len() - 1]] {
        if let Some(stats) = graph.stats(endpoint) {
            let degree = stats.degree();
            if degree > config.endpoint_degree_limit {
                let ratio = degree as f64 / config.endpoint_degree_limit as f64;
                degree_penalty *= 1.0 / (1.0 + ratio.log10());
            }
        }
    }

    round2((raw * dataset_penalty * degree_penalty).clamp(0.0, 100.0))
}

// ── Clustering ───────────────────────────────────────────────────────────────

/// Merge chains whose intermediate-shell sets intersect. One merged
/// cluster becomes one `SHELL_###` ring: members are the union in
/// first-appearance order, the score is the max chain score, and
/// detected_at is the latest chosen transaction timestamp.
fn cluster_chains(chains: &[Chain]) -> DetectorOutput {
    let mut uf = UnionFind::new(chains.len());
    let mut owner_by_shell: HashMap<&str, usize> = HashMap::new();

    for (idx, chain) in chains.iter().enumerate() {
        for shell in &chain.nodes[1..chain.nodes.len() - 1] {
            match owner_by_shell.get(shell.as_str()) {
                Some(&other) => uf.union(idx, other),
                None => {
                    owner_by_shell.insert(shell.as_str(), idx);
                }
            }
        }
    }

    // Group chains by root, preserving chain discovery order.
    let mut cluster_order: Vec<usize> = Vec::new();
    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..chains.len() {
        let root = uf.find(idx);
        clusters.entry(root).or_insert_with(|| {
            cluster_order.push(root);
            Vec::new()
        });
        if let Some(members) = clusters.get_mut(&root) {
            members.push(idx);
        }
    }

    let mut output = DetectorOutput::default();

    for (ring_idx, root) in cluster_order.iter().enumerate() {
        let chain_indices = &clusters[root];
        let ring_id = format!("SHELL_{:03}", ring_idx + 1);

        let mut member_accounts: Vec<AccountId> = Vec::new();
        let mut best_by_account: HashMap<AccountId, f64> = HashMap::new();
        let mut ring_score = 0.0_f64;
        let mut detected_at: Option<NaiveDateTime> = None;

        for &ci in chain_indices {
            let chain = &chains[ci];
            ring_score = ring_score.max(chain.score);
            if let Some(last) = chain.timestamps.iter().max() {
                detected_at = Some(detected_at.map_or(*last, |d| d.max(*last)));
            }
            for node in &chain.nodes {
                if !member_accounts.contains(node) {
                    member_accounts.push(node.clone());
                }
                let best = best_by_account.entry(node.clone()).or_insert(0.0);
                *best = best.max(chain.score);
            }
        }

        for account in &member_accounts {
            output.accounts.push(SuspiciousAccount {
                account_id: account.clone(),
                suspicion_score: best_by_account[account],
                detected_patterns: vec!["shell_network".to_string()],
                ring_id: ring_id.clone(),
            });
        }

        output.rings.push(FraudRing {
            ring_id,
            member_accounts,
            pattern_type: PatternType::ShellNetwork,
            risk_score: ring_score,
            detected_at: detected_at.map(format_timestamp),
        });
    }

    output
}

// ── Union-find ───────────────────────────────────────────────────────────────

/// Disjoint-set forest with path compression and union by rank; merge
/// cost is effectively linear in the number of chains.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
