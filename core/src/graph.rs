//! Transaction graph builder — the shared substrate for all detectors.
//!
//! One linear pass over the batch produces:
//!   - directed adjacency and reverse adjacency (insertion-ordered)
//!   - one aggregate per ordered (sender, receiver) pair
//!   - per-account degree / transaction counters and outbound volume
//!
//! Construction is O(V + E). Records with an empty endpoint, a self-loop,
//! a negative or non-finite amount, or an unparseable timestamp are
//! skipped without error — bad input is the collaborator's problem, not
//! the engine's.
//!
//! Iteration order everywhere is first-seen order, never hash order: the
//! detectors' tie-breaking (first window hit, first cycle found) must be
//! reproducible from the batch alone.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

use crate::types::{parse_timestamp, AccountId, TransactionRecord};

/// All transactions between one ordered account pair, collapsed.
#[derive(Debug, Clone, Default)]
pub struct EdgeAggregate {
    pub count: u64,
    pub total_amount: f64,
    /// One entry per underlying transaction, in batch order.
    pub timestamps: Vec<NaiveDateTime>,
}

impl EdgeAggregate {
    pub fn avg_amount(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_amount / self.count as f64
        }
    }
}

/// Per-account counters derived during construction.
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    /// Transaction instance counts.
    pub txns_in: u64,
    pub txns_out: u64,
    /// Distinct-edge counts (one per counterparty per direction).
    pub edges_in: u64,
    pub edges_out: u64,
    /// Cumulative outbound amount.
    pub total_outbound: f64,
}

impl NodeStats {
    /// Total transaction count, in + out.
    pub fn total_txns(&self) -> u64 {
        self.txns_in + self.txns_out
    }

    /// Distinct-edge degree, in + out. Hub pruning and endpoint damping
    /// both use this, not the instance count.
    pub fn degree(&self) -> u64 {
        self.edges_in + self.edges_out
    }
}

#[derive(Debug, Default)]
pub struct TransactionGraph {
    nodes: Vec<AccountId>,
    stats: HashMap<AccountId, NodeStats>,
    out_adj: HashMap<AccountId, Vec<AccountId>>,
    in_adj: HashMap<AccountId, Vec<AccountId>>,
    /// sender -> receiver -> aggregate.
    edges: HashMap<AccountId, HashMap<AccountId, EdgeAggregate>>,
    /// Every non-empty endpoint id in the batch, skipped records included.
    seen_accounts: HashSet<AccountId>,
    edge_total: usize,
    skipped: usize,
}

impl TransactionGraph {
    /// Build the graph in one pass. Never fails: malformed records are
    /// counted and dropped.
    pub fn build(records: &[TransactionRecord]) -> Self {
        let mut graph = Self::default();

        for record in records {
            let sender = record.sender.trim();
            let receiver = record.receiver.trim();

            // The account census counts every id the batch mentions, even
            // on records the graph rejects below.
            for endpoint in [sender, receiver] {
                if !endpoint.is_empty() && !graph.seen_accounts.contains(endpoint) {
                    graph.seen_accounts.insert(endpoint.to_string());
                }
            }

            if sender.is_empty() || receiver.is_empty() || sender == receiver {
                graph.skipped += 1;
                continue;
            }
            if !record.amount.is_finite() || record.amount < 0.0 {
                graph.skipped += 1;
                continue;
            }
            let ts = match parse_timestamp(&record.timestamp) {
                Some(ts) => ts,
                None => {
                    graph.skipped += 1;
                    continue;
                }
            };

            graph.add_transaction(sender, receiver, record.amount, ts);
        }

        log::debug!(
            "graph built: {} accounts, {} edges, {} records skipped",
            graph.nodes.len(),
            graph.edge_total,
            graph.skipped
        );

        graph
    }

    fn add_transaction(&mut self, sender: &str, receiver: &str, amount: f64, ts: NaiveDateTime) {
        self.touch_node(sender);
        self.touch_node(receiver);

        let pair_map = self.edges.entry(sender.to_string()).or_default();
        if !pair_map.contains_key(receiver) {
            // First transaction on this ordered pair: register the edge.
            pair_map.insert(receiver.to_string(), EdgeAggregate::default());
            self.edge_total += 1;
            if let Some(adj) = self.out_adj.get_mut(sender) {
                adj.push(receiver.to_string());
            }
            if let Some(adj) = self.in_adj.get_mut(receiver) {
                adj.push(sender.to_string());
            }
            if let Some(s) = self.stats.get_mut(sender) {
                s.edges_out += 1;
            }
            if let Some(s) = self.stats.get_mut(receiver) {
                s.edges_in += 1;
            }
        }

        if let Some(edge) = self
            .edges
            .get_mut(sender)
            .and_then(|m| m.get_mut(receiver))
        {
            edge.count += 1;
            edge.total_amount += amount;
            edge.timestamps.push(ts);
        }

        if let Some(s) = self.stats.get_mut(sender) {
            s.txns_out += 1;
            s.total_outbound += amount;
        }
        if let Some(s) = self.stats.get_mut(receiver) {
            s.txns_in += 1;
        }
    }

    fn touch_node(&mut self, id: &str) {
        if !self.stats.contains_key(id) {
            self.nodes.push(id.to_string());
            self.stats.insert(id.to_string(), NodeStats::default());
            self.out_adj.insert(id.to_string(), Vec::new());
            self.in_adj.insert(id.to_string(), Vec::new());
        }
    }

    /// Accounts in first-seen order.
    pub fn nodes(&self) -> &[AccountId] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn stats(&self, id: &str) -> Option<&NodeStats> {
        self.stats.get(id)
    }

    /// Distinct receivers of `id`, in first-transaction order.
    pub fn out_neighbors(&self, id: &str) -> &[AccountId] {
        self.out_adj.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct senders to `id`, in first-transaction order.
    pub fn in_neighbors(&self, id: &str) -> &[AccountId] {
        self.in_adj.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge(&self, sender: &str, receiver: &str) -> Option<&EdgeAggregate> {
        self.edges.get(sender).and_then(|m| m.get(receiver))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_total
    }

    /// Distinct counterparties of `id` across both directions.
    pub fn counterparty_count(&self, id: &str) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        for n in self.out_neighbors(id) {
            seen.insert(n.as_str());
        }
        for n in self.in_neighbors(id) {
            seen.insert(n.as_str());
        }
        seen.len()
    }

    /// Distinct account ids mentioned anywhere in the batch. Unlike
    /// `node_count`, this includes accounts that only appear on skipped
    /// records (self-loops, bad amounts, bad timestamps).
    pub fn accounts_seen(&self) -> usize {
        self.seen_accounts.len()
    }

    /// Records dropped during construction (malformed or self-loop).
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }
}
