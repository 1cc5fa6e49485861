//! ringtrace-core — the laundering-pattern detection engine.
//!
//! Takes a bounded batch of financial transactions and flags accounts and
//! groups of accounts ("rings") exhibiting money-laundering topologies:
//!   1. Circular fund routing (simple-cycle enumeration + CRS scoring)
//!   2. Smurfing (fan-in / fan-out aggregation over a 72-hour window)
//!   3. Layered shell chains (constrained path search + cluster merging)
//!
//! RULES:
//!   - Detectors are pure functions over a shared immutable graph.
//!   - No detector reads another detector's output.
//!   - No randomness anywhere in the engine: same batch, same report.
//!   - Malformed records are dropped at graph construction, never surfaced.

pub mod circular;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod report;
pub mod shell;
pub mod smurfing;
pub mod types;
