//! Engine configuration.
//!
//! Every threshold a deployment might reasonably tune lives here, with
//! defaults matching the production values. The CRS weights are NOT
//! configurable: they define the meaning of the score, and changing them
//! silently would make scores incomparable across runs. They live as
//! constants next to the scorer in `circular.rs`.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Thresholds for the circular fund routing detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum hub degree; the effective threshold is
    /// `max(hub_degree_limit, floor(hub_node_fraction * node_count))`.
    pub hub_degree_limit: usize,
    /// Fraction of the node count contributing to the hub threshold.
    pub hub_node_fraction: f64,
    /// Time-coherence horizon: a cycle whose edge timestamps span this
    /// many days or more scores 0 on the time factor.
    pub max_span_days: i64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            hub_degree_limit: 20,
            hub_node_fraction: 0.1,
            max_span_days: 7,
        }
    }
}

/// Thresholds for the smurfing (fan-in / fan-out) detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmurfingConfig {
    /// Unique counterparties within the window required to flag.
    pub fan_threshold: usize,
    /// Accounts with this many or more transactions in a direction are
    /// presumed legitimate high-volume parties and skipped.
    pub exclusion_threshold: usize,
    /// Sliding window width in hours.
    pub window_hours: i64,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            fan_threshold: 10,
            exclusion_threshold: 20,
            window_hours: 72,
        }
    }
}

/// Thresholds for the layered shell-chain detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Inclusive total-transaction-count band that classifies a shell.
    pub shell_min_txns: u64,
    pub shell_max_txns: u64,
    /// Chain length bounds in hops.
    pub min_hops: usize,
    pub max_hops: usize,
    /// Time-decay horizon in days for the chain span.
    pub span_days: i64,
    /// Endpoint degree above which the log10 damping applies.
    pub endpoint_degree_limit: u64,
    /// Fast-path floors: fewer accounts / shells than this yield no rings.
    pub min_accounts: usize,
    pub min_shells: usize,
    /// Below this many total accounts the score ramps down linearly.
    pub small_dataset_floor: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell_min_txns: 2,
            shell_max_txns: 3,
            min_hops: 3,
            max_hops: 5,
            span_days: 30,
            endpoint_degree_limit: 20,
            min_accounts: 3,
            min_shells: 2,
            small_dataset_floor: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cycle: CycleConfig,
    pub smurfing: SmurfingConfig,
    pub shell: ShellConfig,
}

impl EngineConfig {
    /// Load overrides from a JSON file. Missing sections and fields fall
    /// back to the defaults above.
    pub fn load(path: &str) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {path}: {e}")))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break detector invariants.
    pub fn validate(&self) -> EngineResult<()> {
        if self.smurfing.fan_threshold == 0 {
            return Err(EngineError::Config(
                "smurfing.fan_threshold must be at least 1".into(),
            ));
        }
        if self.smurfing.exclusion_threshold <= self.smurfing.fan_threshold {
            return Err(EngineError::Config(format!(
                "smurfing.exclusion_threshold ({}) must exceed fan_threshold ({})",
                self.smurfing.exclusion_threshold, self.smurfing.fan_threshold
            )));
        }
        if self.shell.min_hops < 1 || self.shell.max_hops < self.shell.min_hops {
            return Err(EngineError::Config(format!(
                "shell hop bounds invalid: min {} max {}",
                self.shell.min_hops, self.shell.max_hops
            )));
        }
        if self.shell.shell_max_txns < self.shell.shell_min_txns {
            return Err(EngineError::Config(format!(
                "shell transaction band invalid: min {} max {}",
                self.shell.shell_min_txns, self.shell.shell_max_txns
            )));
        }
        Ok(())
    }
}
