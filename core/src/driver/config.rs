//! Simulation configuration
//!
//! All parameters for one run: round count, the ordered agent roster,
//! price scale, per-agent decision timeout and halt conditions.
//! Deserializable from JSON (durations as milliseconds, money in minor
//! units) and validated in full before a run starts; a bad config
//! means the run never begins.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::engine::SimulationError;
use crate::models::record::Role;

fn default_price_precision() -> u32 {
    2
}

fn default_timeout_ms() -> u64 {
    // Generous default: covers network latency of LLM-backed oracles.
    30_000
}

/// Sanity band for submitted prices, inclusive on both ends.
/// Submissions outside the band degrade to abstentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: i64,
    pub max: i64,
}

impl PriceBand {
    pub fn contains(&self, price: i64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

/// Decision source selection for an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionConfig {
    /// Deterministic formula agent; `factor` defaults by role
    /// (0.90 for buyers, 1.10 for sellers)
    RuleBased { factor: Option<f64> },

    /// Externally injected decision source; one must be registered
    /// with the driver before the run starts
    Oracle,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig::RuleBased { factor: None }
    }
}

/// Initial state and behavior for a single agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    /// Unique agent identifier
    pub id: String,

    /// Buyer or seller
    pub role: Role,

    /// Opening funds in minor units
    #[serde(default)]
    pub funds: i64,

    /// Opening inventory in units of the good
    #[serde(default)]
    pub inventory: i64,

    /// Buyer valuation or seller unit cost in minor units
    pub valuation_or_cost: i64,

    /// Which decision source drives this agent
    #[serde(default)]
    pub decision: DecisionConfig,
}

impl AgentSeed {
    /// Rule-based buyer seed: funds to spend, private valuation
    pub fn buyer(id: impl Into<String>, funds: i64, valuation: i64) -> Self {
        Self {
            id: id.into(),
            role: Role::Buyer,
            funds,
            inventory: 0,
            valuation_or_cost: valuation,
            decision: DecisionConfig::default(),
        }
    }

    /// Rule-based seller seed: inventory to sell, private unit cost
    pub fn seller(id: impl Into<String>, inventory: i64, cost: i64) -> Self {
        Self {
            id: id.into(),
            role: Role::Seller,
            funds: 0,
            inventory,
            valuation_or_cost: cost,
            decision: DecisionConfig::default(),
        }
    }

    /// Switch the seed to an externally registered oracle
    pub fn with_oracle(mut self) -> Self {
        self.decision = DecisionConfig::Oracle;
        self
    }

    /// Override the rule-based factor
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.decision = DecisionConfig::RuleBased {
            factor: Some(factor),
        };
        self
    }
}

/// Build a roster of identical rule-based buyers and sellers, with
/// ids `buyer_1..buyer_N` and `seller_1..seller_M`
pub fn uniform_roster(
    num_buyers: usize,
    funds: i64,
    valuation: i64,
    num_sellers: usize,
    inventory: i64,
    cost: i64,
) -> Vec<AgentSeed> {
    let buyers = (1..=num_buyers).map(|i| AgentSeed::buyer(format!("buyer_{i}"), funds, valuation));
    let sellers =
        (1..=num_sellers).map(|i| AgentSeed::seller(format!("seller_{i}"), inventory, cost));
    buyers.chain(sellers).collect()
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of rounds to simulate
    pub num_rounds: usize,

    /// Ordered agent roster; roster order is submission order
    pub agent_roster: Vec<AgentSeed>,

    /// Decimal scale of prices: minor units per whole = 10^precision.
    /// The engine works purely in minor units; this is the boundary
    /// contract with configuration and presentation layers.
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,

    /// Per-agent decision deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub per_agent_timeout_ms: u64,

    /// Halt after this many consecutive rounds with zero submitted
    /// orders (0 = disabled)
    #[serde(default)]
    pub halt_after_idle_rounds: usize,

    /// Optional sanity band for submitted prices
    #[serde(default)]
    pub price_band: Option<PriceBand>,
}

impl SimulationConfig {
    /// Minimal config over a roster, with defaults elsewhere
    pub fn new(num_rounds: usize, agent_roster: Vec<AgentSeed>) -> Self {
        Self {
            num_rounds,
            agent_roster,
            price_precision: default_price_precision(),
            per_agent_timeout_ms: default_timeout_ms(),
            halt_after_idle_rounds: 0,
            price_band: None,
        }
    }

    pub fn per_agent_timeout(&self) -> Duration {
        Duration::from_millis(self.per_agent_timeout_ms)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.num_rounds == 0 {
            return Err(SimulationError::InvalidConfig(
                "num_rounds must be > 0".to_string(),
            ));
        }

        if self.agent_roster.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "must have at least one agent".to_string(),
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for seed in &self.agent_roster {
            if !ids.insert(&seed.id) {
                return Err(SimulationError::InvalidConfig(format!(
                    "duplicate agent ID: {}",
                    seed.id
                )));
            }

            if seed.valuation_or_cost <= 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "agent {}: valuation_or_cost must be > 0",
                    seed.id
                )));
            }
            if seed.funds < 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "agent {}: funds must be >= 0",
                    seed.id
                )));
            }
            if seed.inventory < 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "agent {}: inventory must be >= 0",
                    seed.id
                )));
            }
            if let DecisionConfig::RuleBased {
                factor: Some(factor),
            } = seed.decision
            {
                if factor <= 0.0 || !factor.is_finite() {
                    return Err(SimulationError::InvalidConfig(format!(
                        "agent {}: rule-based factor must be positive and finite",
                        seed.id
                    )));
                }
            }
        }

        if let Some(band) = &self.price_band {
            if band.min <= 0 || band.min > band.max {
                return Err(SimulationError::InvalidConfig(
                    "price_band requires 0 < min <= max".to_string(),
                ));
            }
        }

        Ok(())
    }
}
