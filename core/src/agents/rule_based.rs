//! Rule-based decision source
//!
//! Deterministic pure function of the agent's own record: a buyer bids
//! a fixed fraction of its valuation while it can fund one unit; a
//! seller asks a fixed markup over its unit cost while it holds
//! inventory; otherwise it abstains. Quantity is always one unit.

use async_trait::async_trait;

use crate::agents::{AgentDecision, DecisionError, DecisionSource};
use crate::models::record::{AgentRecord, Role};
use crate::models::snapshot::MarketSnapshot;

/// Default buyer aggressiveness: bid at 90% of valuation
pub const DEFAULT_BUYER_FACTOR: f64 = 0.90;

/// Default seller markup: ask at 110% of cost
pub const DEFAULT_SELLER_FACTOR: f64 = 1.10;

/// Deterministic formula agent
#[derive(Debug, Clone)]
pub struct RuleBasedDecision {
    /// Multiplier applied to valuation (buyer) or cost (seller)
    factor: f64,
}

impl RuleBasedDecision {
    /// Build with an explicit factor, or the role's default
    ///
    /// # Panics
    /// Panics if the factor is not positive.
    pub fn new(role: Role, factor: Option<f64>) -> Self {
        let factor = factor.unwrap_or(match role {
            Role::Buyer => DEFAULT_BUYER_FACTOR,
            Role::Seller => DEFAULT_SELLER_FACTOR,
        });
        assert!(factor > 0.0, "factor must be positive");
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }
}

#[async_trait]
impl DecisionSource for RuleBasedDecision {
    async fn decide(
        &self,
        _snapshot: &MarketSnapshot,
        record: &AgentRecord,
    ) -> Result<AgentDecision, DecisionError> {
        let price = (record.valuation_or_cost() as f64 * self.factor).round() as i64;
        if price <= 0 {
            return Ok(AgentDecision::Abstain);
        }

        let decision = match record.role() {
            Role::Buyer if record.can_afford(price) => AgentDecision::Bid { price, quantity: 1 },
            Role::Seller if record.inventory() >= 1 => AgentDecision::Ask { price, quantity: 1 },
            _ => AgentDecision::Abstain,
        };

        Ok(decision)
    }
}
