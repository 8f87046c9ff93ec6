//! Agent decision sources
//!
//! A single decision contract with interchangeable implementations: the
//! driver polls every agent through `DecisionSource` and never branches
//! on a concrete agent type. The rule-based variant is a deterministic
//! formula; the oracle variant wraps an injected async function (an LLM
//! call or any other external oracle).
//!
//! Decision calls are side-effect free with respect to market state:
//! an agent only ever returns a candidate decision, and the driver
//! validates whatever comes back before it reaches the book.

use async_trait::async_trait;

use crate::models::record::AgentRecord;
use crate::models::snapshot::MarketSnapshot;

pub mod oracle;
pub mod rule_based;

pub use oracle::FnOracle;
pub use rule_based::RuleBasedDecision;

/// What an agent wants to do this round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentDecision {
    /// Offer to buy `quantity` units at up to `price` each
    Bid { price: i64, quantity: i64 },

    /// Offer to sell `quantity` units at no less than `price` each
    Ask { price: i64, quantity: i64 },

    /// Sit the round out
    Abstain,
}

/// Opaque failure from a decision call; the driver degrades it to an
/// abstention and records a diagnostic.
pub type DecisionError = Box<dyn std::error::Error + Send + Sync>;

/// Capability to produce one decision per round.
///
/// Implementations receive the same pre-round snapshot as every other
/// agent plus their own full record (including the private valuation
/// or cost), and must return within the configured per-agent timeout.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(
        &self,
        snapshot: &MarketSnapshot,
        record: &AgentRecord,
    ) -> Result<AgentDecision, DecisionError>;
}
