//! Market snapshot
//!
//! The immutable, point-in-time view handed to agents during order
//! collection and to external consumers (UI, reporting) after each
//! round. A snapshot is a deep copy: holding one never observes later
//! mutations of the live state, and nothing in it can reach back into
//! the engine.
//!
//! Per-agent records expose only public state (role, funds, inventory);
//! valuations and costs never leave the engine through a snapshot.

use serde::{Deserialize, Serialize};

use crate::events::Diagnostic;
use crate::models::order::Order;
use crate::models::record::Role;
use crate::models::state::PricePoint;
use crate::models::transaction::Transaction;

/// Publicly visible slice of one agent's record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAgentRecord {
    pub agent_id: String,
    pub role: Role,
    pub funds: i64,
    pub inventory: i64,
}

/// Read-only view of the market after a settled round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Last settled round (0 before the first round)
    pub round: usize,

    /// Bids submitted in the most recent round
    pub open_bids: Vec<Order>,

    /// Asks submitted in the most recent round
    pub open_asks: Vec<Order>,

    /// All trades so far, in chronological order
    pub transaction_log: Vec<Transaction>,

    /// Per-round clearing prices and volumes
    pub price_history: Vec<PricePoint>,

    /// Public per-agent state, sorted by agent ID
    pub agents: Vec<PublicAgentRecord>,

    /// Recoverable errors recorded during the most recent round
    /// (invalid orders, timeouts, oracle failures)
    pub diagnostics: Vec<Diagnostic>,
}

impl MarketSnapshot {
    /// Most recent traded price, carrying past no-trade rounds
    pub fn last_traded_price(&self) -> Option<i64> {
        self.price_history.iter().rev().find_map(|p| p.price)
    }

    /// Highest-priced bid of the most recent round
    pub fn best_bid(&self) -> Option<&Order> {
        self.open_bids.iter().max_by_key(|o| o.price())
    }

    /// Lowest-priced ask of the most recent round
    pub fn best_ask(&self) -> Option<&Order> {
        self.open_asks.iter().min_by_key(|o| o.price())
    }

    /// Trades cleared in the given round
    pub fn transactions_in_round(&self, round: usize) -> impl Iterator<Item = &Transaction> {
        self.transaction_log.iter().filter(move |t| t.round() == round)
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<&PublicAgentRecord> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }
}
