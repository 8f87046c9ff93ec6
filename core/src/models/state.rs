//! Market state
//!
//! The single live, mutable aggregate for a simulation run: round
//! counter, agent ledger, the current round's open orders, the
//! append-only transaction log and the per-round price history.
//!
//! Exactly one instance exists per run, owned by the simulation driver.
//! Agents and external consumers never see this type; they receive
//! immutable `MarketSnapshot` copies, which rules out lookahead and
//! read/write races by construction.
//!
//! # Critical Invariants
//!
//! 1. **Funds conservation**: the sum of all agent funds is constant
//!    across settlement (trades move money, never create it)
//! 2. **Inventory conservation**: the sum of all inventories is constant
//! 3. **Monotonic history**: transaction_log and price_history only grow
//! 4. **Fresh book each round**: open orders are replaced, never carried
//!    over from a previous round

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::Diagnostic;
use crate::models::order::Order;
use crate::models::record::AgentRecord;
use crate::models::snapshot::{MarketSnapshot, PublicAgentRecord};
use crate::models::transaction::Transaction;

/// One entry in the per-round price history
///
/// `price` is the round's volume-weighted clearing price in minor
/// units, or `None` when the round produced no trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Round this point describes
    pub round: usize,

    /// Volume-weighted clearing price, None = no trade
    pub price: Option<i64>,

    /// Units traded this round
    pub volume: i64,

    /// Number of transactions this round
    pub num_transactions: usize,
}

/// Complete mutable market state for one simulation run
#[derive(Debug, Clone)]
pub struct MarketState {
    /// Last fully settled round (0 before the first round settles)
    round: usize,

    /// All agent ledger entries, indexed by agent ID
    agent_records: HashMap<String, AgentRecord>,

    /// Bids submitted in the most recent round
    open_bids: Vec<Order>,

    /// Asks submitted in the most recent round
    open_asks: Vec<Order>,

    /// Append-only log of all cleared trades
    transaction_log: Vec<Transaction>,

    /// One entry per settled round
    price_history: Vec<PricePoint>,
}

impl MarketState {
    /// Create a new state from initial agent records
    ///
    /// # Panics
    /// Panics on duplicate agent IDs; the driver validates the roster
    /// before building state.
    pub fn new(records: Vec<AgentRecord>) -> Self {
        let mut agent_records = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.agent_id().to_string();
            let previous = agent_records.insert(id.clone(), record);
            assert!(previous.is_none(), "duplicate agent ID {}", id);
        }

        Self {
            round: 0,
            agent_records,
            open_bids: Vec::new(),
            open_asks: Vec::new(),
            transaction_log: Vec::new(),
            price_history: Vec::new(),
        }
    }

    /// Last fully settled round
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn get_record(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agent_records.get(agent_id)
    }

    pub fn get_record_mut(&mut self, agent_id: &str) -> Option<&mut AgentRecord> {
        self.agent_records.get_mut(agent_id)
    }

    pub fn agent_records(&self) -> &HashMap<String, AgentRecord> {
        &self.agent_records
    }

    pub fn num_agents(&self) -> usize {
        self.agent_records.len()
    }

    pub fn open_bids(&self) -> &[Order] {
        &self.open_bids
    }

    pub fn open_asks(&self) -> &[Order] {
        &self.open_asks
    }

    pub fn transaction_log(&self) -> &[Transaction] {
        &self.transaction_log
    }

    pub fn price_history(&self) -> &[PricePoint] {
        &self.price_history
    }

    /// Sum of all agent funds (for invariant checking)
    pub fn total_funds(&self) -> i64 {
        self.agent_records.values().map(|r| r.funds()).sum()
    }

    /// Sum of all agent inventories (for invariant checking)
    pub fn total_inventory(&self) -> i64 {
        self.agent_records.values().map(|r| r.inventory()).sum()
    }

    /// Most recent traded price, scanning back past no-trade rounds
    pub fn last_traded_price(&self) -> Option<i64> {
        self.price_history.iter().rev().find_map(|p| p.price)
    }

    /// Replace the open order book with this round's submissions
    pub fn replace_open_orders(&mut self, bids: Vec<Order>, asks: Vec<Order>) {
        self.open_bids = bids;
        self.open_asks = asks;
    }

    /// Append the round's trades to the transaction log
    pub fn append_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transaction_log.extend(transactions);
    }

    /// Record a settled round: price point appended, round advanced
    ///
    /// # Panics
    /// Panics if the point does not describe the next round; rounds
    /// settle strictly in order.
    pub fn record_round(&mut self, point: PricePoint) {
        assert_eq!(point.round, self.round + 1, "rounds settle in order");
        self.price_history.push(point);
        self.round = point.round;
    }

    /// Produce the immutable snapshot handed to agents and consumers
    ///
    /// Valuations and costs stay private: the snapshot carries only
    /// public per-agent state (role, funds, inventory).
    pub fn snapshot(&self, diagnostics: Vec<Diagnostic>) -> MarketSnapshot {
        let mut agents: Vec<PublicAgentRecord> = self
            .agent_records
            .values()
            .map(|r| PublicAgentRecord {
                agent_id: r.agent_id().to_string(),
                role: r.role(),
                funds: r.funds(),
                inventory: r.inventory(),
            })
            .collect();
        // HashMap iteration order is unstable; keep snapshots deterministic.
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

        MarketSnapshot {
            round: self.round,
            open_bids: self.open_bids.clone(),
            open_asks: self.open_asks.clone(),
            transaction_log: self.transaction_log.clone(),
            price_history: self.price_history.clone(),
            agents,
            diagnostics,
        }
    }
}
