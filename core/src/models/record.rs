//! Agent record model
//!
//! Per-agent ledger entry owned by `MarketState`: role, funds, inventory
//! and the agent's private valuation (buyer) or unit cost (seller).
//!
//! Records are mutated only by the simulation driver during settlement,
//! never by agents. Funds and inventory can never go negative: the
//! mutating methods return an error instead, which the driver escalates
//! to a fatal invariant violation (validation should have made the
//! settlement safe before it ran).
//!
//! CRITICAL: All money values are i64 (minor units)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market role of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Seller => write!(f, "seller"),
        }
    }
}

/// Errors from record mutations that would break the ledger invariants
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("insufficient inventory: required {required}, available {available}")]
    InsufficientInventory { required: i64, available: i64 },
}

/// Ledger entry for one agent
///
/// # Example
/// ```
/// use market_sim_core::{AgentRecord, Role};
///
/// let mut record = AgentRecord::new("buyer_1".to_string(), Role::Buyer, 10_000, 0, 2_000);
/// record.debit_funds(1_200).unwrap();
/// record.add_inventory(1);
/// assert_eq!(record.funds(), 8_800);
/// assert_eq!(record.inventory(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Unique agent identifier
    agent_id: String,

    /// Buyer or seller
    role: Role,

    /// Available funds in minor units (never negative)
    funds: i64,

    /// Units of the traded good held (never negative)
    inventory: i64,

    /// Buyer's valuation or seller's unit cost, in minor units.
    /// Fixed at creation; the engine never mutates it.
    valuation_or_cost: i64,
}

impl AgentRecord {
    /// Create a new record
    ///
    /// # Panics
    /// Panics if funds or inventory are negative, or valuation/cost is
    /// not positive. Seeds come through config validation first.
    pub fn new(
        agent_id: String,
        role: Role,
        funds: i64,
        inventory: i64,
        valuation_or_cost: i64,
    ) -> Self {
        assert!(funds >= 0, "funds must be non-negative");
        assert!(inventory >= 0, "inventory must be non-negative");
        assert!(valuation_or_cost > 0, "valuation_or_cost must be positive");

        Self {
            agent_id,
            role,
            funds,
            inventory,
            valuation_or_cost,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Available funds in minor units
    pub fn funds(&self) -> i64 {
        self.funds
    }

    /// Units of the good currently held
    pub fn inventory(&self) -> i64 {
        self.inventory
    }

    /// Buyer valuation or seller unit cost (private to the agent)
    pub fn valuation_or_cost(&self) -> i64 {
        self.valuation_or_cost
    }

    /// Check whether the record can cover a payment
    pub fn can_afford(&self, amount: i64) -> bool {
        amount <= self.funds
    }

    /// Debit funds, refusing to go negative
    pub fn debit_funds(&mut self, amount: i64) -> Result<(), RecordError> {
        assert!(amount >= 0, "amount must be non-negative");

        if amount > self.funds {
            return Err(RecordError::InsufficientFunds {
                required: amount,
                available: self.funds,
            });
        }
        self.funds -= amount;
        Ok(())
    }

    /// Credit funds
    pub fn credit_funds(&mut self, amount: i64) {
        assert!(amount >= 0, "amount must be non-negative");
        self.funds += amount;
    }

    /// Remove inventory, refusing to go negative
    pub fn remove_inventory(&mut self, quantity: i64) -> Result<(), RecordError> {
        assert!(quantity >= 0, "quantity must be non-negative");

        if quantity > self.inventory {
            return Err(RecordError::InsufficientInventory {
                required: quantity,
                available: self.inventory,
            });
        }
        self.inventory -= quantity;
        Ok(())
    }

    /// Add inventory
    pub fn add_inventory(&mut self, quantity: i64) {
        assert!(quantity >= 0, "quantity must be non-negative");
        self.inventory += quantity;
    }
}
