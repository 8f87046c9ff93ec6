//! Order model
//!
//! Represents one bid or ask submitted by an agent for a single round.
//! Orders are immutable once constructed; the validating constructor is
//! the only way to build one, so a live `Order` always has positive
//! price and quantity.
//!
//! CRITICAL: All money values are i64 (minor units)

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::record::Role;

/// Which side of the book an order sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buy order (submitted by a buyer)
    Bid,
    /// Sell order (submitted by a seller)
    Ask,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Reasons a submission is refused before it reaches the book
///
/// These are all recoverable, per-agent errors: the submission degrades
/// to an abstention for the round and is recorded in the round
/// diagnostics. None of them abort the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderRejection {
    #[error("price must be positive, got {0}")]
    NonPositivePrice(i64),

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),

    #[error("{role} agents cannot submit {side} orders")]
    WrongSide { role: Role, side: Side },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("insufficient inventory: required {required}, available {available}")]
    InsufficientInventory { required: i64, available: i64 },

    #[error("price {price} outside sanity band [{min}, {max}]")]
    OutsidePriceBand { price: i64, min: i64, max: i64 },

    #[error("order notional (price x quantity) overflows")]
    NotionalOverflow,

    #[error("self-trade: agent already has a crossing order on the other side")]
    SelfTrade,
}

/// One bid or ask for a single round
///
/// # Example
/// ```
/// use market_sim_core::{Order, Side};
///
/// let order = Order::new("buyer_1".to_string(), Side::Bid, 1800, 1, 3).unwrap();
/// assert_eq!(order.notional(), Some(1800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Submitting agent ID
    agent_id: String,

    /// Bid or ask
    side: Side,

    /// Limit price in minor units (always > 0)
    price: i64,

    /// Number of units offered or demanded (always > 0)
    quantity: i64,

    /// Round in which the order was submitted
    round: usize,
}

impl Order {
    /// Create a new order, rejecting non-positive price or quantity
    pub fn new(
        agent_id: String,
        side: Side,
        price: i64,
        quantity: i64,
        round: usize,
    ) -> Result<Self, OrderRejection> {
        if price <= 0 {
            return Err(OrderRejection::NonPositivePrice(price));
        }
        if quantity <= 0 {
            return Err(OrderRejection::NonPositiveQuantity(quantity));
        }

        Ok(Self {
            agent_id,
            side,
            price,
            quantity,
            round,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Limit price in minor units
    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// price x quantity, or None on i64 overflow
    pub fn notional(&self) -> Option<i64> {
        self.price.checked_mul(self.quantity)
    }
}
