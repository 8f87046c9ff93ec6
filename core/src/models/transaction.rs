//! Transaction model
//!
//! A completed trade between one buyer and one seller. Transactions are
//! created only by the matching engine and are immutable once built; the
//! transaction log is append-only, ordered by round and then by match
//! order within the round.
//!
//! CRITICAL: All money values are i64 (minor units)

use serde::{Deserialize, Serialize};

/// A cleared trade
///
/// # Example
/// ```
/// use market_sim_core::Transaction;
///
/// let tx = Transaction::new("buyer_1".to_string(), "seller_1".to_string(), 1200, 1, 3);
/// assert_eq!(tx.notional(), 1200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (UUID)
    id: String,

    /// Buying agent ID
    buyer_id: String,

    /// Selling agent ID
    seller_id: String,

    /// Execution price per unit in minor units
    price: i64,

    /// Units traded
    quantity: i64,

    /// Round in which the trade cleared
    round: usize,
}

impl Transaction {
    /// Create a new transaction
    ///
    /// # Panics
    /// Panics if price or quantity is not positive. The matching engine
    /// only matches validated orders, so this cannot trigger in a
    /// normally driven run.
    pub fn new(
        buyer_id: String,
        seller_id: String,
        price: i64,
        quantity: i64,
        round: usize,
    ) -> Self {
        assert!(price > 0, "price must be positive");
        assert!(quantity > 0, "quantity must be positive");

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            buyer_id,
            seller_id,
            price,
            quantity,
            round,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn buyer_id(&self) -> &str {
        &self.buyer_id
    }

    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }

    /// Execution price per unit in minor units
    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// Total value exchanged: price x quantity
    pub fn notional(&self) -> i64 {
        self.price * self.quantity
    }
}
