//! Order book and matching engine
//!
//! Periodic clearing of one round's orders under price/time priority:
//! bids sorted descending by price, asks ascending, ties broken by
//! submission sequence (first submitted wins). The best remaining bid
//! and ask trade while the bid price covers the ask price; the earlier
//! submitted order of the pair sets the execution price (resting-order
//! pricing), with a half-up midpoint as the fallback when no priority
//! separates them.
//!
//! Clearing is single-threaded and deterministic: an identical ordered
//! sequence of orders always yields an identical ordered sequence of
//! transactions. Re-running a cleared book is a no-op.
//!
//! CRITICAL: All money values are i64 (minor units)

use std::cmp::Reverse;

use crate::models::order::{Order, Side};
use crate::models::transaction::Transaction;

/// One order resting in the book with its fill state
#[derive(Debug, Clone)]
struct BookEntry {
    order: Order,

    /// Submission sequence within the round (lower = earlier)
    seq: usize,

    /// Unfilled quantity
    remaining: i64,
}

/// Per-round collection of open bids and asks
///
/// Orders are inserted in submission order; the book assigns each a
/// sequence number used for tie-breaking and resting-order pricing.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: Vec<BookEntry>,
    asks: Vec<BookEntry>,
    next_seq: usize,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated order, assigning the next sequence number
    pub fn insert(&mut self, order: Order) {
        let entry = BookEntry {
            seq: self.next_seq,
            remaining: order.quantity(),
            order,
        };
        self.next_seq += 1;

        match entry.order.side() {
            Side::Bid => self.bids.push(entry),
            Side::Ask => self.asks.push(entry),
        }
    }

    pub fn num_bids(&self) -> usize {
        self.bids.len()
    }

    pub fn num_asks(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// All bids ever inserted this round, in submission order
    pub fn bids(&self) -> impl Iterator<Item = &Order> {
        self.bids.iter().map(|e| &e.order)
    }

    /// All asks ever inserted this round, in submission order
    pub fn asks(&self) -> impl Iterator<Item = &Order> {
        self.asks.iter().map(|e| &e.order)
    }
}

/// Outcome of one clearing pass
#[derive(Debug, Clone, Default)]
pub struct ClearingReport {
    /// Trades in match order
    pub transactions: Vec<Transaction>,

    /// Orders dropped because they would have crossed an order from
    /// the same agent (the later-submitted order of the pair loses)
    pub self_trade_drops: Vec<Order>,
}

/// Clear the book: repeatedly match the best remaining bid and ask
/// while they cross.
///
/// Partially filled orders stay eligible within the pass; fully
/// filled orders retire. Uncrossed leftovers stay in the book with
/// their remaining quantity, but since no crossing pair remains a
/// second pass produces zero transactions.
pub fn match_orders(book: &mut OrderBook, round: usize) -> ClearingReport {
    let mut report = ClearingReport::default();

    // Price/time priority: best price first, earlier submission wins ties.
    book.bids.sort_by_key(|e| (Reverse(e.order.price()), e.seq));
    book.asks.sort_by_key(|e| (e.order.price(), e.seq));

    let mut bid_idx = 0;
    let mut ask_idx = 0;

    while bid_idx < book.bids.len() && ask_idx < book.asks.len() {
        if book.bids[bid_idx].remaining == 0 {
            bid_idx += 1;
            continue;
        }
        if book.asks[ask_idx].remaining == 0 {
            ask_idx += 1;
            continue;
        }

        let bid = &book.bids[bid_idx];
        let ask = &book.asks[ask_idx];

        if bid.order.price() < ask.order.price() {
            // Best bid no longer covers best ask: nothing else crosses.
            break;
        }

        if bid.order.agent_id() == ask.order.agent_id() {
            // Self-trade: the later-submitted order of the pair is dropped.
            if bid.seq > ask.seq {
                report.self_trade_drops.push(bid.order.clone());
                book.bids[bid_idx].remaining = 0;
            } else {
                report.self_trade_drops.push(ask.order.clone());
                book.asks[ask_idx].remaining = 0;
            }
            continue;
        }

        let quantity = bid.remaining.min(ask.remaining);
        let price = if bid.seq < ask.seq {
            bid.order.price()
        } else if ask.seq < bid.seq {
            ask.order.price()
        } else {
            midpoint(bid.order.price(), ask.order.price())
        };

        report.transactions.push(Transaction::new(
            bid.order.agent_id().to_string(),
            ask.order.agent_id().to_string(),
            price,
            quantity,
            round,
        ));

        book.bids[bid_idx].remaining -= quantity;
        book.asks[ask_idx].remaining -= quantity;
    }

    report
}

/// Midpoint of two prices, rounded half-up to the minor unit
fn midpoint(bid_price: i64, ask_price: i64) -> i64 {
    let sum = bid_price + ask_price;
    sum / 2 + sum % 2
}

/// Volume-weighted mean price of a round's transactions, rounded to
/// the nearest minor unit. None when the round had no trades.
pub fn volume_weighted_price(transactions: &[Transaction]) -> Option<i64> {
    let volume: i64 = transactions.iter().map(|t| t.quantity()).sum();
    if volume == 0 {
        return None;
    }
    let notional: i64 = transactions.iter().map(|t| t.notional()).sum();
    Some((notional as f64 / volume as f64).round() as i64)
}
