//! Event logging for simulation auditing and diagnostics.
//!
//! The `Event` enum captures every significant state change during a
//! run: order submissions and rejections, agent timeouts, oracle
//! failures, trades and round clearings. The run-long `EventLog` exists
//! for debugging and analysis; the lighter per-round `Diagnostic`
//! records travel on snapshots so external consumers can surface
//! recoverable errors to the user without the simulation halting.

use serde::{Deserialize, Serialize};

use crate::models::order::Side;

/// Simulation event capturing a state change.
///
/// All events carry the round they occurred in; events are logged in
/// the order they happen within a round.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A validated order entered the round's book
    OrderSubmitted {
        round: usize,
        agent_id: String,
        side: Side,
        price: i64,
        quantity: i64,
    },

    /// A submission failed validation and degraded to an abstention
    OrderRejected {
        round: usize,
        agent_id: String,
        reason: String,
    },

    /// An agent's decision call exceeded the per-agent deadline
    AgentTimedOut { round: usize, agent_id: String },

    /// An oracle-driven decision call returned an error
    OracleFailed {
        round: usize,
        agent_id: String,
        message: String,
    },

    /// The matching engine cleared a trade
    Trade {
        round: usize,
        tx_id: String,
        buyer_id: String,
        seller_id: String,
        price: i64,
        quantity: i64,
    },

    /// A round finished settling
    RoundCleared {
        round: usize,
        num_orders: usize,
        num_transactions: usize,
        volume: i64,
        clearing_price: Option<i64>,
    },
}

impl Event {
    /// Round in which this event occurred
    pub fn round(&self) -> usize {
        match self {
            Event::OrderSubmitted { round, .. } => *round,
            Event::OrderRejected { round, .. } => *round,
            Event::AgentTimedOut { round, .. } => *round,
            Event::OracleFailed { round, .. } => *round,
            Event::Trade { round, .. } => *round,
            Event::RoundCleared { round, .. } => *round,
        }
    }

    /// Short name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OrderSubmitted { .. } => "OrderSubmitted",
            Event::OrderRejected { .. } => "OrderRejected",
            Event::AgentTimedOut { .. } => "AgentTimedOut",
            Event::OracleFailed { .. } => "OracleFailed",
            Event::Trade { .. } => "Trade",
            Event::RoundCleared { .. } => "RoundCleared",
        }
    }

    /// Agent the event relates to, if any
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Event::OrderSubmitted { agent_id, .. } => Some(agent_id),
            Event::OrderRejected { agent_id, .. } => Some(agent_id),
            Event::AgentTimedOut { agent_id, .. } => Some(agent_id),
            Event::OracleFailed { agent_id, .. } => Some(agent_id),
            Event::Trade { buyer_id, .. } => Some(buyer_id),
            Event::RoundCleared { .. } => None,
        }
    }
}

/// Run-long event log, a thin wrapper over `Vec<Event>`.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events recorded during the given round
    pub fn events_for_round(&self, round: usize) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.round() == round)
    }
}

/// Why a recoverable per-agent error occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed or policy-violating submission (INVALID_ORDER)
    InvalidOrder { reason: String },

    /// Decision call exceeded the per-agent deadline (AGENT_TIMEOUT)
    Timeout,

    /// Oracle decision call returned an error
    OracleError { message: String },
}

/// One recoverable error, recorded per round and exposed on snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub round: usize,
    pub agent_id: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}
