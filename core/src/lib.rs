//! Market Simulator Core - Rust Engine
//!
//! Repeated double-auction marketplace simulator with rule-based and
//! oracle-driven agents and deterministic matching.
//!
//! # Architecture
//!
//! - **models**: Domain types (Order, Transaction, AgentRecord, MarketState)
//! - **agents**: Decision sources (rule-based formula, injected oracle)
//! - **matching**: Per-round order book and price/time-priority clearing
//! - **driver**: Round lifecycle (collect, clear, settle) and configuration
//! - **events**: Run-long event log and per-round diagnostics
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (minor units)
//! 2. Total funds and total inventory are conserved across every round
//! 3. Submission order is roster order, so runs with deterministic
//!    decision sources are reproducible

// Module declarations
pub mod agents;
pub mod driver;
pub mod events;
pub mod matching;
pub mod models;

// Re-exports for convenience
pub use agents::{AgentDecision, DecisionError, DecisionSource, FnOracle, RuleBasedDecision};
pub use driver::{
    uniform_roster, AgentSeed, DecisionConfig, DriverPhase, OracleFailure, PriceBand, RoundResult,
    SimulationConfig, SimulationDriver, SimulationError, StopHandle,
};
pub use events::{Diagnostic, DiagnosticKind, Event, EventLog};
pub use matching::{match_orders, volume_weighted_price, ClearingReport, OrderBook};
pub use models::{
    order::{Order, OrderRejection, Side},
    record::{AgentRecord, RecordError, Role},
    snapshot::{MarketSnapshot, PublicAgentRecord},
    state::{MarketState, PricePoint},
    transaction::Transaction,
};
