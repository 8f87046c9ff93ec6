//! Simulation driver
//!
//! Owns the market state and runs the round lifecycle: COLLECTING
//! (query every agent concurrently under a deadline), CLEARING (match
//! the round's book), SETTLING (apply trades and record the round).
//! Recoverable per-agent errors degrade to abstentions and surface as
//! diagnostics; a conservation failure during settlement is fatal and
//! aborts the run.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::agents::{AgentDecision, DecisionSource, RuleBasedDecision};
use crate::driver::config::{DecisionConfig, PriceBand, SimulationConfig};
use crate::events::{Diagnostic, DiagnosticKind, Event, EventLog};
use crate::matching::{self, OrderBook};
use crate::models::order::{Order, OrderRejection, Side};
use crate::models::record::{AgentRecord, Role};
use crate::models::snapshot::MarketSnapshot;
use crate::models::state::{MarketState, PricePoint};
use crate::models::transaction::Transaction;

/// Fatal simulation errors; anything recoverable becomes a
/// `Diagnostic` instead
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("invariant violation for agent {agent_id}: {detail}")]
    InvariantViolation { agent_id: String, detail: String },
}

/// Where the driver is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// Constructed, not yet running
    Initialized,
    /// Inside `run`
    Running,
    /// `run` finished all rounds or halted cleanly
    Completed,
    /// `run` aborted on a fatal error or failed its readiness check
    Failed,
}

/// Per-round summary returned by `run_round`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    /// 1-based round number
    pub round: usize,
    /// Orders accepted into the book this round
    pub num_orders: usize,
    /// Trades cleared this round
    pub num_transactions: usize,
    /// Units traded this round
    pub volume: i64,
    /// Volume-weighted clearing price; `None` when nothing traded
    pub clearing_price: Option<i64>,
}

/// First oracle failure of a run, kept for post-run reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleFailure {
    pub round: usize,
    pub agent_id: String,
    pub message: String,
}

/// Cooperative stop signal, checked between rounds.
///
/// Clones share the flag, so a handle can be passed to another task
/// while the driver runs.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct RosterEntry {
    id: String,
    /// `None` until an oracle is registered for an oracle-configured
    /// agent; rule-based agents get their source at construction
    source: Option<Box<dyn DecisionSource>>,
}

/// Drives a full simulation over a validated configuration
pub struct SimulationDriver {
    config: SimulationConfig,
    state: MarketState,
    agents: Vec<RosterEntry>,
    phase: DriverPhase,
    event_log: EventLog,
    /// Diagnostics from the most recently settled round; attached to
    /// the snapshot agents see in the next round
    round_diagnostics: Vec<Diagnostic>,
    history: Vec<MarketSnapshot>,
    idle_rounds: usize,
    first_oracle_failure: Option<OracleFailure>,
    stop: StopHandle,
}

impl SimulationDriver {
    /// Build a driver from a configuration. Validates the config and
    /// seeds market state and rule-based decision sources; oracle
    /// agents still need `register_oracle` before `run`.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let records: Vec<AgentRecord> = config
            .agent_roster
            .iter()
            .map(|seed| {
                AgentRecord::new(
                    seed.id.clone(),
                    seed.role,
                    seed.funds,
                    seed.inventory,
                    seed.valuation_or_cost,
                )
            })
            .collect();

        let agents = config
            .agent_roster
            .iter()
            .map(|seed| RosterEntry {
                id: seed.id.clone(),
                source: match &seed.decision {
                    DecisionConfig::RuleBased { factor } => Some(Box::new(
                        RuleBasedDecision::new(seed.role, *factor),
                    )
                        as Box<dyn DecisionSource>),
                    DecisionConfig::Oracle => None,
                },
            })
            .collect();

        Ok(Self {
            state: MarketState::new(records),
            agents,
            phase: DriverPhase::Initialized,
            event_log: EventLog::new(),
            round_diagnostics: Vec::new(),
            history: Vec::new(),
            idle_rounds: 0,
            first_oracle_failure: None,
            stop: StopHandle::default(),
            config,
        })
    }

    /// Attach a decision source to an agent, replacing any existing
    /// one. Required for every `oracle`-configured agent before `run`.
    pub fn register_oracle(
        &mut self,
        agent_id: &str,
        source: Box<dyn DecisionSource>,
    ) -> Result<(), SimulationError> {
        let entry = self
            .agents
            .iter_mut()
            .find(|entry| entry.id == agent_id)
            .ok_or_else(|| SimulationError::AgentNotFound(agent_id.to_string()))?;
        entry.source = Some(source);
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// One snapshot per settled round, each carrying that round's
    /// diagnostics
    pub fn history(&self) -> &[MarketSnapshot] {
        &self.history
    }

    pub fn first_oracle_failure(&self) -> Option<&OracleFailure> {
        self.first_oracle_failure.as_ref()
    }

    /// Handle for stopping the run between rounds
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current public view of the market, with the latest round's
    /// diagnostics attached
    pub fn snapshot(&self) -> MarketSnapshot {
        self.state.snapshot(self.round_diagnostics.clone())
    }

    /// Run the whole simulation: every configured round, unless a stop
    /// request or the idle-round halt ends it early. Returns one
    /// `RoundResult` per completed round.
    pub async fn run(&mut self) -> Result<Vec<RoundResult>, SimulationError> {
        if self.phase != DriverPhase::Initialized {
            return Err(SimulationError::InvalidConfig(
                "simulation has already run".to_string(),
            ));
        }
        if let Some(entry) = self.agents.iter().find(|entry| entry.source.is_none()) {
            self.phase = DriverPhase::Failed;
            return Err(SimulationError::InvalidConfig(format!(
                "agent {} is configured as oracle but none was registered",
                entry.id
            )));
        }

        self.phase = DriverPhase::Running;
        info!(
            num_rounds = self.config.num_rounds,
            num_agents = self.agents.len(),
            "starting simulation"
        );

        let mut results = Vec::with_capacity(self.config.num_rounds);
        while self.state.round() < self.config.num_rounds {
            if self.stop.is_stopped() {
                info!(
                    completed_rounds = self.state.round(),
                    "stop requested, halting between rounds"
                );
                break;
            }
            if self.config.halt_after_idle_rounds > 0
                && self.idle_rounds >= self.config.halt_after_idle_rounds
            {
                info!(
                    idle_rounds = self.idle_rounds,
                    "market went idle, halting early"
                );
                break;
            }

            match self.run_round().await {
                Ok(result) => results.push(result),
                Err(err) => {
                    error!(round = self.state.round() + 1, %err, "simulation aborted");
                    self.phase = DriverPhase::Failed;
                    return Err(err);
                }
            }
        }

        self.phase = DriverPhase::Completed;
        info!(
            completed_rounds = results.len(),
            total_transactions = self.state.transaction_log().len(),
            "simulation finished"
        );
        Ok(results)
    }

    /// Run one full round: collect decisions, clear the book, settle
    /// trades, record the price point.
    pub async fn run_round(&mut self) -> Result<RoundResult, SimulationError> {
        let round = self.state.round() + 1;
        let timeout = self.config.per_agent_timeout();
        debug!(round, "collecting decisions");

        // Every agent sees the same pre-round snapshot, with the
        // previous round's diagnostics attached.
        let snapshot = self
            .state
            .snapshot(mem::take(&mut self.round_diagnostics));

        let ids: Vec<String> = self.agents.iter().map(|entry| entry.id.clone()).collect();
        let records: Vec<AgentRecord> = ids
            .iter()
            .map(|id| {
                self.state
                    .get_record(id)
                    .cloned()
                    .ok_or_else(|| SimulationError::AgentNotFound(id.clone()))
            })
            .collect::<Result<_, _>>()?;

        // All decision futures run concurrently, each under its own
        // deadline. Outcomes come back in roster order, which fixes
        // the submission sequence regardless of completion order.
        let outcomes = {
            let mut futures = Vec::with_capacity(self.agents.len());
            for (entry, record) in self.agents.iter().zip(records.iter()) {
                let source = entry.source.as_deref().ok_or_else(|| {
                    SimulationError::InvalidConfig(format!(
                        "agent {} has no decision source",
                        entry.id
                    ))
                })?;
                let snapshot = &snapshot;
                futures.push(async move {
                    tokio::time::timeout(timeout, source.decide(snapshot, record)).await
                });
            }
            futures::future::join_all(futures).await
        };

        let mut book = OrderBook::new();
        let mut submitted_bids = Vec::new();
        let mut submitted_asks = Vec::new();
        let mut diagnostics = Vec::new();

        for ((id, record), outcome) in ids.iter().zip(records.iter()).zip(outcomes) {
            match outcome {
                Err(_elapsed) => {
                    warn!(round, agent_id = %id, "decision timed out, treating as abstention");
                    diagnostics.push(Diagnostic {
                        round,
                        agent_id: id.clone(),
                        kind: DiagnosticKind::Timeout,
                    });
                    self.event_log.log(Event::AgentTimedOut {
                        round,
                        agent_id: id.clone(),
                    });
                    self.note_oracle_failure(round, id, "decision timed out");
                }
                Ok(Err(err)) => {
                    let message = err.to_string();
                    warn!(round, agent_id = %id, %message, "oracle error, treating as abstention");
                    diagnostics.push(Diagnostic {
                        round,
                        agent_id: id.clone(),
                        kind: DiagnosticKind::OracleError {
                            message: message.clone(),
                        },
                    });
                    self.event_log.log(Event::OracleFailed {
                        round,
                        agent_id: id.clone(),
                        message: message.clone(),
                    });
                    self.note_oracle_failure(round, id, &message);
                }
                Ok(Ok(AgentDecision::Abstain)) => {
                    debug!(round, agent_id = %id, "agent abstained");
                }
                Ok(Ok(decision)) => {
                    match validate_decision(record, decision, round, self.config.price_band.as_ref())
                    {
                        Ok(order) => {
                            self.event_log.log(Event::OrderSubmitted {
                                round,
                                agent_id: id.clone(),
                                side: order.side(),
                                price: order.price(),
                                quantity: order.quantity(),
                            });
                            match order.side() {
                                Side::Bid => submitted_bids.push(order.clone()),
                                Side::Ask => submitted_asks.push(order.clone()),
                            }
                            book.insert(order);
                        }
                        Err(rejection) => {
                            let reason = rejection.to_string();
                            warn!(round, agent_id = %id, %reason, "order rejected");
                            diagnostics.push(Diagnostic {
                                round,
                                agent_id: id.clone(),
                                kind: DiagnosticKind::InvalidOrder {
                                    reason: reason.clone(),
                                },
                            });
                            self.event_log.log(Event::OrderRejected {
                                round,
                                agent_id: id.clone(),
                                reason,
                            });
                        }
                    }
                }
            }
        }

        let num_orders = book.num_bids() + book.num_asks();
        self.state
            .replace_open_orders(submitted_bids, submitted_asks);

        debug!(round, num_orders, "clearing");
        let report = matching::match_orders(&mut book, round);

        for dropped in &report.self_trade_drops {
            let reason = OrderRejection::SelfTrade.to_string();
            warn!(round, agent_id = %dropped.agent_id(), "order dropped: self-trade");
            diagnostics.push(Diagnostic {
                round,
                agent_id: dropped.agent_id().to_string(),
                kind: DiagnosticKind::InvalidOrder {
                    reason: reason.clone(),
                },
            });
            self.event_log.log(Event::OrderRejected {
                round,
                agent_id: dropped.agent_id().to_string(),
                reason,
            });
        }

        for tx in &report.transactions {
            self.apply_transaction(tx)?;
            self.event_log.log(Event::Trade {
                round,
                tx_id: tx.id().to_string(),
                buyer_id: tx.buyer_id().to_string(),
                seller_id: tx.seller_id().to_string(),
                price: tx.price(),
                quantity: tx.quantity(),
            });
        }

        let clearing_price = matching::volume_weighted_price(&report.transactions);
        let volume: i64 = report.transactions.iter().map(|tx| tx.quantity()).sum();
        let num_transactions = report.transactions.len();

        self.state.append_transactions(report.transactions);
        self.state.record_round(PricePoint {
            round,
            price: clearing_price,
            volume,
            num_transactions,
        });

        self.event_log.log(Event::RoundCleared {
            round,
            num_orders,
            num_transactions,
            volume,
            clearing_price,
        });
        info!(
            round,
            num_orders, num_transactions, volume, ?clearing_price, "round settled"
        );

        if num_orders == 0 {
            self.idle_rounds += 1;
        } else {
            self.idle_rounds = 0;
        }

        self.round_diagnostics = diagnostics;
        self.history
            .push(self.state.snapshot(self.round_diagnostics.clone()));

        Ok(RoundResult {
            round,
            num_orders,
            num_transactions,
            volume,
            clearing_price,
        })
    }

    /// Move funds and inventory for one trade. Validation at
    /// submission guarantees both legs are covered, so a failure here
    /// is a conservation bug and aborts the run.
    fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), SimulationError> {
        let notional = tx.notional();

        let buyer = self
            .state
            .get_record_mut(tx.buyer_id())
            .ok_or_else(|| SimulationError::AgentNotFound(tx.buyer_id().to_string()))?;
        buyer
            .debit_funds(notional)
            .map_err(|err| SimulationError::InvariantViolation {
                agent_id: tx.buyer_id().to_string(),
                detail: err.to_string(),
            })?;
        buyer.add_inventory(tx.quantity());

        let seller = self
            .state
            .get_record_mut(tx.seller_id())
            .ok_or_else(|| SimulationError::AgentNotFound(tx.seller_id().to_string()))?;
        seller
            .remove_inventory(tx.quantity())
            .map_err(|err| SimulationError::InvariantViolation {
                agent_id: tx.seller_id().to_string(),
                detail: err.to_string(),
            })?;
        seller.credit_funds(notional);

        Ok(())
    }

    fn note_oracle_failure(&mut self, round: usize, agent_id: &str, message: &str) {
        if self.first_oracle_failure.is_none() {
            self.first_oracle_failure = Some(OracleFailure {
                round,
                agent_id: agent_id.to_string(),
                message: message.to_string(),
            });
        }
    }
}

/// Validate a decision against the submitting agent's role, budget and
/// the configured price band. Returns the order to book, or the
/// rejection that degrades it to an abstention.
fn validate_decision(
    record: &AgentRecord,
    decision: AgentDecision,
    round: usize,
    band: Option<&PriceBand>,
) -> Result<Order, OrderRejection> {
    let (side, price, quantity) = match decision {
        AgentDecision::Bid { price, quantity } => (Side::Bid, price, quantity),
        AgentDecision::Ask { price, quantity } => (Side::Ask, price, quantity),
        // Caller handles abstentions; an abstaining agent never
        // reaches validation.
        AgentDecision::Abstain => unreachable!("abstentions are filtered before validation"),
    };

    match (record.role(), side) {
        (Role::Buyer, Side::Bid) | (Role::Seller, Side::Ask) => {}
        (role, side) => return Err(OrderRejection::WrongSide { role, side }),
    }

    let order = Order::new(record.agent_id().to_string(), side, price, quantity, round)?;

    if let Some(band) = band {
        if !band.contains(order.price()) {
            return Err(OrderRejection::OutsidePriceBand {
                price: order.price(),
                min: band.min,
                max: band.max,
            });
        }
    }

    let notional = order.notional().ok_or(OrderRejection::NotionalOverflow)?;
    match side {
        Side::Bid => {
            if !record.can_afford(notional) {
                return Err(OrderRejection::InsufficientFunds {
                    required: notional,
                    available: record.funds(),
                });
            }
        }
        Side::Ask => {
            if record.inventory() < order.quantity() {
                return Err(OrderRejection::InsufficientInventory {
                    required: order.quantity(),
                    available: record.inventory(),
                });
            }
        }
    }

    Ok(order)
}
