//! Round-lifecycle driver: configuration and the simulation engine

pub mod config;
pub mod engine;

pub use config::{uniform_roster, AgentSeed, DecisionConfig, PriceBand, SimulationConfig};
pub use engine::{
    DriverPhase, OracleFailure, RoundResult, SimulationDriver, SimulationError, StopHandle,
};
