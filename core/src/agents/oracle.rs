//! Oracle-driven decision source
//!
//! Adapter turning an injected async function into a `DecisionSource`.
//! The function receives owned copies of the snapshot and the agent's
//! record, so its future can outlive the call frame (the usual shape
//! for a network-bound LLM client).
//!
//! The oracle's output gets no special trust: the driver runs the same
//! validation over it as over any other submission, and an `Err`,
//! timeout or malformed decision degrades to an abstention for the
//! round without disturbing the other agents.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::agents::{AgentDecision, DecisionError, DecisionSource};
use crate::models::record::AgentRecord;
use crate::models::snapshot::MarketSnapshot;

/// Wrap an async closure as a decision source
///
/// # Example
/// ```
/// use futures::FutureExt;
/// use market_sim_core::{AgentDecision, FnOracle};
///
/// let oracle = FnOracle::new(|_snapshot, _record| {
///     async { Ok(AgentDecision::Abstain) }.boxed()
/// });
/// # let _ = oracle;
/// ```
pub struct FnOracle<F>
where
    F: Fn(MarketSnapshot, AgentRecord) -> BoxFuture<'static, Result<AgentDecision, DecisionError>>
        + Send
        + Sync,
{
    func: F,
}

impl<F> FnOracle<F>
where
    F: Fn(MarketSnapshot, AgentRecord) -> BoxFuture<'static, Result<AgentDecision, DecisionError>>
        + Send
        + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> DecisionSource for FnOracle<F>
where
    F: Fn(MarketSnapshot, AgentRecord) -> BoxFuture<'static, Result<AgentDecision, DecisionError>>
        + Send
        + Sync,
{
    async fn decide(
        &self,
        snapshot: &MarketSnapshot,
        record: &AgentRecord,
    ) -> Result<AgentDecision, DecisionError> {
        (self.func)(snapshot.clone(), record.clone()).await
    }
}
