//! Domain models: orders, transactions, agent records, market state

pub mod order;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod transaction;

pub use order::{Order, OrderRejection, Side};
pub use record::{AgentRecord, RecordError, Role};
pub use snapshot::{MarketSnapshot, PublicAgentRecord};
pub use state::{MarketState, PricePoint};
pub use transaction::Transaction;
