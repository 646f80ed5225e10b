//! Lifecycle sequencing of a stream instance.

pub mod clock;
pub mod instance;
pub mod orchestrator;
pub mod receipt;

pub use clock::{Clock, ManualClock, SystemClock};
pub use instance::{
    Collaborators, PoolOptions, SettlementOptions, StreamConfig, StreamError, StreamInstance,
    StreamState, StreamStatus,
};
pub use orchestrator::Orchestrator;
pub use receipt::{Operation, Receipt};
