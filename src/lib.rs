pub mod allowlist;
pub mod api;
pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod permit;
pub mod settlement;
pub mod store;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Address, AssetId, Decimal, DistributionLedger, Phase, Position, TimeMs};
pub use error::AppError;
pub use orchestration::{Orchestrator, Receipt, StreamConfig, StreamError, StreamInstance};
