//! SQLite persistence.
//!
//! - `init_db` opens the database, applies pragmas and runs migrations
//! - `Repository` stores balances, positions, permit nonces, the stream
//!   state snapshot and the transfer journal, and commits each stream
//!   operation in one transaction

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{Repository, TransferRecord};
