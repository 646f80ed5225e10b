//! Pure computation engine for the distribution ledger.
//!
//! Every function here is deterministic and free of I/O: the orchestration
//! layer feeds them the current state and commits what they return.

pub mod distribution;
pub mod fees;
pub mod phase;
pub mod position_sync;
pub mod shares;

pub use distribution::{normalized_price, time_diff, update_distribution, AssetPrecision};
pub use fees::{split_fee, FeeSplit};
pub use phase::{next_phase, phase_at};
pub use position_sync::sync_position;
pub use shares::{compute_shares, ShareDirection};
