//! Domain types for the distribution engine.
//!
//! This module provides:
//! - Fixed-point Decimal with 256-bit intermediates
//! - Domain primitives: TimeMs, Address, AssetId
//! - Phase, timing configuration, distribution ledger and position records

pub mod decimal;
pub mod ledger;
pub mod phase;
pub mod position;
pub mod primitives;

pub use decimal::{mul_div_ceil, mul_div_floor, Decimal, DecimalParseError, MathError};
pub use ledger::{DistributionLedger, StreamTiming, TimingOrderError};
pub use phase::{Phase, PhaseParseError};
pub use position::Position;
pub use primitives::{Address, AddressParseError, AssetId, TimeMs};
