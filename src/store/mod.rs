//! Persistence boundary of a stream instance.
//!
//! Reads go through [`StreamStore::position`] and friends. Everything an
//! operation writes (transfers, the participant's position, a consumed
//! permit nonce, the new stream state) is handed over as one
//! [`OperationCommit`] and applied as a unit.

use crate::assets::{Transfer, TransferError};
use crate::domain::{Address, Position};
use crate::orchestration::StreamState;
use crate::permit::AuthorizationError;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

pub use memory::{MemoryPositionStore, MemoryStreamStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("position store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Key-value storage of participant positions.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Fetch a participant's position; unknown participants get a zero record.
    async fn get(&self, participant: &Address) -> Result<Position, StoreError>;

    async fn put(&self, participant: &Address, position: &Position) -> Result<(), StoreError>;
}

/// Every write of one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationCommit<'a> {
    pub operation_id: Uuid,
    pub transfers: &'a [Transfer],
    pub position: Option<(&'a Address, &'a Position)>,
    /// Permit nonce spent by a delegated deposit.
    pub permit_nonce: Option<(&'a Address, u64)>,
    pub state: &'a StreamState,
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl From<sqlx::Error> for CommitError {
    fn from(err: sqlx::Error) -> Self {
        CommitError::Store(err.into())
    }
}

/// Transactional storage of one stream instance.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Last committed stream state; `None` before the stream was created.
    async fn load_state(&self) -> Result<Option<StreamState>, StoreError>;

    /// A participant's stored position; unknown participants get a zero record.
    async fn position(&self, participant: &Address) -> Result<Position, StoreError>;

    async fn permit_used(&self, owner: &Address, nonce: u64) -> Result<bool, StoreError>;

    /// Apply every write of `commit`, or none of them.
    ///
    /// Fails with `InsufficientBalance` when a transfer would overdraw its
    /// source, and with `NonceUsed` when the permit nonce was already spent.
    async fn commit(&self, commit: OperationCommit<'_>) -> Result<(), CommitError>;
}
