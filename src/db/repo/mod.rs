//! Repository layer for database operations.
//!
//! Methods are organized across submodules by table:
//! - `balances.rs` - account balances, credits and transfer application
//! - `positions.rs` - participant positions
//! - `transfers.rs` - transfer journal reads
//!
//! The single-row stream state snapshot, permit nonces and the
//! [`StreamStore`] implementation live here.

mod balances;
mod positions;
mod transfers;

pub use transfers::TransferRecord;

use crate::domain::{Address, Decimal, DistributionLedger, Phase, Position, TimeMs};
use crate::orchestration::StreamState;
use crate::permit::AuthorizationError;
use crate::store::{CommitError, OperationCommit, StoreError, StreamStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Executor, Row, Sqlite};
use std::str::FromStr;
use tracing::debug;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

fn decode_err(column: &str, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("invalid {}: {}", column, err).into())
}

/// Read a u128 stored as a decimal string.
fn get_u128(row: &SqliteRow, column: &str) -> Result<u128, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse::<u128>().map_err(|e| decode_err(column, e))
}

fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| decode_err(column, e))
}

async fn upsert_stream_state<'e, E>(executor: E, state: &StreamState) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let ledger = &state.ledger;
    sqlx::query(
        r#"
        INSERT INTO stream_state (
            id, phase, out_remaining, dist_index, spent_in, shares,
            current_price, out_supply, in_supply, last_updated_ms, saved_at
        )
        VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            phase = excluded.phase,
            out_remaining = excluded.out_remaining,
            dist_index = excluded.dist_index,
            spent_in = excluded.spent_in,
            shares = excluded.shares,
            current_price = excluded.current_price,
            out_supply = excluded.out_supply,
            in_supply = excluded.in_supply,
            last_updated_ms = excluded.last_updated_ms,
            saved_at = excluded.saved_at
        "#,
    )
    .bind(state.phase.as_str())
    .bind(ledger.out_remaining.to_string())
    .bind(ledger.dist_index.to_canonical_string())
    .bind(ledger.spent_in.to_string())
    .bind(ledger.shares.to_string())
    .bind(ledger.current_price.to_canonical_string())
    .bind(ledger.out_supply.to_string())
    .bind(ledger.in_supply.to_string())
    .bind(ledger.last_updated.as_ms())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Load the stream state snapshot, if one was saved.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn load_stream_state(&self) -> Result<Option<StreamState>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT phase, out_remaining, dist_index, spent_in, shares,
                   current_price, out_supply, in_supply, last_updated_ms
            FROM stream_state
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let phase_raw: String = row.try_get("phase")?;
        let phase = Phase::from_str(&phase_raw).map_err(|e| decode_err("phase", e))?;
        let ledger = DistributionLedger {
            out_remaining: get_u128(&row, "out_remaining")?,
            dist_index: get_decimal(&row, "dist_index")?,
            spent_in: get_u128(&row, "spent_in")?,
            shares: get_u128(&row, "shares")?,
            current_price: get_decimal(&row, "current_price")?,
            out_supply: get_u128(&row, "out_supply")?,
            in_supply: get_u128(&row, "in_supply")?,
            last_updated: TimeMs::new(row.try_get::<i64, _>("last_updated_ms")?),
        };
        Ok(Some(StreamState { phase, ledger }))
    }

    /// Whether `owner` already spent permit `nonce`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_permit_used(&self, owner: &Address, nonce: u64) -> Result<bool, sqlx::Error> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT operation_id FROM permit_nonces WHERE owner = ? AND nonce = ?",
        )
        .bind(owner.as_str())
        .bind(nonce.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Apply every write of one operation in a single transaction.
    ///
    /// The permit nonce is claimed first, then the transfer batch is applied
    /// against balances and journaled, then the position and the stream state
    /// are written. Any failure rolls the whole transaction back.
    ///
    /// # Errors
    /// `NonceUsed` for a replayed permit, `InsufficientBalance` for an
    /// overdraft, `Store` for any database failure.
    pub async fn commit_operation(&self, commit: OperationCommit<'_>) -> Result<(), CommitError> {
        let operation_id = commit.operation_id;
        let mut tx = self.pool.begin().await?;

        if let Some((owner, nonce)) = commit.permit_nonce {
            let claimed = sqlx::query(
                r#"
                INSERT INTO permit_nonces (owner, nonce, operation_id)
                VALUES (?, ?, ?)
                ON CONFLICT(owner, nonce) DO NOTHING
                "#,
            )
            .bind(owner.as_str())
            .bind(nonce.to_string())
            .bind(operation_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if claimed == 0 {
                return Err(AuthorizationError::NonceUsed(nonce).into());
            }
        }

        balances::apply_transfers(&mut tx, operation_id, commit.transfers).await?;
        if let Some((participant, position)) = commit.position {
            positions::upsert_position(&mut *tx, participant, position).await?;
        }
        upsert_stream_state(&mut *tx, commit.state).await?;
        tx.commit().await?;

        debug!(%operation_id, "Committed operation");
        Ok(())
    }
}

#[async_trait]
impl StreamStore for Repository {
    async fn load_state(&self) -> Result<Option<StreamState>, StoreError> {
        Ok(self.load_stream_state().await?)
    }

    async fn position(&self, participant: &Address) -> Result<Position, StoreError> {
        Ok(self.query_position(participant).await?.unwrap_or_default())
    }

    async fn permit_used(&self, owner: &Address, nonce: u64) -> Result<bool, StoreError> {
        Ok(self.query_permit_used(owner, nonce).await?)
    }

    async fn commit(&self, commit: OperationCommit<'_>) -> Result<(), CommitError> {
        self.commit_operation(commit).await
    }
}
