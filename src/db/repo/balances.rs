//! Account balances and the transfer journal writes.
//!
//! Funds enter the service only through [`Repository::credit`]; every other
//! balance change is a journaled transfer applied inside an operation's
//! transaction.

use crate::assets::{Transfer, TransferError};
use crate::domain::{Address, AssetId, TimeMs};
use sqlx::{Executor, Row, Sqlite, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::{decode_err, Repository};

async fn select_balance<'e, E>(
    executor: E,
    asset: &AssetId,
    account: &Address,
) -> Result<u128, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let raw: Option<String> =
        sqlx::query_scalar("SELECT amount FROM balances WHERE asset = ? AND account = ?")
            .bind(asset.to_string())
            .bind(account.as_str())
            .fetch_optional(executor)
            .await?;
    match raw {
        Some(raw) => raw.parse::<u128>().map_err(|e| decode_err("amount", e)),
        None => Ok(0),
    }
}

async fn store_balance(
    conn: &mut SqliteConnection,
    asset: &AssetId,
    account: &Address,
    amount: u128,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO balances (asset, account, amount)
        VALUES (?, ?, ?)
        ON CONFLICT(asset, account) DO UPDATE SET amount = excluded.amount
        "#,
    )
    .bind(asset.to_string())
    .bind(account.as_str())
    .bind(amount.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Apply a transfer batch on `conn` and journal it under `operation_id`.
///
/// Zero-amount transfers are skipped. An overdraft fails the whole batch;
/// the caller's transaction must then be rolled back.
pub(super) async fn apply_transfers(
    conn: &mut SqliteConnection,
    operation_id: Uuid,
    transfers: &[Transfer],
) -> Result<usize, TransferError> {
    let recorded_at = TimeMs::now();
    let mut seq: i64 = 0;
    for transfer in transfers.iter().filter(|t| !t.is_noop()) {
        let available = select_balance(&mut *conn, &transfer.asset, &transfer.from).await?;
        let remaining = available.checked_sub(transfer.amount).ok_or_else(|| {
            TransferError::InsufficientBalance {
                asset: transfer.asset.clone(),
                owner: transfer.from.clone(),
                required: transfer.amount,
                available,
            }
        })?;
        store_balance(&mut *conn, &transfer.asset, &transfer.from, remaining).await?;

        let current = select_balance(&mut *conn, &transfer.asset, &transfer.to).await?;
        let credited = current
            .checked_add(transfer.amount)
            .ok_or_else(|| TransferError::Backend("balance overflow".to_string()))?;
        store_balance(&mut *conn, &transfer.asset, &transfer.to, credited).await?;

        sqlx::query(
            r#"
            INSERT INTO transfers (operation_id, seq, asset, from_account, to_account, amount, recorded_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(operation_id.to_string())
        .bind(seq)
        .bind(transfer.asset.to_string())
        .bind(transfer.from.as_str())
        .bind(transfer.to.as_str())
        .bind(transfer.amount.to_string())
        .bind(recorded_at.as_ms())
        .execute(&mut *conn)
        .await?;
        seq += 1;
    }

    if seq > 0 {
        debug!(%operation_id, count = seq, "Journaled transfers");
    }
    Ok(seq as usize)
}

impl Repository {
    /// Current balance of `account` in `asset`; zero when never funded.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored amount is malformed.
    pub async fn balance(&self, asset: &AssetId, account: &Address) -> Result<u128, sqlx::Error> {
        select_balance(&self.pool, asset, account).await
    }

    /// Fund `account` with `amount` of `asset`.
    ///
    /// Credits are keyed by `reference`: replaying a reference changes
    /// nothing and returns `false`.
    ///
    /// # Errors
    /// Returns an error if the transaction fails or the balance would overflow.
    pub async fn credit(
        &self,
        reference: &str,
        asset: &AssetId,
        account: &Address,
        amount: u128,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO credits (reference, asset, account, amount, credited_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(reference) DO NOTHING
            "#,
        )
        .bind(reference)
        .bind(asset.to_string())
        .bind(account.as_str())
        .bind(amount.to_string())
        .bind(TimeMs::now().as_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            debug!(reference, "Credit already applied");
            return Ok(false);
        }

        let current = select_balance(&mut *tx, asset, account).await?;
        let credited = current
            .checked_add(amount)
            .ok_or_else(|| decode_err("amount", "balance overflow"))?;
        store_balance(&mut tx, asset, account, credited).await?;
        tx.commit().await?;

        info!(reference, %asset, %account, amount = %amount, "Credited account");
        Ok(true)
    }

    /// Recorded credits to `account`, oldest first, as `(reference, asset, amount)`.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn query_credits(
        &self,
        account: &Address,
    ) -> Result<Vec<(String, AssetId, u128)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT reference, asset, amount
            FROM credits
            WHERE account = ?
            ORDER BY credited_at_ms ASC, reference ASC
            "#,
        )
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(String, AssetId, u128), sqlx::Error> {
                let amount: String = row.try_get("amount")?;
                Ok((
                    row.try_get("reference")?,
                    AssetId::from(row.try_get::<String, _>("asset")?),
                    amount.parse::<u128>().map_err(|e| decode_err("amount", e))?,
                ))
            })
            .collect()
    }
}
