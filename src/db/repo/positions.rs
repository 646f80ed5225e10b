//! Participant positions.

use crate::domain::{Address, Position, TimeMs};
use crate::store::{PositionStore, StoreError};
use async_trait::async_trait;
use sqlx::{Executor, Row, Sqlite};

use super::{get_decimal, get_u128, Repository};

/// Fetch one position, or `None` for a participant never stored.
pub(super) async fn select_position<'e, E>(
    executor: E,
    participant: &Address,
) -> Result<Option<Position>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT in_balance, shares, dist_index, spent_in, purchased, last_updated_ms, exited_at_ms
        FROM positions
        WHERE participant = ?
        "#,
    )
    .bind(participant.as_str())
    .fetch_optional(executor)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(Position {
        in_balance: get_u128(&row, "in_balance")?,
        shares: get_u128(&row, "shares")?,
        index: get_decimal(&row, "dist_index")?,
        spent_in: get_u128(&row, "spent_in")?,
        purchased: get_u128(&row, "purchased")?,
        last_updated: TimeMs::new(row.try_get::<i64, _>("last_updated_ms")?),
        exited_at: row
            .try_get::<Option<i64>, _>("exited_at_ms")?
            .map(TimeMs::new),
    }))
}

/// Insert or replace a position.
pub(super) async fn upsert_position<'e, E>(
    executor: E,
    participant: &Address,
    position: &Position,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO positions (
            participant, in_balance, shares, dist_index, spent_in, purchased,
            last_updated_ms, exited_at_ms
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(participant) DO UPDATE SET
            in_balance = excluded.in_balance,
            shares = excluded.shares,
            dist_index = excluded.dist_index,
            spent_in = excluded.spent_in,
            purchased = excluded.purchased,
            last_updated_ms = excluded.last_updated_ms,
            exited_at_ms = excluded.exited_at_ms
        "#,
    )
    .bind(participant.as_str())
    .bind(position.in_balance.to_string())
    .bind(position.shares.to_string())
    .bind(position.index.to_canonical_string())
    .bind(position.spent_in.to_string())
    .bind(position.purchased.to_string())
    .bind(position.last_updated.as_ms())
    .bind(position.exited_at.map(|t| t.as_ms()))
    .execute(executor)
    .await?;
    Ok(())
}

impl Repository {
    /// Fetch one position, or `None` for a participant never stored.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn query_position(&self, participant: &Address) -> Result<Option<Position>, sqlx::Error> {
        select_position(&self.pool, participant).await
    }
}

/// Standalone position access. Stream operations write positions through
/// [`Repository::commit_operation`] instead.
#[async_trait]
impl PositionStore for Repository {
    async fn get(&self, participant: &Address) -> Result<Position, StoreError> {
        Ok(self.query_position(participant).await?.unwrap_or_default())
    }

    async fn put(&self, participant: &Address, position: &Position) -> Result<(), StoreError> {
        Ok(upsert_position(&self.pool, participant, position).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::Decimal;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_position_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Repository::new(init_db(&db_path).await.unwrap());
        let alice = Address::new("alice");

        assert_eq!(repo.get(&alice).await.unwrap(), Position::default());

        let mut position = Position {
            in_balance: 625,
            shares: 1000,
            index: Decimal::from_ratio(3, 8).unwrap(),
            spent_in: 375,
            purchased: 375,
            last_updated: TimeMs::new(250),
            exited_at: None,
        };
        repo.put(&alice, &position).await.unwrap();
        assert_eq!(repo.get(&alice).await.unwrap(), position);

        position.exited_at = Some(TimeMs::new(400));
        repo.put(&alice, &position).await.unwrap();
        assert_eq!(repo.get(&alice).await.unwrap(), position);
    }
}
