//! Transfer journal reads. Rows are written by the operation that moved
//! the funds, see `balances.rs`.

use crate::assets::Transfer;
use crate::domain::{Address, AssetId, TimeMs};
use sqlx::Row;
use uuid::Uuid;

use super::{get_u128, Repository};

/// One journaled transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub operation_id: Uuid,
    pub seq: i64,
    pub transfer: Transfer,
    pub recorded_at: TimeMs,
}

impl Repository {
    /// Transfers sent or received by `account`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn query_transfers(&self, account: &Address) -> Result<Vec<TransferRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT operation_id, seq, asset, from_account, to_account, amount, recorded_at_ms
            FROM transfers
            WHERE from_account = ? OR to_account = ?
            ORDER BY id ASC
            "#,
        )
        .bind(account.as_str())
        .bind(account.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<TransferRecord, sqlx::Error> {
                let operation_id: String = row.try_get("operation_id")?;
                let operation_id = Uuid::parse_str(&operation_id)
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok(TransferRecord {
                    operation_id,
                    seq: row.try_get("seq")?,
                    transfer: Transfer::new(
                        AssetId::from(row.try_get::<String, _>("asset")?),
                        Address::new(row.try_get::<String, _>("from_account")?),
                        Address::new(row.try_get::<String, _>("to_account")?),
                        get_u128(&row, "amount")?,
                    ),
                    recorded_at: TimeMs::new(row.try_get("recorded_at_ms")?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::db::repo::balances::apply_transfers;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_journal_batch_and_query() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Repository::new(init_db(&db_path).await.unwrap());

        let alice = Address::new("alice");
        let stream = Address::new("stream");
        repo.credit("seed", &AssetId::Native, &alice, 1000).await.unwrap();
        let op = Uuid::new_v4();
        let batch = vec![
            Transfer::new(AssetId::Native, alice.clone(), Address::new("fees"), 10),
            Transfer::new(AssetId::Native, alice.clone(), stream.clone(), 0),
            Transfer::new(AssetId::Native, alice.clone(), stream.clone(), 990),
        ];
        let mut conn = repo.pool.acquire().await.unwrap();
        apply_transfers(&mut conn, op, &batch).await.unwrap();
        drop(conn);

        let records = repo.query_transfers(&alice).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.operation_id == op));
        assert_eq!(records[0].seq, 0);
        assert_eq!(records[1].transfer.amount, 990);

        let fees = repo.query_transfers(&Address::new("fees")).await.unwrap();
        assert_eq!(fees.len(), 1);
        assert!(repo.query_transfers(&Address::new("bob")).await.unwrap().is_empty());
    }
}
