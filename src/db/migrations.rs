//! Database initialization and schema migrations.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Tables every initialized database must contain.
pub const REQUIRED_TABLES: [&str; 6] = [
    "balances",
    "credits",
    "permit_nonces",
    "positions",
    "stream_state",
    "transfers",
];

/// Open (creating if needed) the SQLite database and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_connection(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;

    info!(path = db_path, "Database ready");
    Ok(pool)
}

/// Apply `schema.sql`. Every statement is idempotent.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let schema_sql = include_str!("schema.sql");

    let mut tx = pool.begin().await?;
    for statement in schema_sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    let missing = missing_tables(pool).await?;
    if !missing.is_empty() {
        return Err(sqlx::Error::Protocol(format!(
            "schema incomplete, missing tables: {}",
            missing.join(", ")
        )));
    }

    debug!("Schema migrations applied");
    Ok(())
}

async fn missing_tables(pool: &SqlitePool) -> Result<Vec<&'static str>, sqlx::Error> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await?;
    let present: Vec<String> = rows
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()?;
    Ok(REQUIRED_TABLES
        .into_iter()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect())
}

/// Per-connection pragmas: foreign keys, WAL journaling, a busy timeout.
async fn configure_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode reports the mode actually in effect.
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.try_get(0)?;
    debug!(journal_mode = %journal_mode, "SQLite connection configured");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fresh_db() -> (TempDir, String, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("nested")
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (temp_dir, db_path, pool)
    }

    #[tokio::test]
    async fn test_init_db_creates_file_and_tables() {
        let (_dir, db_path, pool) = fresh_db().await;
        assert!(Path::new(&db_path).exists());
        assert!(missing_tables(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let (_dir, _path, pool) = fresh_db().await;
        run_migrations(&pool)
            .await
            .expect("second migration run failed");
        assert!(missing_tables(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_state_is_single_row() {
        let (_dir, _path, pool) = fresh_db().await;
        let insert = "INSERT INTO stream_state (id, phase, out_remaining, dist_index, spent_in, shares, \
                      current_price, out_supply, in_supply, last_updated_ms, saved_at) \
                      VALUES (?, 'waiting', '1', '0', '0', '0', '0', '1', '0', 0, 'now')";
        sqlx::query(insert).bind(1).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).bind(2).execute(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_transfer_sequence_unique_per_operation() {
        let (_dir, _path, pool) = fresh_db().await;
        let insert = "INSERT INTO transfers (operation_id, seq, asset, from_account, to_account, amount, recorded_at_ms) \
                      VALUES ('op', 0, 'native', 'a', 'b', '1', 0)";
        sqlx::query(insert).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).execute(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_pragmas_configured() {
        let (_dir, _path, pool) = fresh_db().await;
        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert!(
            matches!(result.0.as_str(), "wal" | "delete"),
            "unexpected journal_mode: {}",
            result.0
        );
    }
}
