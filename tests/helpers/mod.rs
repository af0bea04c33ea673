//! Shared fixtures for integration tests: a throwaway migrated SQLite
//! database plus small value builders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Spins up a fresh SQLite database with the schema applied, backed by a
/// temp directory that is deleted when the returned `TempDir` drops.
pub async fn create_test_sqlite_db() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let pool = SqlitePool::connect(&db_url).await.expect("failed to open test database");
    sqlx::migrate!("./migrations").run(&pool).await.expect("failed to run migrations");

    (pool, temp_dir)
}

pub fn test_timestamp() -> DateTime<Utc> {
    Utc::now()
}

pub fn test_decimal(value: &str) -> Decimal {
    value.parse().expect("invalid decimal literal in test")
}

pub fn assert_decimal_approx_eq(left: Decimal, right: Decimal, epsilon: Decimal) {
    let diff = (left - right).abs();
    assert!(diff <= epsilon, "decimals not approximately equal: {left} vs {right} (diff: {diff})");
}
