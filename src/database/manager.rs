use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the store layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A versioned write lost against a concurrent writer too many times
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Idempotent schema for the three collections. Students are written by the directory
/// service; this service only reads them.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        gender TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS students_owner_active_idx ON students (owner_id, is_active)",
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        student_id UUID NOT NULL,
        payment_date DATE NOT NULL,
        payment_time TEXT NOT NULL,
        payment_mode TEXT NOT NULL,
        utr_number TEXT,
        payment_month TEXT NOT NULL,
        amount NUMERIC(12, 2) NOT NULL CHECK (amount >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS payments_owner_date_idx ON payments (owner_id, payment_date DESC)",
    "CREATE INDEX IF NOT EXISTS payments_student_month_idx ON payments (student_id, payment_month)",
    "CREATE INDEX IF NOT EXISTS payments_month_owner_idx ON payments (payment_month, owner_id)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'other',
        student_ids UUID[] NOT NULL DEFAULT '{}',
        student_names TEXT[] NOT NULL DEFAULT '{}',
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        period TEXT,
        item_count BIGINT,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS notifications_owner_created_idx ON notifications (owner_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS notifications_owner_read_idx ON notifications (owner_id, is_read)",
    // At most one overdue document per operator and period
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS notifications_overdue_period_key
        ON notifications (owner_id, period) WHERE kind = 'overdue_payment'
    "#,
];

/// Connection pool setup and schema bootstrap
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the pool described by the config
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool ({} max connections)", config.max_connections);
        Ok(pool)
    }

    /// Create tables and indexes if missing
    pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Database schema is up to date ({} statements)", SCHEMA.len());
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
