//! Postgres-backed job queue connection.

use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use super::EmailJob;
use crate::config::{Config, JOB_QUEUE_MAX_CONNECTIONS};
use crate::errors::{AppError, AppResult};

/// Connect to the email queue, creating the apalis tables on first use.
pub async fn connect_email_queue(config: &Config) -> AppResult<PostgresStorage<EmailJob>> {
    let pool = PgPoolOptions::new()
        .max_connections(JOB_QUEUE_MAX_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect job queue: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    Ok(PostgresStorage::new(pool))
}
