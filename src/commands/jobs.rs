//! Jobs command - Email queue management.
//!
//! - `work`: deliver queued OTP emails
//! - `list`: job counts by status
//! - `clear`: remove failed jobs
//!
//! ```bash
//! baas-api jobs work
//! baas-api jobs list
//! baas-api jobs clear
//! ```

use apalis::prelude::*;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, JOB_NAME_EMAIL};
use crate::errors::{AppError, AppResult};
use crate::jobs::{connect_email_queue, email_job_handler};

const QUEUE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') AS exists";
const JOB_COUNTS_SQL: &str = "SELECT status::text AS status, COUNT(*)::bigint AS count FROM apalis.jobs GROUP BY status";
const CLEAR_FAILED_SQL: &str = "DELETE FROM apalis.jobs WHERE status = 'Failed'";

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
    }
}

/// Process email jobs until Ctrl+C.
async fn run_worker(config: &Config) -> AppResult<()> {
    let storage = connect_email_queue(config).await?;

    let worker = WorkerBuilder::new(JOB_NAME_EMAIL)
        .backend(storage)
        .build_fn(email_job_handler);

    tracing::info!("Email worker started. Press Ctrl+C to stop.");

    tokio::select! {
        result = Monitor::new().register(worker).run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker");
        }
    }

    tracing::info!("Email worker stopped");
    Ok(())
}

/// Connect to the queue database; None when no worker has created the tables yet.
async fn queue_db(config: &Config) -> AppResult<Option<DatabaseConnection>> {
    let db = Database::connect(&config.database_url).await?;

    let exists = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            QUEUE_EXISTS_SQL.to_string(),
        ))
        .await?
        .and_then(|row| row.try_get::<bool>("", "exists").ok())
        .unwrap_or(false);

    Ok(exists.then_some(db))
}

async fn list_jobs(config: &Config) -> AppResult<()> {
    let Some(db) = queue_db(config).await? else {
        println!("Job queue not initialized. Start the server or `jobs work` first.");
        return Ok(());
    };

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            JOB_COUNTS_SQL.to_string(),
        ))
        .await?;

    let mut counts = [("Pending", 0i64), ("Running", 0), ("Done", 0), ("Failed", 0), ("Killed", 0)];
    for row in rows {
        if let (Ok(status), Ok(count)) = (
            row.try_get::<String>("", "status"),
            row.try_get::<i64>("", "count"),
        ) {
            if let Some(slot) = counts.iter_mut().find(|(name, _)| *name == status) {
                slot.1 = count;
            }
        }
    }

    println!("\n=== Email Queue ===");
    for (name, count) in counts {
        println!("{:<8} {}", format!("{}:", name), count);
    }
    println!("===================\n");

    Ok(())
}

async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let Some(db) = queue_db(config).await? else {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    };

    let result = db
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            CLEAR_FAILED_SQL.to_string(),
        ))
        .await?;

    println!("Cleared {} failed job(s).", result.rows_affected());
    Ok(())
}
