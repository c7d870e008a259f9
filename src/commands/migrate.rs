//! Migrate command - Database migration management.

use crate::cli::args::{MigrateAction, MigrateArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::Database;

/// Execute the migrate command
pub async fn execute(args: MigrateArgs, config: Config) -> AppResult<()> {
    // Manual control: connect without applying pending migrations
    let db = Database::open(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;

    match args.action {
        MigrateAction::Up => {
            tracing::info!("Applying pending migrations");
            db.run_migrations().await?;
            tracing::info!("Migrations applied");
        }
        MigrateAction::Down { steps } => {
            tracing::info!(steps, "Rolling back migrations");
            db.rollback_migrations(steps).await?;
            tracing::info!("Rollback complete");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            let pending = status.iter().filter(|m| !m.applied).count();
            for migration in &status {
                let label = if migration.applied { "applied" } else { "pending" };
                println!("{:<8} {}", label, migration.name);
            }
            println!("{} migration(s), {} pending", status.len(), pending);
        }
        MigrateAction::Fresh => {
            tracing::warn!("Dropping all tables and re-running every migration");
            db.fresh_migrations().await?;
            tracing::info!("Fresh migrations complete");
        }
    }

    Ok(())
}
