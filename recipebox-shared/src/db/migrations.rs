/// Database migration runner
///
/// Migrations live in `migrations/` at the workspace root and are embedded
/// into the binary at compile time with `sqlx::migrate!`.

use serde::Serialize;
use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{debug, info, warn};

/// Migrations compiled into the binary
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Migration status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied
    pub applied_migrations: usize,

    /// Latest applied migration version (timestamp)
    pub latest_version: Option<i64>,

    /// Whether every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Runs all pending migrations
///
/// sqlx takes an advisory lock while migrating, so concurrent callers (test
/// binaries, multiple replicas starting together) serialize safely.
///
/// # Errors
///
/// Returns an error if a migration fails or the database is unreachable.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(embedded = MIGRATOR.iter().count(), "Starting database migrations");

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reports how many migrations have been applied
///
/// # Errors
///
/// Returns an error if the migrations table cannot be queried.
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(status_from(0, None));
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version)
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    debug!(
        applied_migrations = count,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    Ok(status_from(usize::try_from(count).unwrap_or(0), latest_version))
}

fn status_from(applied: usize, latest_version: Option<i64>) -> MigrationStatus {
    let newest_embedded = MIGRATOR.iter().map(|m| m.version).max();

    MigrationStatus {
        applied_migrations: applied,
        latest_version,
        is_up_to_date: newest_embedded.is_some() && latest_version >= newest_embedded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().count() >= 2);
    }

    #[test]
    fn test_status_without_migrations_is_stale() {
        let status = status_from(0, None);
        assert_eq!(status.applied_migrations, 0);
        assert!(!status.is_up_to_date);
    }

    #[test]
    fn test_status_at_newest_version_is_current() {
        let newest = MIGRATOR.iter().map(|m| m.version).max();
        let status = status_from(MIGRATOR.iter().count(), newest);
        assert!(status.is_up_to_date);
    }
}
