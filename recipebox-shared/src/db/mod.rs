/// Database layer for Recipebox
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// Models live in the `models` module at the crate root.

pub mod migrations;
pub mod pool;

/// PostgreSQL error code for `unique_violation`
pub const UNIQUE_VIOLATION: &str = "23505";

/// Returns the constraint name when `err` is a unique violation
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(db_err.constraint().unwrap_or("unique").to_string())
        }
        _ => None,
    }
}
