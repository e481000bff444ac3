/// Health check endpoint
///
/// The only route that doesn't need a token.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "migrations": {"applied_migrations": 2, "latest_version": 20250101000100, "is_up_to_date": true},
///   "pool": {"active_connections": 1, "idle_connections": 4, "total_connections": 5}
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use recipebox_shared::db::{
    migrations::{get_migration_status, MigrationStatus},
    pool::{get_pool_stats, health_check as database_health_check, PoolStats},
};
use serde::Serialize;
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// Absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationStatus>,

    pub pool: PoolStats,
}

/// Health check handler
///
/// Always answers 200; a broken database shows up as `degraded`.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match database_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    let migrations = if connected {
        get_migration_status(&state.db).await.ok()
    } else {
        None
    };

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        migrations,
        pool: get_pool_stats(&state.db),
    }))
}
