/// Bearer-token authentication
///
/// Every endpoint except `/health` requires `Authorization: Bearer <jwt>`.
/// The token is validated, then the user it names is loaded; unknown and
/// inactive users are rejected the same way as a bad token. On success the
/// API layer stores an [`AuthContext`] in the request extensions.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use recipebox_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}", auth.user_id)
/// }
/// ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::User;

/// The authenticated requester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID; the owner of everything the request touches
    pub user_id: Uuid,
}

impl AuthContext {
    /// Creates a context for `user_id`
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Authentication failures
///
/// Everything except `Database` maps to 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header
    #[error("Missing authorization header")]
    MissingCredentials,

    /// Authorization header present but not a bearer token
    #[error("Expected Bearer token")]
    InvalidScheme,

    /// Token failed validation
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    /// Token is valid but the user doesn't exist or is disabled
    #[error("User not found or inactive")]
    UnknownUser,

    /// User lookup failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Extracts the bearer token from the Authorization header
///
/// The scheme is matched case-insensitively.
///
/// # Errors
///
/// - `AuthError::MissingCredentials` if the header is absent or unreadable
/// - `AuthError::InvalidScheme` for any other scheme or an empty token
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::InvalidScheme),
    }
}

/// Authenticates a request from its headers
///
/// # Errors
///
/// Any [`AuthError`]; see the variants.
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_token(token, secret)?;

    match User::find_by_id(pool, claims.sub).await? {
        Some(user) if user.is_active => Ok(AuthContext::new(user.id)),
        Some(_) => {
            debug!(user_id = %claims.sub, "Rejected token for inactive user");
            Err(AuthError::UnknownUser)
        }
        None => {
            debug!(user_id = %claims.sub, "Rejected token for unknown user");
            Err(AuthError::UnknownUser)
        }
    }
}
