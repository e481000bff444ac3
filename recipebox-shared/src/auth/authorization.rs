/// Access control for recipes, tags and ingredients
///
/// # Permission Model
///
/// There are no roles: a user may do anything to what they own and nothing
/// to anything else. Two rules follow from that:
///
/// 1. **Not-found, never forbidden.** Lookups are scoped to the requester in
///    SQL (`WHERE id = $1 AND user_id = $2`), so another user's entity is
///    reported exactly like a missing one and its existence never leaks.
/// 2. **Allow-listed fields.** Write payloads are cut down to the fields a
///    client may set before anything else looks at them. Attempts to change
///    `user`, `owner` or `id` are dropped silently (and logged at debug).
///
/// # Example
///
/// ```no_run
/// use recipebox_shared::auth::authorization::{authorize_recipe_mutation, AuthzError};
/// use recipebox_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), AuthzError> {
/// let recipe = authorize_recipe_mutation(&pool, 42, &auth).await?;
/// assert_eq!(recipe.user_id, auth.user_id);
/// # Ok(())
/// # }
/// ```

use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::debug;

use super::middleware::AuthContext;
use crate::models::attribute::{Attribute, AttributeKind};
use crate::models::recipe::Recipe;

/// Fields a client may set on a recipe
pub const RECIPE_MUTABLE_FIELDS: &[&str] = &[
    "title",
    "time_minutes",
    "price",
    "description",
    "link",
    "tags",
    "ingredients",
];

/// Fields a client may set on a tag or ingredient
pub const ATTRIBUTE_MUTABLE_FIELDS: &[&str] = &["name"];

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The requester owns no entity with this ID
    #[error("Not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Returns the recipe if the requester may modify it
///
/// # Errors
///
/// `AuthzError::NotFound` if the recipe doesn't exist or belongs to someone
/// else.
pub async fn authorize_recipe_mutation(
    pool: &PgPool,
    recipe_id: i64,
    auth: &AuthContext,
) -> Result<Recipe, AuthzError> {
    Recipe::find_by_id_and_owner(pool, recipe_id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotFound)
}

/// Returns the tag or ingredient if the requester may modify it
///
/// # Errors
///
/// `AuthzError::NotFound` if it doesn't exist or belongs to someone else.
pub async fn authorize_attribute_mutation(
    pool: &PgPool,
    kind: AttributeKind,
    id: i64,
    auth: &AuthContext,
) -> Result<Attribute, AuthzError> {
    Attribute::find_by_id_and_owner(pool, kind, id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotFound)
}

/// Removes every key not in `allowed` from a write payload
///
/// Returns the dropped keys, sorted, so callers can log or test them.
pub fn retain_mutable_fields(payload: &mut Map<String, Value>, allowed: &[&str]) -> Vec<String> {
    let mut dropped: Vec<String> = payload
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .cloned()
        .collect();
    dropped.sort();

    for key in &dropped {
        payload.remove(key);
    }

    if !dropped.is_empty() {
        debug!(fields = ?dropped, "Dropped read-only fields from payload");
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_owner_change_is_dropped() {
        let mut payload = object(json!({
            "title": "Soup",
            "user": "7b0c5d36-6f0e-4a43-9a3e-6f7f6a5e8b11",
            "id": 99
        }));

        let dropped = retain_mutable_fields(&mut payload, RECIPE_MUTABLE_FIELDS);

        assert_eq!(dropped, vec!["id".to_string(), "user".to_string()]);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload["title"], "Soup");
    }

    #[test]
    fn test_all_recipe_fields_kept() {
        let mut payload = object(json!({
            "title": "Soup",
            "time_minutes": 10,
            "price": "5.00",
            "description": "",
            "link": "",
            "tags": [],
            "ingredients": []
        }));

        assert!(retain_mutable_fields(&mut payload, RECIPE_MUTABLE_FIELDS).is_empty());
        assert_eq!(payload.len(), RECIPE_MUTABLE_FIELDS.len());
    }

    #[test]
    fn test_attribute_allow_list() {
        let mut payload = object(json!({"name": "Vegan", "owner": 3}));

        let dropped = retain_mutable_fields(&mut payload, ATTRIBUTE_MUTABLE_FIELDS);

        assert_eq!(dropped, vec!["owner".to_string()]);
        assert_eq!(payload["name"], "Vegan");
    }

    #[test]
    fn test_authz_error_display() {
        assert_eq!(AuthzError::NotFound.to_string(), "Not found");
    }
}
