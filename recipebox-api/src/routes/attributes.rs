/// Tag and ingredient endpoints
///
/// Tags and ingredients share these handlers; the router attaches an
/// `Extension<AttributeKind>` to each set of routes to pick the table.
///
/// # Endpoints
///
/// - `GET /tags/` - List, name descending (`?assigned_only=1`)
/// - `POST /tags/` - Create
/// - `GET /tags/:id/` - Detail
/// - `PUT|PATCH /tags/:id/` - Rename
/// - `DELETE /tags/:id/` - Delete (recipes keep existing, minus the link)
///
/// and the same under `/ingredients/`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use recipebox_shared::{
    auth::{
        authorization::{authorize_attribute_mutation, ATTRIBUTE_MUTABLE_FIELDS},
        middleware::AuthContext,
    },
    models::attribute::{Attribute, AttributeKind},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::payload::{clean_name, path_id, FieldReader};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};

/// Tag or ingredient representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeResponse {
    pub id: i64,
    pub name: String,
}

impl From<Attribute> for AttributeResponse {
    fn from(attribute: Attribute) -> Self {
        Self {
            id: attribute.id,
            name: attribute.name,
        }
    }
}

/// List query
#[derive(Debug, Default, Deserialize)]
pub struct AttributeListQuery {
    /// `1` limits the list to entries attached to at least one recipe
    pub assigned_only: Option<String>,
}

fn parse_flag(field: &str, raw: Option<&str>) -> ApiResult<bool> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(false);
    };

    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => other.parse::<i64>().map(|value| value != 0).map_err(|_| {
            ApiError::ValidationError(vec![ValidationErrorDetail::new(
                field,
                "Expected 0 or 1.",
            )])
        }),
    }
}

/// Reads and cleans the `name` field
fn read_name(body: Result<Json<Value>, JsonRejection>, required: bool) -> ApiResult<Option<String>> {
    let mut reader = FieldReader::new(body, ATTRIBUTE_MUTABLE_FIELDS)?;

    let raw: Option<String> = if required {
        reader.required("name")
    } else {
        reader.optional("name")
    };

    let name = match raw.as_deref().map(clean_name) {
        Some(Ok(name)) => Some(name),
        Some(Err(message)) => {
            reader.error("name", message);
            None
        }
        None => None,
    };

    reader.finish()?;
    Ok(name)
}

fn name_conflict(kind: AttributeKind, name: &str) -> ApiError {
    ApiError::Conflict(format!("You already have a {} named {:?}.", kind, name))
}

fn map_write_error(kind: AttributeKind, name: &str, err: sqlx::Error) -> ApiError {
    if kind.is_name_conflict(&err) {
        return name_conflict(kind, name);
    }
    err.into()
}

/// List the requester's tags or ingredients
///
/// # Endpoint
///
/// ```text
/// GET /tags/?assigned_only=1
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: `assigned_only` isn't a number or boolean
pub async fn list_attributes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    Query(query): Query<AttributeListQuery>,
) -> ApiResult<Json<Vec<AttributeResponse>>> {
    let assigned_only = parse_flag("assigned_only", query.assigned_only.as_deref())?;

    let attributes = Attribute::list_by_owner(&state.db, kind, auth.user_id, assigned_only).await?;

    debug!(kind = %kind, user_id = %auth.user_id, count = attributes.len(), assigned_only, "Listed attributes");

    Ok(Json(attributes.into_iter().map(AttributeResponse::from).collect()))
}

/// Create a tag or ingredient
///
/// # Endpoint
///
/// ```text
/// POST /tags/
/// Content-Type: application/json
///
/// {"name": "Vegan"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing or blank name
/// - `409 Conflict`: the requester already has one with this name
pub async fn create_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AttributeResponse>)> {
    let Some(name) = read_name(body, true)? else {
        return Err(ApiError::BadRequest("name is required".to_string()));
    };

    let attribute = Attribute::create(&state.db, kind, auth.user_id, &name)
        .await
        .map_err(|e| map_write_error(kind, &name, e))?;

    info!(kind = %kind, id = attribute.id, user_id = %auth.user_id, "Attribute created");

    Ok((StatusCode::CREATED, Json(attribute.into())))
}

/// Tag or ingredient detail
///
/// # Errors
///
/// - `404 Not Found`: no such entry, or it belongs to someone else
pub async fn get_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<AttributeResponse>> {
    let id = path_id(path)?;
    let attribute = Attribute::find_by_id_and_owner(&state.db, kind, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found.".to_string()))?;

    Ok(Json(attribute.into()))
}

async fn rename(
    state: AppState,
    auth: AuthContext,
    kind: AttributeKind,
    id: i64,
    body: Result<Json<Value>, JsonRejection>,
    required: bool,
) -> ApiResult<Json<AttributeResponse>> {
    let current = authorize_attribute_mutation(&state.db, kind, id, &auth).await?;

    let Some(name) = read_name(body, required)? else {
        return Ok(Json(current.into()));
    };

    let attribute = Attribute::rename(&state.db, kind, id, auth.user_id, &name)
        .await
        .map_err(|e| map_write_error(kind, &name, e))?
        .ok_or_else(|| ApiError::NotFound("Not found.".to_string()))?;

    info!(kind = %kind, id, user_id = %auth.user_id, "Attribute renamed");

    Ok(Json(attribute.into()))
}

/// Rename (PUT: `name` required)
///
/// # Errors
///
/// - `400 Bad Request`: missing or blank name
/// - `404 Not Found`: no such entry, or it belongs to someone else
/// - `409 Conflict`: the new name is already taken
pub async fn replace_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<AttributeResponse>> {
    let id = path_id(path)?;
    rename(state, auth, kind, id, body, true).await
}

/// Rename (PATCH: an empty body changes nothing)
pub async fn patch_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<AttributeResponse>> {
    let id = path_id(path)?;
    rename(state, auth, kind, id, body, false).await
}

/// Delete a tag or ingredient
///
/// Recipes that used it stay, without the link.
///
/// # Errors
///
/// - `404 Not Found`: no such entry, or it belongs to someone else
pub async fn delete_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(kind): Extension<AttributeKind>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = path_id(path)?;
    if !Attribute::delete_by_owner(&state.db, kind, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Not found.".to_string()));
    }

    info!(kind = %kind, id, user_id = %auth.user_id, "Attribute deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_response_hides_owner() {
        let response = AttributeResponse::from(Attribute {
            id: 7,
            user_id: Uuid::new_v4(),
            name: "Vegan".to_string(),
            created_at: Utc::now(),
        });

        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"id": 7, "name": "Vegan"}));
    }

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag("assigned_only", None).unwrap());
        assert!(parse_flag("assigned_only", Some("1")).unwrap());
        assert!(!parse_flag("assigned_only", Some("0")).unwrap());
        assert!(parse_flag("assigned_only", Some("true")).unwrap());
        assert!(matches!(
            parse_flag("assigned_only", Some("yes please")),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_read_name_trims() {
        let name = read_name(Ok(Json(json!({"name": "  Vegan  ", "user": 1}))), true).unwrap();
        assert_eq!(name.as_deref(), Some("Vegan"));
    }

    #[test]
    fn test_read_name_required_for_put() {
        assert!(matches!(
            read_name(Ok(Json(json!({}))), true),
            Err(ApiError::ValidationError(_))
        ));
        assert_eq!(read_name(Ok(Json(json!({}))), false).unwrap(), None);
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            read_name(Ok(Json(json!({"name": "   "}))), true),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_nul_in_name_rejected() {
        assert!(matches!(
            read_name(Ok(Json(json!({"name": "x\u{0}"}))), true),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_conflict_message_names_kind() {
        match name_conflict(AttributeKind::Ingredient, "Salt") {
            ApiError::Conflict(message) => assert!(message.contains("ingredient")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
