/// Recipe endpoints
///
/// All endpoints require a bearer token and only ever see the requester's
/// recipes; another user's recipe ID answers 404.
///
/// # Endpoints
///
/// - `GET /recipes/` - List recipes, newest first (`?tags=1,2&ingredients=3`)
/// - `POST /recipes/` - Create a recipe
/// - `GET /recipes/:id/` - Recipe detail
/// - `PUT /recipes/:id/` - Update; `title`, `time_minutes` and `price` required
/// - `PATCH /recipes/:id/` - Partial update
/// - `DELETE /recipes/:id/` - Delete (tags and ingredients are kept)
///
/// Tags and ingredients are written by name:
///
/// ```json
/// {
///   "title": "Thai curry",
///   "time_minutes": 30,
///   "price": "8.50",
///   "tags": [{"name": "Spicy"}, {"name": "Dinner"}],
///   "ingredients": [{"name": "Coconut milk"}]
/// }
/// ```
///
/// Missing names are created for the requester. In updates, a present list
/// replaces the recipe's set (`[]` clears it) and an absent list leaves it
/// alone.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use recipebox_shared::{
    auth::{authorization::RECIPE_MUTABLE_FIELDS, middleware::AuthContext},
    models::recipe::{NewRecipe, Recipe, RecipeChanges, RecipeDetail, RecipeFilter},
    recipe_writes::{self, RecipeDraft, RecipeUpdate},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use validator::Validate;

use super::attributes::AttributeResponse;
use super::payload::{clean_name, path_id, FieldReader};
use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
};

/// Recipe as it appears in lists
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<AttributeResponse>,
    pub ingredients: Vec<AttributeResponse>,
}

/// Recipe detail: the summary plus the description
#[derive(Debug, Serialize)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
}

impl RecipeDetailResponse {
    fn from_detail(detail: RecipeDetail) -> Self {
        let description = detail.recipe.description.clone();
        Self {
            summary: RecipeSummary::from(detail),
            description,
        }
    }
}

impl From<RecipeDetail> for RecipeSummary {
    fn from(detail: RecipeDetail) -> Self {
        let RecipeDetail {
            recipe,
            tags,
            ingredients,
        } = detail;

        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags: tags.into_iter().map(AttributeResponse::from).collect(),
            ingredients: ingredients.into_iter().map(AttributeResponse::from).collect(),
        }
    }
}

/// List filters, comma-separated IDs
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// A nested `{"name": ...}` entry
#[derive(Debug, Deserialize)]
struct NameEntry {
    name: String,
}

/// Scalar recipe fields after type checks
#[derive(Debug, Default, Validate)]
struct RecipeFields {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    title: Option<String>,

    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    time_minutes: Option<i32>,

    price: Option<Decimal>,

    description: Option<String>,

    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    link: Option<String>,
}

/// How strictly a write payload is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// POST: core fields required
    Create,
    /// PUT: core fields required, others optional
    Replace,
    /// PATCH: everything optional
    Partial,
}

#[derive(Debug, Default)]
struct RecipePayload {
    fields: RecipeFields,
    tags: Option<Vec<String>>,
    ingredients: Option<Vec<String>>,
}

fn check_price(price: Decimal) -> Result<(), &'static str> {
    if price <= Decimal::ZERO {
        return Err("Ensure this value is greater than 0.");
    }
    if price.normalize().scale() > 2 {
        return Err("Ensure that there are no more than 2 decimal places.");
    }
    // NUMERIC(5,2) tops out at 999.99
    if price >= Decimal::ONE_THOUSAND {
        return Err("Ensure that there are no more than 5 digits in total.");
    }
    Ok(())
}

fn read_names(reader: &mut FieldReader, field: &str) -> Option<Vec<String>> {
    let entries: Vec<NameEntry> = reader.optional(field)?;

    let mut names = Vec::with_capacity(entries.len());
    let mut failed = false;
    for entry in entries {
        match clean_name(&entry.name) {
            Ok(name) => names.push(name),
            Err(message) => {
                reader.error(field, format!("name: {}", message));
                failed = true;
            }
        }
    }

    (!failed).then_some(names)
}

fn read_payload(body: Result<Json<Value>, JsonRejection>, mode: WriteMode) -> ApiResult<RecipePayload> {
    let mut reader = FieldReader::new(body, RECIPE_MUTABLE_FIELDS)?;

    let fields = if mode == WriteMode::Partial {
        RecipeFields {
            title: reader.optional("title"),
            time_minutes: reader.optional("time_minutes"),
            price: reader.optional("price"),
            description: reader.optional("description"),
            link: reader.optional("link"),
        }
    } else {
        RecipeFields {
            title: reader.required("title"),
            time_minutes: reader.required("time_minutes"),
            price: reader.required("price"),
            description: reader.optional("description"),
            link: reader.optional("link"),
        }
    };

    if let Err(e) = fields.validate() {
        reader.extend(validation_details(&e));
    }
    if let Some(Err(message)) = fields.price.map(check_price) {
        reader.error("price", message);
    }
    reader.reject_null_characters("title", fields.title.as_deref());
    reader.reject_null_characters("description", fields.description.as_deref());
    reader.reject_null_characters("link", fields.link.as_deref());

    let tags = read_names(&mut reader, "tags");
    let ingredients = read_names(&mut reader, "ingredients");

    reader.finish()?;

    Ok(RecipePayload {
        fields,
        tags,
        ingredients,
    })
}

fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>, ValidationErrorDetail> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    raw.split(',')
        .map(|id| id.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| ValidationErrorDetail::new(field, "Expected a comma-separated list of IDs."))
}

impl RecipeListQuery {
    fn into_filter(self) -> ApiResult<RecipeFilter> {
        let tag_ids = parse_id_list("tags", self.tags.as_deref());
        let ingredient_ids = parse_id_list("ingredients", self.ingredients.as_deref());

        match (tag_ids, ingredient_ids) {
            (Ok(tag_ids), Ok(ingredient_ids)) => Ok(RecipeFilter {
                tag_ids,
                ingredient_ids,
            }),
            (tags, ingredients) => Err(ApiError::ValidationError(
                [tags.err(), ingredients.err()].into_iter().flatten().collect(),
            )),
        }
    }
}

/// List recipes
///
/// # Endpoint
///
/// ```text
/// GET /recipes/?tags=1,2&ingredients=3
/// Authorization: Bearer <jwt_token>
/// ```
///
/// With `tags`, only recipes carrying any of those tags are listed; likewise
/// for `ingredients`. Both filters combine with AND.
///
/// # Errors
///
/// - `400 Bad Request`: malformed ID list
/// - `401 Unauthorized`: missing or invalid token
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RecipeListQuery>,
) -> ApiResult<Json<Vec<RecipeSummary>>> {
    let filter = query.into_filter()?;

    let recipes = Recipe::list_by_owner(&state.db, auth.user_id, &filter).await?;
    let details = Recipe::load_details(&state.db, recipes).await?;

    debug!(user_id = %auth.user_id, count = details.len(), "Listed recipes");

    Ok(Json(details.into_iter().map(RecipeSummary::from).collect()))
}

/// Create a recipe
///
/// # Endpoint
///
/// ```text
/// POST /recipes/
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {"title": "Soup", "time_minutes": 20, "price": "4.50", "tags": [{"name": "Lunch"}]}
/// ```
///
/// # Response
///
/// `201 Created` with the recipe detail.
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or malformed JSON
/// - `401 Unauthorized`: missing or invalid token
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RecipeDetailResponse>)> {
    let payload = read_payload(body, WriteMode::Create)?;

    let RecipeFields {
        title: Some(title),
        time_minutes: Some(time_minutes),
        price: Some(price),
        description,
        link,
    } = payload.fields
    else {
        return Err(ApiError::BadRequest(
            "title, time_minutes and price are required".to_string(),
        ));
    };

    let draft = RecipeDraft {
        recipe: NewRecipe {
            title,
            time_minutes,
            price,
            description: description.unwrap_or_default(),
            link: link.unwrap_or_default(),
        },
        tags: payload.tags.unwrap_or_default(),
        ingredients: payload.ingredients.unwrap_or_default(),
    };

    let detail = recipe_writes::create_recipe(&state.db, &auth, draft).await?;

    Ok((StatusCode::CREATED, Json(RecipeDetailResponse::from_detail(detail))))
}

/// Recipe detail
///
/// # Errors
///
/// - `404 Not Found`: no such recipe, or it belongs to someone else
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<RecipeDetailResponse>> {
    let id = path_id(path)?;
    let detail = Recipe::find_detail(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found.".to_string()))?;

    Ok(Json(RecipeDetailResponse::from_detail(detail)))
}

async fn update(
    state: AppState,
    auth: AuthContext,
    id: i64,
    body: Result<Json<Value>, JsonRejection>,
    mode: WriteMode,
) -> ApiResult<Json<RecipeDetailResponse>> {
    let payload = read_payload(body, mode)?;
    let fields = payload.fields;

    let update = RecipeUpdate {
        changes: RecipeChanges {
            title: fields.title,
            time_minutes: fields.time_minutes,
            price: fields.price,
            description: fields.description,
            link: fields.link,
        },
        tags: payload.tags,
        ingredients: payload.ingredients,
    };

    let detail = recipe_writes::update_recipe(&state.db, &auth, id, update).await?;

    Ok(Json(RecipeDetailResponse::from_detail(detail)))
}

/// Full update
///
/// `title`, `time_minutes` and `price` are required; optional fields and
/// association lists that are left out keep their current values.
///
/// # Errors
///
/// - `400 Bad Request`: validation failed
/// - `404 Not Found`: no such recipe, or it belongs to someone else
pub async fn replace_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RecipeDetailResponse>> {
    let id = path_id(path)?;
    update(state, auth, id, body, WriteMode::Replace).await
}

/// Partial update
///
/// # Errors
///
/// - `400 Bad Request`: validation failed
/// - `404 Not Found`: no such recipe, or it belongs to someone else
pub async fn patch_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RecipeDetailResponse>> {
    let id = path_id(path)?;
    update(state, auth, id, body, WriteMode::Partial).await
}

/// Delete a recipe
///
/// # Response
///
/// `204 No Content`. The recipe's tags and ingredients are kept.
///
/// # Errors
///
/// - `404 Not Found`: no such recipe, or it belongs to someone else
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = path_id(path)?;
    recipe_writes::delete_recipe(&state.db, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
