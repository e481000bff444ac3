/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use recipebox_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = recipebox_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::get,
    Extension, Router,
};
use recipebox_shared::{auth::middleware::authenticate, models::attribute::AttributeKind};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler through the `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Secret used to validate bearer tokens
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                        # public
/// ├── /recipes/                          # GET list, POST create
/// │   └── /recipes/:id/                  # GET, PUT, PATCH, DELETE
/// ├── /tags/                             # GET list, POST create
/// │   └── /tags/:id/                     # GET, PUT, PATCH, DELETE
/// └── /ingredients/                      # GET list, POST create
///     └── /ingredients/:id/              # GET, PUT, PATCH, DELETE
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Bearer authentication (everything but `/health`)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{health, recipes};

    let health_routes = Router::new().route("/health", get(health::health_check));

    let recipe_routes = Router::new()
        .route(
            "/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/:id/",
            get(recipes::get_recipe)
                .put(recipes::replace_recipe)
                .patch(recipes::patch_recipe)
                .delete(recipes::delete_recipe),
        );

    let owned_routes = Router::new()
        .merge(recipe_routes)
        .merge(attribute_routes("/tags", AttributeKind::Tag))
        .merge(attribute_routes("/ingredients", AttributeKind::Ingredient))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    Router::new()
        .merge(health_routes)
        .merge(owned_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Tag or ingredient routes under `prefix`
fn attribute_routes(prefix: &str, kind: AttributeKind) -> Router<AppState> {
    use crate::routes::attributes;

    Router::new()
        .route(
            &format!("{}/", prefix),
            get(attributes::list_attributes).post(attributes::create_attribute),
        )
        .route(
            &format!("{}/:id/", prefix),
            get(attributes::get_attribute)
                .put(attributes::replace_attribute)
                .patch(attributes::patch_attribute)
                .delete(attributes::delete_attribute),
        )
        .layer(Extension(kind))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Bearer authentication middleware layer
///
/// Validates the token, loads the user it names, then injects an
/// `AuthContext` into the request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.db, state.jwt_secret(), req.headers()).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
