#![allow(dead_code)]

/// Common test utilities for API integration tests
///
/// - Test database setup (skipped when `DATABASE_URL` is unset)
/// - Test user creation and JWT token generation
/// - Request helpers that drive the router in-process

use axum::body::Body;
use axum::http::{Request, StatusCode};
use recipebox_api::app::{build_router, AppState};
use recipebox_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig};
use recipebox_shared::auth::jwt::{create_token, Claims};
use recipebox_shared::db::migrations::run_migrations;
use recipebox_shared::models::user::{CreateUser, User};
use serde_json::Value;
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// A signed-in user against a migrated database
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub user: User,
    pub jwt_token: String,
}

/// Builds a config pointing at `database_url`
pub fn test_config(database_url: &str) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            max_connections: 5,
            run_migrations: true,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
    }
}

impl TestContext {
    /// Creates a context with a fresh user, or None without a database
    pub async fn new() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = test_config(&url);

        let db = PgPool::connect(&url).await.expect("Failed to connect to DATABASE_URL");
        run_migrations(&db).await.expect("Failed to run migrations");

        let app = build_router(AppState::new(db.clone(), config.clone()));
        let (user, jwt_token) = create_user(&db).await;

        Some(Self {
            db,
            app,
            config,
            user,
            jwt_token,
        })
    }

    /// Another signed-in user sharing this database and router
    pub async fn other_user(&self) -> (User, String) {
        create_user(&self.db).await
    }

    /// Returns the authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Sends a request as this context's user
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send_as(&self.app, &self.jwt_token, method, uri, body).await
    }

    /// Removes the user; their recipes, tags and ingredients cascade
    pub async fn cleanup(&self) {
        User::delete(&self.db, self.user.id)
            .await
            .expect("Failed to delete test user");
    }
}

/// Creates a user and a token for them
pub async fn create_user(db: &PgPool) -> (User, String) {
    let user = User::create(
        db,
        CreateUser {
            email: format!("cook-{}@example.com", Uuid::new_v4()),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$test".to_string(),
            name: "Test Cook".to_string(),
        },
    )
    .await
    .expect("Failed to create user");

    let token = create_token(&Claims::new(user.id), JWT_SECRET).expect("Failed to sign token");
    (user, token)
}

/// Sends a request with `token` and returns the status and JSON body
///
/// Empty bodies come back as `Value::Null`.
pub async fn send_as(
    app: &axum::Router,
    token: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .call(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("Expected JSON, got {}: {}", status, String::from_utf8_lossy(&bytes))
        })
    };

    (status, json)
}

/// IDs from a JSON array of objects
pub fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|item| item["id"].as_i64().expect("expected an id"))
        .collect()
}

/// Names from a JSON array of objects
pub fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|item| item["name"].as_str().expect("expected a name").to_string())
        .collect()
}
