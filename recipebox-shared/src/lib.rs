//! # Recipebox Shared Library
//!
//! Persistence and business rules for the Recipebox API: every recipe, tag
//! and ingredient belongs to one user, and nothing here reads or writes an
//! entity without naming its owner.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and embedded migrations
//! - `models`: users, recipes, tags and ingredients
//! - `auth`: JWT validation, request authentication, access checks
//! - `reconcile`: get-or-create of nested tag/ingredient names
//! - `recipe_writes`: transactional recipe create/update/delete

pub mod auth;
pub mod db;
pub mod models;
pub mod recipe_writes;
pub mod reconcile;

/// Current version of the Recipebox shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
