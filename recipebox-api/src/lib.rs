//! # Recipebox API Server Library
//!
//! HTTP surface for Recipebox: recipes, tags and ingredients, each visible
//! only to the user who owns them.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: response security headers
//! - `routes`: route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
