/// API route handlers
///
/// - `health`: health check (public)
/// - `recipes`: recipe CRUD with nested tags and ingredients
/// - `attributes`: tag and ingredient CRUD, shared by both kinds
/// - `payload`: allow-listed body parsing used by the write handlers

pub mod attributes;
pub mod health;
pub mod payload;
pub mod recipes;
