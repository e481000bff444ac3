/// Middleware for the API server
///
/// - `security`: response security headers
///
/// Bearer authentication is wired up in `app` because it needs the
/// application state.

pub mod security;
