/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: HS256 token creation and validation
/// - [`middleware`]: bearer-token authentication producing an `AuthContext`
/// - [`authorization`]: owner-scoped access checks and write allow-lists
///
/// # Example
///
/// ```
/// use recipebox_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes";
/// let token = create_token(&Claims::new(Uuid::new_v4()), secret)?;
/// validate_token(&token, secret)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
