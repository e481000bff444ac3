/// Database models for Recipebox
///
/// Each model is a plain row struct plus associated functions that take the
/// pool (or a transaction connection) as their first argument.
///
/// # Models
///
/// - `user`: accounts that own everything else
/// - `recipe`: recipes and their batch-loaded associations
/// - `attribute`: tags and ingredients, sharing one row type
///
/// Apart from `User` lookups, every function is scoped to an owner; there is
/// no way to read or modify a recipe, tag or ingredient without naming whose
/// it is.
///
/// # Example
///
/// ```no_run
/// use recipebox_shared::models::attribute::{Attribute, AttributeKind};
/// use recipebox_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(owner: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::new("postgresql://localhost/recipebox", 5)).await?;
///
/// let tag = Attribute::create(&pool, AttributeKind::Tag, owner, "Vegan").await?;
/// let tags = Attribute::list_by_owner(&pool, AttributeKind::Tag, owner, false).await?;
/// assert!(tags.iter().any(|t| t.id == tag.id));
/// # Ok(())
/// # }
/// ```

pub mod attribute;
pub mod recipe;
pub mod user;
