/// Tags and ingredients
///
/// Tags and ingredients have the same shape and lifecycle: a name, unique per
/// owner, that can be attached to any number of the owner's recipes. They
/// live in separate tables (separate namespaces), so every query is
/// parameterized by an [`AttributeKind`] that picks the tables.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id BIGSERIAL PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, name),
///     UNIQUE (id, user_id)
/// );
///
/// CREATE TABLE recipe_tags (
///     recipe_id BIGINT NOT NULL,
///     tag_id BIGINT NOT NULL,
///     user_id UUID NOT NULL,
///     PRIMARY KEY (recipe_id, tag_id),
///     FOREIGN KEY (recipe_id, user_id) REFERENCES recipes(id, user_id) ON DELETE CASCADE,
///     FOREIGN KEY (tag_id, user_id) REFERENCES tags(id, user_id) ON DELETE CASCADE
/// );
/// ```
///
/// `ingredients` / `recipe_ingredients` are identical with `ingredient_id`.
/// The composite foreign keys make it impossible to attach another owner's
/// tag to a recipe, whatever the application does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::db::unique_violation;
use crate::reconcile::{AttributeStore, StoreError};

/// Which attribute table a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Recipe tags (`tags`, `recipe_tags`)
    Tag,

    /// Recipe ingredients (`ingredients`, `recipe_ingredients`)
    Ingredient,
}

impl AttributeKind {
    /// Table holding the attributes themselves
    pub fn table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Association table linking attributes to recipes
    pub fn link_table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    /// Attribute id column in the association table
    pub fn link_column(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Singular human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag",
            AttributeKind::Ingredient => "ingredient",
        }
    }

    /// Name of the per-owner uniqueness constraint
    pub fn name_constraint(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags_user_id_name_key",
            AttributeKind::Ingredient => "ingredients_user_id_name_key",
        }
    }

    /// Whether `err` is the owner already having an attribute with that name
    pub fn is_name_conflict(&self, err: &sqlx::Error) -> bool {
        unique_violation(err).as_deref() == Some(self.name_constraint())
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag or ingredient row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attribute {
    /// Row ID
    pub id: i64,

    /// Owner
    pub user_id: Uuid,

    /// Name, unique per owner (case-sensitive)
    pub name: String,

    /// When the row was created
    pub created_at: DateTime<Utc>,
}

/// An attribute together with the recipe it is attached to
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkedAttribute {
    /// Recipe the attribute is attached to
    pub recipe_id: i64,

    /// The attribute itself
    #[sqlx(flatten)]
    pub attribute: Attribute,
}

impl Attribute {
    /// Inserts a new attribute
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on [`AttributeKind::name_constraint`] if
    /// the owner already has an attribute with this name.
    pub async fn create(
        pool: &PgPool,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2)
             RETURNING id, user_id, name, created_at",
            kind.table()
        );

        let attribute = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(name)
            .fetch_one(pool)
            .await?;

        debug!(kind = %kind, id = attribute.id, owner = %owner, "Created attribute");
        Ok(attribute)
    }

    /// Finds the owner's attribute with exactly this name
    pub async fn find_by_name(
        pool: &PgPool,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT id, user_id, name, created_at FROM {}
             WHERE user_id = $1 AND name = $2",
            kind.table()
        );

        sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Finds an attribute by ID, scoped to its owner
    ///
    /// Another owner's attribute is indistinguishable from a missing one.
    pub async fn find_by_id_and_owner(
        pool: &PgPool,
        kind: AttributeKind,
        id: i64,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT id, user_id, name, created_at FROM {}
             WHERE id = $1 AND user_id = $2",
            kind.table()
        );

        sqlx::query_as::<_, Attribute>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Lists the owner's attributes, name descending
    ///
    /// With `assigned_only`, only attributes attached to at least one recipe
    /// are returned (each once).
    pub async fn list_by_owner(
        pool: &PgPool,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT a.id, a.user_id, a.name, a.created_at
             FROM {table} a
             WHERE a.user_id = $1
               AND ($2 = FALSE OR EXISTS (
                   SELECT 1 FROM {link} l WHERE l.{column} = a.id
               ))
             ORDER BY a.name DESC",
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        );

        sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(assigned_only)
            .fetch_all(pool)
            .await
    }

    /// Renames an attribute, scoped to its owner
    ///
    /// Returns None if the owner has no such attribute.
    pub async fn rename(
        pool: &PgPool,
        kind: AttributeKind,
        id: i64,
        owner: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET name = $3
             WHERE id = $1 AND user_id = $2
             RETURNING id, user_id, name, created_at",
            kind.table()
        );

        sqlx::query_as::<_, Attribute>(&sql)
            .bind(id)
            .bind(owner)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Deletes an attribute, scoped to its owner
    ///
    /// Association rows go with it (`ON DELETE CASCADE`); recipes stay.
    pub async fn delete_by_owner(
        pool: &PgPool,
        kind: AttributeKind,
        id: i64,
        owner: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", kind.table());

        let result = sqlx::query(&sql).bind(id).bind(owner).execute(pool).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads the attributes attached to each of `recipe_ids`
    ///
    /// Rows come back ordered by recipe, then attribute ID.
    pub async fn list_for_recipes(
        pool: &PgPool,
        kind: AttributeKind,
        recipe_ids: &[i64],
    ) -> Result<Vec<LinkedAttribute>, sqlx::Error> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT l.recipe_id, a.id, a.user_id, a.name, a.created_at
             FROM {link} l
             JOIN {table} a ON a.id = l.{column}
             WHERE l.recipe_id = ANY($1)
             ORDER BY l.recipe_id, a.id",
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        );

        sqlx::query_as::<_, LinkedAttribute>(&sql)
            .bind(recipe_ids)
            .fetch_all(pool)
            .await
    }

    /// Replaces a recipe's association set with `attribute_ids`
    ///
    /// Runs on the caller's connection so the delete and the insert land in
    /// the caller's transaction.
    pub async fn replace_for_recipe(
        conn: &mut PgConnection,
        kind: AttributeKind,
        recipe_id: i64,
        owner: Uuid,
        attribute_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let delete = format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table());
        sqlx::query(&delete).bind(recipe_id).execute(&mut *conn).await?;

        if attribute_ids.is_empty() {
            return Ok(());
        }

        let insert = format!(
            "INSERT INTO {link} (recipe_id, {column}, user_id)
             SELECT $1, UNNEST($2::BIGINT[]), $3
             ON CONFLICT DO NOTHING",
            link = kind.link_table(),
            column = kind.link_column(),
        );
        sqlx::query(&insert)
            .bind(recipe_id)
            .bind(attribute_ids)
            .bind(owner)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

/// [`AttributeStore`] backed by PostgreSQL
///
/// Each call runs on its own pooled connection, so newly created attributes
/// are committed immediately and are not rolled back with a failed recipe
/// write.
#[derive(Debug, Clone)]
pub struct PgAttributeStore {
    pool: PgPool,
    kind: AttributeKind,
}

impl PgAttributeStore {
    /// Creates a store for one attribute kind
    pub fn new(pool: PgPool, kind: AttributeKind) -> Self {
        Self { pool, kind }
    }
}

#[async_trait]
impl AttributeStore for PgAttributeStore {
    fn kind(&self) -> AttributeKind {
        self.kind
    }

    async fn find_by_name(&self, owner: Uuid, name: &str) -> Result<Option<Attribute>, StoreError> {
        Ok(Attribute::find_by_name(&self.pool, self.kind, owner, name).await?)
    }

    async fn insert(&self, owner: Uuid, name: &str) -> Result<Attribute, StoreError> {
        Attribute::create(&self.pool, self.kind, owner, name)
            .await
            .map_err(StoreError::from_insert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_use_separate_tables() {
        assert_eq!(AttributeKind::Tag.table(), "tags");
        assert_eq!(AttributeKind::Ingredient.table(), "ingredients");
        assert_ne!(AttributeKind::Tag.link_table(), AttributeKind::Ingredient.link_table());
        assert_eq!(AttributeKind::Ingredient.link_column(), "ingredient_id");
        assert_eq!(AttributeKind::Tag.name_constraint(), "tags_user_id_name_key");
    }

    #[test]
    fn test_other_errors_are_not_name_conflicts() {
        assert!(!AttributeKind::Tag.is_name_conflict(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AttributeKind::Tag.to_string(), "tag");
        assert_eq!(AttributeKind::Ingredient.to_string(), "ingredient");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&AttributeKind::Ingredient).unwrap();
        assert_eq!(json, "\"ingredient\"");
    }
}
