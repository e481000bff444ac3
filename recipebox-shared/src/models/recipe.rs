/// Recipe model and database operations
///
/// Every query takes the owner's user ID and filters on it; there is no
/// unscoped lookup. Associations to tags and ingredients live in
/// `recipe_tags` / `recipe_ingredients` and are loaded in batches (see
/// [`Recipe::load_details`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE recipes (
///     id BIGSERIAL PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     time_minutes INTEGER NOT NULL CHECK (time_minutes > 0),
///     price NUMERIC(5, 2) NOT NULL CHECK (price > 0),
///     description TEXT NOT NULL DEFAULT '',
///     link VARCHAR(255) NOT NULL DEFAULT '',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use recipebox_shared::models::recipe::{Recipe, RecipeFilter};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), sqlx::Error> {
/// let recipes = Recipe::list_by_owner(&pool, owner, &RecipeFilter::default()).await?;
/// let details = Recipe::load_details(&pool, recipes).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::attribute::{Attribute, AttributeKind};

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price, description, link, created_at, updated_at";

/// Recipe row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    /// Row ID
    pub id: i64,

    /// Owner, fixed at creation
    pub user_id: Uuid,

    /// Title (1-255 characters)
    pub title: String,

    /// Preparation time in minutes
    pub time_minutes: i32,

    /// Price, NUMERIC(5,2)
    pub price: Decimal,

    /// Free-form description
    pub description: String,

    /// External link
    pub link: String,

    /// When the recipe was created
    pub created_at: DateTime<Utc>,

    /// When the recipe was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
}

/// Field changes for an existing recipe
///
/// Only these columns can be changed; the owner cannot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub link: Option<String>,
}

impl RecipeChanges {
    /// True if no column would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.time_minutes.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.link.is_none()
    }
}

/// List filters
///
/// `None` means "don't filter"; `Some` keeps recipes linked to any of the
/// given IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_ids: Option<Vec<i64>>,
    pub ingredient_ids: Option<Vec<i64>>,
}

/// A recipe with its tags and ingredients
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

impl Recipe {
    /// Inserts a recipe on the caller's connection (usually a transaction)
    pub async fn insert(
        conn: &mut PgConnection,
        owner: Uuid,
        data: &NewRecipe,
    ) -> Result<Self, sqlx::Error> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, description, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(&data.title)
        .bind(data.time_minutes)
        .bind(data.price)
        .bind(&data.description)
        .bind(&data.link)
        .fetch_one(conn)
        .await?;

        Ok(recipe)
    }

    /// Finds a recipe by ID, scoped to its owner
    ///
    /// Returns None both when the recipe doesn't exist and when someone
    /// else owns it.
    pub async fn find_by_id_and_owner(
        pool: &PgPool,
        id: i64,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await?;

        Ok(recipe)
    }

    /// Locks the owner's recipe row for the rest of the transaction
    ///
    /// Returns None if the recipe was deleted (or never belonged to `owner`).
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: i64,
        owner: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(conn)
        .await?;

        Ok(recipe)
    }

    /// Applies `changes` to the owner's recipe
    ///
    /// Always bumps `updated_at`, even when `changes` is empty (an update
    /// that only touches associations still modifies the recipe).
    pub async fn apply_changes(
        conn: &mut PgConnection,
        id: i64,
        owner: Uuid,
        changes: &RecipeChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE recipes SET updated_at = NOW()");
        let mut bind_count = 2;

        for (column, present) in [
            ("title", changes.title.is_some()),
            ("time_minutes", changes.time_minutes.is_some()),
            ("price", changes.price.is_some()),
            ("description", changes.description.is_some()),
            ("link", changes.link.is_some()),
        ] {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(
            " WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Recipe>(&query).bind(id).bind(owner);

        if let Some(title) = &changes.title {
            q = q.bind(title);
        }
        if let Some(time_minutes) = changes.time_minutes {
            q = q.bind(time_minutes);
        }
        if let Some(price) = changes.price {
            q = q.bind(price);
        }
        if let Some(description) = &changes.description {
            q = q.bind(description);
        }
        if let Some(link) = &changes.link {
            q = q.bind(link);
        }

        let recipe = q.fetch_optional(conn).await?;

        Ok(recipe)
    }

    /// Deletes the owner's recipe
    ///
    /// Association rows cascade; the tags and ingredients themselves stay.
    /// Returns false if the owner has no such recipe.
    pub async fn delete_by_owner(pool: &PgPool, id: i64, owner: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the owner's recipes, newest first
    pub async fn list_by_owner(
        pool: &PgPool,
        owner: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes r
            WHERE r.user_id = $1
              AND ($2::BIGINT[] IS NULL OR EXISTS (
                  SELECT 1 FROM recipe_tags rt
                  WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)
              ))
              AND ($3::BIGINT[] IS NULL OR EXISTS (
                  SELECT 1 FROM recipe_ingredients ri
                  WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)
              ))
            ORDER BY r.created_at DESC, r.id DESC
            "#
        ))
        .bind(owner)
        .bind(filter.tag_ids.as_deref())
        .bind(filter.ingredient_ids.as_deref())
        .fetch_all(pool)
        .await?;

        Ok(recipes)
    }

    /// Attaches tags and ingredients to each recipe, keeping the input order
    pub async fn load_details(
        pool: &PgPool,
        recipes: Vec<Recipe>,
    ) -> Result<Vec<RecipeDetail>, sqlx::Error> {
        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();

        let mut tags = group_by_recipe(Attribute::list_for_recipes(pool, AttributeKind::Tag, &ids).await?);
        let mut ingredients =
            group_by_recipe(Attribute::list_for_recipes(pool, AttributeKind::Ingredient, &ids).await?);

        Ok(recipes
            .into_iter()
            .map(|recipe| RecipeDetail {
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                recipe,
            })
            .collect())
    }

    /// Loads one of the owner's recipes with its tags and ingredients
    pub async fn find_detail(
        pool: &PgPool,
        id: i64,
        owner: Uuid,
    ) -> Result<Option<RecipeDetail>, sqlx::Error> {
        let Some(recipe) = Self::find_by_id_and_owner(pool, id, owner).await? else {
            return Ok(None);
        };

        Ok(Self::load_details(pool, vec![recipe]).await?.pop())
    }
}

fn group_by_recipe(
    rows: Vec<super::attribute::LinkedAttribute>,
) -> HashMap<i64, Vec<Attribute>> {
    let mut grouped: HashMap<i64, Vec<Attribute>> = HashMap::new();
    for row in rows {
        grouped.entry(row.recipe_id).or_default().push(row.attribute);
    }
    grouped
}
