/// Recipe create, update and delete
///
/// Each write runs in three steps:
///
/// 1. Access check (updates only): the recipe must belong to the requester.
/// 2. Nested names are reconciled into the requester's tags and ingredients.
///    This happens outside the transaction; see [`crate::reconcile`].
/// 3. One transaction writes the recipe row and replaces each association
///    set that the request mentioned. Readers see either the old sets or the
///    new ones, never a mix.
///
/// An association list that is absent from an update leaves that set alone;
/// an empty list clears it.

use sqlx::PgPool;
use tracing::info;

use crate::auth::authorization::{authorize_recipe_mutation, AuthzError};
use crate::auth::middleware::AuthContext;
use crate::models::attribute::{Attribute, AttributeKind, PgAttributeStore};
use crate::models::recipe::{NewRecipe, Recipe, RecipeChanges, RecipeDetail};
use crate::reconcile::{reconcile, ReconcileError};

/// A recipe to create, with the names of its tags and ingredients
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub recipe: NewRecipe,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

/// Changes to an existing recipe
///
/// `None` association lists are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    pub changes: RecipeChanges,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

/// Errors from recipe writes
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The requester owns no such recipe
    #[error("Recipe not found")]
    NotFound,

    /// A nested name could not be resolved
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthzError> for WriteError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotFound => WriteError::NotFound,
            AuthzError::DatabaseError(e) => WriteError::Database(e),
        }
    }
}

async fn resolve(
    pool: &PgPool,
    kind: AttributeKind,
    auth: &AuthContext,
    names: &[String],
) -> Result<Vec<Attribute>, ReconcileError> {
    let store = PgAttributeStore::new(pool.clone(), kind);
    let mut resolved = reconcile(&store, auth.user_id, names).await?;
    resolved.sort_by_key(|a| a.id);
    Ok(resolved)
}

fn ids(attributes: &[Attribute]) -> Vec<i64> {
    attributes.iter().map(|a| a.id).collect()
}

/// Creates a recipe owned by the requester
///
/// # Errors
///
/// `WriteError::Reconcile` if a name can't be resolved, `WriteError::Database`
/// if the insert fails. Tags and ingredients created before a failed insert
/// are kept.
pub async fn create_recipe(
    pool: &PgPool,
    auth: &AuthContext,
    draft: RecipeDraft,
) -> Result<RecipeDetail, WriteError> {
    let tags = resolve(pool, AttributeKind::Tag, auth, &draft.tags).await?;
    let ingredients = resolve(pool, AttributeKind::Ingredient, auth, &draft.ingredients).await?;

    let mut tx = pool.begin().await?;

    let recipe = Recipe::insert(&mut tx, auth.user_id, &draft.recipe).await?;
    Attribute::replace_for_recipe(&mut tx, AttributeKind::Tag, recipe.id, auth.user_id, &ids(&tags))
        .await?;
    Attribute::replace_for_recipe(
        &mut tx,
        AttributeKind::Ingredient,
        recipe.id,
        auth.user_id,
        &ids(&ingredients),
    )
    .await?;

    tx.commit().await?;

    info!(
        recipe_id = recipe.id,
        user_id = %auth.user_id,
        tags = tags.len(),
        ingredients = ingredients.len(),
        "Recipe created"
    );

    Ok(RecipeDetail {
        recipe,
        tags,
        ingredients,
    })
}

/// Updates one of the requester's recipes
///
/// # Errors
///
/// `WriteError::NotFound` if the recipe doesn't exist, belongs to someone
/// else, or is deleted while the update is in flight.
pub async fn update_recipe(
    pool: &PgPool,
    auth: &AuthContext,
    recipe_id: i64,
    update: RecipeUpdate,
) -> Result<RecipeDetail, WriteError> {
    authorize_recipe_mutation(pool, recipe_id, auth).await?;

    let tags = match &update.tags {
        Some(names) => Some(resolve(pool, AttributeKind::Tag, auth, names).await?),
        None => None,
    };
    let ingredients = match &update.ingredients {
        Some(names) => Some(resolve(pool, AttributeKind::Ingredient, auth, names).await?),
        None => None,
    };

    let mut tx = pool.begin().await?;

    // The recipe may have been deleted since the access check
    Recipe::lock_for_update(&mut tx, recipe_id, auth.user_id)
        .await?
        .ok_or(WriteError::NotFound)?;

    Recipe::apply_changes(&mut tx, recipe_id, auth.user_id, &update.changes)
        .await?
        .ok_or(WriteError::NotFound)?;

    if let Some(tags) = &tags {
        Attribute::replace_for_recipe(&mut tx, AttributeKind::Tag, recipe_id, auth.user_id, &ids(tags))
            .await?;
    }
    if let Some(ingredients) = &ingredients {
        Attribute::replace_for_recipe(
            &mut tx,
            AttributeKind::Ingredient,
            recipe_id,
            auth.user_id,
            &ids(ingredients),
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        recipe_id,
        user_id = %auth.user_id,
        tags_replaced = tags.is_some(),
        ingredients_replaced = ingredients.is_some(),
        "Recipe updated"
    );

    Recipe::find_detail(pool, recipe_id, auth.user_id)
        .await?
        .ok_or(WriteError::NotFound)
}

/// Deletes one of the requester's recipes
///
/// Its tags and ingredients are kept.
///
/// # Errors
///
/// `WriteError::NotFound` if the requester owns no such recipe.
pub async fn delete_recipe(pool: &PgPool, auth: &AuthContext, recipe_id: i64) -> Result<(), WriteError> {
    if !Recipe::delete_by_owner(pool, recipe_id, auth.user_id).await? {
        return Err(WriteError::NotFound);
    }

    info!(recipe_id, user_id = %auth.user_id, "Recipe deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_not_found_maps_to_not_found() {
        assert!(matches!(WriteError::from(AuthzError::NotFound), WriteError::NotFound));
    }

    #[test]
    fn test_default_update_touches_nothing() {
        let update = RecipeUpdate::default();
        assert!(update.changes.is_empty());
        assert!(update.tags.is_none());
        assert!(update.ingredients.is_none());
    }
}
