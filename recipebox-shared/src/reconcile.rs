/// Get-or-create resolution of nested tag and ingredient names
///
/// Recipe payloads name their tags and ingredients (`[{"name": "Vegan"}]`)
/// rather than referencing IDs. [`reconcile`] turns such a list into the
/// requester's entities, creating the missing ones.
///
/// # Guarantees
///
/// - The result holds one entity per distinct name, in first-occurrence
///   order.
/// - Running it twice with the same names creates nothing the second time.
/// - Only the owner's entities are ever matched; names are compared exactly
///   (case-sensitive) after trimming.
///
/// # Races
///
/// Two requests may try to create the same name at once. The database's
/// `(user_id, name)` constraint lets exactly one insert win; the loser sees a
/// unique violation and looks the name up again. If that second lookup still
/// finds nothing the call fails with [`ReconcileError::Unresolved`].
///
/// Created entities are committed immediately. If the recipe write that
/// triggered them fails afterwards, they stay behind as unattached tags or
/// ingredients.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::unique_violation;
use crate::models::attribute::{Attribute, AttributeKind};

/// Errors from an [`AttributeStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The owner already has an entity with this name
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classifies an insert failure
    pub fn from_insert(err: sqlx::Error) -> Self {
        match unique_violation(&err) {
            Some(constraint) => StoreError::UniqueViolation(constraint),
            None => StoreError::Database(err),
        }
    }
}

/// Errors from [`reconcile`]
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Insert lost a uniqueness race and the winner's row can't be found
    #[error("Could not resolve {kind} {name:?}")]
    Unresolved { kind: AttributeKind, name: String },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owner-scoped lookup and insert for one attribute kind
///
/// Implemented by `PgAttributeStore` in production; tests use an in-memory
/// store.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Kind of entity this store manages
    fn kind(&self) -> AttributeKind;

    /// Finds the owner's entity with exactly this name
    async fn find_by_name(&self, owner: Uuid, name: &str) -> Result<Option<Attribute>, StoreError>;

    /// Inserts a new entity
    ///
    /// Must return `StoreError::UniqueViolation` when the name is taken.
    async fn insert(&self, owner: Uuid, name: &str) -> Result<Attribute, StoreError>;
}

/// Trims names and drops blanks and duplicates, keeping first occurrences
pub fn normalize_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Finds the owner's entity named `name`, creating it if absent
///
/// # Errors
///
/// `ReconcileError::Unresolved` if the insert hits a unique violation and the
/// retry lookup still comes back empty; `ReconcileError::Store` otherwise.
pub async fn resolve_or_create<S>(
    store: &S,
    owner: Uuid,
    name: &str,
) -> Result<Attribute, ReconcileError>
where
    S: AttributeStore + ?Sized,
{
    if let Some(existing) = store.find_by_name(owner, name).await? {
        return Ok(existing);
    }

    match store.insert(owner, name).await {
        Ok(created) => {
            debug!(kind = %store.kind(), id = created.id, "Created attribute from nested name");
            Ok(created)
        }
        Err(StoreError::UniqueViolation(constraint)) => {
            debug!(kind = %store.kind(), %constraint, "Lost creation race, retrying lookup");

            store
                .find_by_name(owner, name)
                .await?
                .ok_or_else(|| {
                    warn!(kind = %store.kind(), owner = %owner, "Attribute vanished after unique violation");
                    ReconcileError::Unresolved {
                        kind: store.kind(),
                        name: name.to_string(),
                    }
                })
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves a list of names into the owner's entities
///
/// Names are normalized with [`normalize_names`] first; an empty list
/// resolves to an empty set.
///
/// # Example
///
/// ```no_run
/// use recipebox_shared::models::attribute::{AttributeKind, PgAttributeStore};
/// use recipebox_shared::reconcile::reconcile;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgAttributeStore::new(pool, AttributeKind::Tag);
/// let tags = reconcile(&store, owner, &["Spicy", "Swallow", "Spicy"]).await?;
/// assert_eq!(tags.len(), 2);
/// # Ok(())
/// # }
/// ```
pub async fn reconcile<S, N>(
    store: &S,
    owner: Uuid,
    names: &[N],
) -> Result<Vec<Attribute>, ReconcileError>
where
    S: AttributeStore + ?Sized,
    N: AsRef<str>,
{
    let names = normalize_names(names);
    let mut resolved = Vec::with_capacity(names.len());

    for name in &names {
        resolved.push(resolve_or_create(store, owner, name).await?);
    }

    Ok(resolved)
}
