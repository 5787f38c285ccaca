use crate::{Labels, LookupError, RestrictionPolicy, StoreError, Subject};
use ahash::AHashSet as HashSet;

/// Lists the restrictions declared in a namespace.
#[async_trait::async_trait]
pub trait RestrictionSource: Send + Sync {
    /// Returns all and only the policies scoped to `namespace`.
    async fn list(&self, namespace: &str) -> Result<Vec<RestrictionPolicy>, StoreError>;
}

/// Resolves the groups a user belongs to.
#[async_trait::async_trait]
pub trait GroupResolver: Send + Sync {
    async fn groups_of(&self, user: &str) -> Result<HashSet<String>, StoreError>;
}

/// Fetches the labels of the identity object behind a subject.
///
/// Users and groups resolve to their own objects; a service account resolves
/// to the namespace that owns it.
#[async_trait::async_trait]
pub trait LabelLookup: Send + Sync {
    async fn labels_of(&self, subject: &Subject) -> Result<Labels, LookupError>;
}
