//! Category set port.

use async_trait::async_trait;

use super::SaveResult;
use crate::domain::expense::Category;
use crate::domain::foundation::{CategoryId, DomainError, UserId};

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Seeds the default categories if the owner has none yet.
    async fn ensure_defaults(&self, owner: &UserId) -> Result<(), DomainError>;

    /// All categories for the owner, defaults first, then by creation.
    async fn list(&self, owner: &UserId) -> Result<Vec<Category>, DomainError>;

    /// Inserts a category. Names are unique per owner ignoring case, and a
    /// clash reports `AlreadyExists` instead of failing.
    async fn add(&self, category: &Category) -> Result<SaveResult, DomainError>;

    /// Removes a custom category. Returns false if nothing was deleted.
    ///
    /// # Errors
    ///
    /// - `ProtectedCategory` if the id belongs to a default category
    async fn delete(&self, owner: &UserId, id: &CategoryId) -> Result<bool, DomainError>;
}
