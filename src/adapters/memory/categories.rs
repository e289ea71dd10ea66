use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::expense::Category;
use crate::domain::foundation::{CategoryId, DomainError, ErrorCode, UserId};
use crate::ports::{CategoryRepository, SaveResult};

#[derive(Debug, Clone, Default)]
pub struct InMemoryCategoryRepository {
    categories: Arc<RwLock<HashMap<UserId, Vec<Category>>>>,
}

impl InMemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn ensure_defaults(&self, owner: &UserId) -> Result<(), DomainError> {
        let mut categories = self.categories.write().await;
        let set = categories.entry(owner.clone()).or_default();
        if !set.iter().any(|c| c.is_default) {
            let mut seeded = Category::defaults_for(owner);
            seeded.append(set);
            *set = seeded;
        }
        Ok(())
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Category>, DomainError> {
        let categories = self.categories.read().await;
        let mut list = categories.get(owner).cloned().unwrap_or_default();
        // stable: keeps creation order inside each group
        list.sort_by_key(|c| !c.is_default);
        Ok(list)
    }

    async fn add(&self, category: &Category) -> Result<SaveResult, DomainError> {
        let mut categories = self.categories.write().await;
        let set = categories.entry(category.owner.clone()).or_default();
        if set.iter().any(|c| c.matches(&category.name)) {
            return Ok(SaveResult::AlreadyExists);
        }
        set.push(category.clone());
        Ok(SaveResult::Inserted)
    }

    async fn delete(&self, owner: &UserId, id: &CategoryId) -> Result<bool, DomainError> {
        let mut categories = self.categories.write().await;
        let Some(set) = categories.get_mut(owner) else {
            return Ok(false);
        };
        let Some(position) = set.iter().position(|c| &c.id == id) else {
            return Ok(false);
        };
        if set[position].is_default {
            return Err(DomainError::new(
                ErrorCode::ProtectedCategory,
                format!("'{}' is a default category", set[position].name),
            ));
        }
        set.remove(position);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new("+15550001111").unwrap()
    }

    #[tokio::test]
    async fn seeds_defaults_once() {
        let repo = InMemoryCategoryRepository::new();
        repo.ensure_defaults(&owner()).await.unwrap();
        repo.ensure_defaults(&owner()).await.unwrap();

        let list = repo.list(&owner()).await.unwrap();
        assert_eq!(list.len(), 7);
        assert_eq!(list[0].name, "Food");
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let repo = InMemoryCategoryRepository::new();
        repo.ensure_defaults(&owner()).await.unwrap();

        let groceries = Category::custom(owner(), "groceries").unwrap();
        assert_eq!(repo.add(&groceries).await.unwrap(), SaveResult::Inserted);

        let again = Category::custom(owner(), "GROCERIES").unwrap();
        assert_eq!(repo.add(&again).await.unwrap(), SaveResult::AlreadyExists);

        let food = Category::custom(owner(), "food").unwrap();
        assert_eq!(repo.add(&food).await.unwrap(), SaveResult::AlreadyExists);

        let list = repo.list(&owner()).await.unwrap();
        assert_eq!(list.last().map(|c| c.name.as_str()), Some("Groceries"));
    }

    #[tokio::test]
    async fn defaults_cannot_be_deleted() {
        let repo = InMemoryCategoryRepository::new();
        repo.ensure_defaults(&owner()).await.unwrap();
        let food = repo.list(&owner()).await.unwrap().remove(0);

        let err = repo.delete(&owner(), &food.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProtectedCategory);
    }

    #[tokio::test]
    async fn custom_categories_can_be_deleted() {
        let repo = InMemoryCategoryRepository::new();
        let pets = Category::custom(owner(), "pets").unwrap();
        repo.add(&pets).await.unwrap();

        assert!(repo.delete(&owner(), &pets.id).await.unwrap());
        assert!(!repo.delete(&owner(), &pets.id).await.unwrap());
    }
}
