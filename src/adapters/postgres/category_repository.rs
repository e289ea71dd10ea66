//! PostgreSQL implementation of CategoryRepository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::expense::Category;
use crate::domain::foundation::{CategoryId, DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CategoryRepository, SaveResult};

#[derive(Clone)]
pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, category: &Category) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO categories (id, owner, name, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner, (LOWER(name))) DO NOTHING
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(category.owner.as_str())
        .bind(&category.name)
        .bind(category.is_default)
        .bind(category.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert category: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn ensure_defaults(&self, owner: &UserId) -> Result<(), DomainError> {
        let seeded: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE owner = $1 AND is_default) AS seeded",
        )
        .bind(owner.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check categories: {}", e)))?
        .get("seeded");

        if seeded {
            return Ok(());
        }

        // Conflicts are ignored, so concurrent seeding is harmless.
        for category in Category::defaults_for(owner) {
            self.insert(&category).await?;
        }
        tracing::debug!(owner = %owner, "seeded default categories");
        Ok(())
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Category>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, name, is_default, created_at
            FROM categories
            WHERE owner = $1
            ORDER BY is_default DESC, created_at ASC, name ASC
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list categories: {}", e)))?;

        rows.iter().map(category_from_row).collect()
    }

    async fn add(&self, category: &Category) -> Result<SaveResult, DomainError> {
        if self.insert(category).await? {
            Ok(SaveResult::Inserted)
        } else {
            Ok(SaveResult::AlreadyExists)
        }
    }

    async fn delete(&self, owner: &UserId, id: &CategoryId) -> Result<bool, DomainError> {
        let row = sqlx::query(
            r#"
            DELETE FROM categories
            WHERE owner = $1 AND id = $2 AND NOT is_default
            RETURNING id
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to delete category: {}", e)))?;

        if row.is_some() {
            return Ok(true);
        }

        let protected: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE owner = $1 AND id = $2 AND is_default) AS protected",
        )
        .bind(owner.as_str())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check category: {}", e)))?
        .get("protected");

        if protected {
            return Err(DomainError::new(
                ErrorCode::ProtectedCategory,
                "default categories cannot be deleted",
            ));
        }
        Ok(false)
    }
}

fn category_from_row(row: &PgRow) -> Result<Category, DomainError> {
    let id: uuid::Uuid = row.get("id");
    let owner: String = row.get("owner");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

    Ok(Category {
        id: CategoryId::from_uuid(id),
        owner: UserId::new(owner).map_err(|e| DomainError::database(format!("Invalid row: {}", e)))?,
        name: row.get("name"),
        is_default: row.get("is_default"),
        created_at: Timestamp::from_datetime(created_at),
    })
}
