//! CategoryHandler - manages the user's category set.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatch::{HandlerError, HandlerOutcome, HandlerRequest, IntentHandler};
use crate::domain::expense::{find_category, Category};
use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::domain::parsing::{title_case, Intent};
use crate::domain::reply::HandlerResult;
use crate::domain::routing::HandlerKind;
use crate::ports::{CategoryRepository, SaveResult};

pub struct CategoryHandler {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryHandler {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    fn requested_name(request: &HandlerRequest<'_>) -> Result<String, ValidationError> {
        request
            .route
            .parsed
            .category_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ValidationError::missing_field("category_name"))
    }

    async fn add(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let category = Category::custom(request.owner().clone(), &Self::requested_name(request)?)?;
        let name = category.name.clone();

        let result = match self.categories.add(&category).await? {
            SaveResult::Inserted => {
                tracing::info!(owner = %request.owner(), category = %name, "category added");
                HandlerResult::CategoryAdded { name }
            }
            SaveResult::AlreadyExists => HandlerResult::CategoryExists { name },
        };
        Ok(HandlerOutcome::Completed(result))
    }

    async fn list(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let (defaults, custom): (Vec<_>, Vec<_>) = self
            .categories
            .list(request.owner())
            .await?
            .into_iter()
            .partition(|c| c.is_default);

        Ok(HandlerOutcome::Completed(HandlerResult::Categories {
            defaults: defaults.into_iter().map(|c| c.name).collect(),
            custom: custom.into_iter().map(|c| c.name).collect(),
        }))
    }

    async fn delete(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let requested = title_case(Self::requested_name(request)?.trim());
        let categories = self.categories.list(request.owner()).await?;

        let Some(category) = find_category(&categories, &requested) else {
            return Ok(HandlerOutcome::Completed(HandlerResult::CategoryNotFound { name: requested }));
        };
        let name = category.name.clone();

        let result = match self.categories.delete(request.owner(), &category.id).await {
            Ok(true) => {
                tracing::info!(owner = %request.owner(), category = %name, "category deleted");
                HandlerResult::CategoryDeleted { name }
            }
            Ok(false) => HandlerResult::CategoryNotFound { name },
            Err(e) if e.code == ErrorCode::ProtectedCategory => HandlerResult::CategoryProtected { name },
            Err(e) => return Err(e.into()),
        };
        Ok(HandlerOutcome::Completed(result))
    }
}

#[async_trait]
impl IntentHandler for CategoryHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Category
    }

    async fn handle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        match request.route.intent {
            Intent::ListCategories => self.list(request).await,
            Intent::DeleteCategory => self.delete(request).await,
            _ => self.add(request).await,
        }
    }
}
