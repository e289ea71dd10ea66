//! ExpenseHandler - adds and deletes the user's own expense records.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatch::{HandlerError, HandlerOutcome, HandlerRequest, IntentHandler};
use crate::domain::expense::{find_category, Category, ExpenseRecord, NewExpense};
use crate::domain::foundation::{UserId, ValidationError};
use crate::domain::parsing::Intent;
use crate::domain::reply::HandlerResult;
use crate::domain::routing::HandlerKind;
use crate::ports::{
    AIProvider, CategoryRepository, CompletionRequest, ExpenseRepository, MessageRole, RequestMetadata,
};

const CATEGORY_SYSTEM_PROMPT: &str = "You sort personal expenses into categories. \
Reply with ONLY one category name from the list, nothing else. \
If unsure or it could fit several, reply \"Other\".";

pub struct ExpenseHandler {
    expenses: Arc<dyn ExpenseRepository>,
    categories: Arc<dyn CategoryRepository>,
    ai: Option<Arc<dyn AIProvider>>,
}

impl ExpenseHandler {
    pub fn new(expenses: Arc<dyn ExpenseRepository>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self {
            expenses,
            categories,
            ai: None,
        }
    }

    /// Enables language-model category detection when keywords find none.
    pub fn with_ai(mut self, ai: Arc<dyn AIProvider>) -> Self {
        self.ai = Some(ai);
        self
    }

    async fn add(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let parsed = &request.route.parsed;
        let amount = parsed.amount.ok_or_else(|| ValidationError::missing_field("amount"))?;
        let owner = request.owner();

        // Replays skip category detection entirely.
        if let Some(existing) = self
            .expenses
            .find_by_source(owner, &request.message.provider_message_id)
            .await?
        {
            return Ok(HandlerOutcome::Completed(added(existing, request, true)));
        }

        let category = self.resolve_category(request).await?;
        let record = ExpenseRecord::new(NewExpense {
            owner: owner.clone(),
            amount,
            category,
            description: parsed.description.clone(),
            source: request.message.kind,
            expense_date: parsed.expense_date.unwrap_or_else(|| request.today()),
            source_message_id: request.message.provider_message_id.clone(),
        })?;

        let outcome = self.expenses.create(&record).await?;
        let duplicate = outcome.is_duplicate();
        let record = outcome.into_record();
        tracing::info!(
            owner = %owner,
            expense_id = %record.id,
            amount = record.amount.minor(),
            currency = record.amount.currency().code(),
            category = record.category_label(),
            duplicate,
            "expense recorded"
        );
        Ok(HandlerOutcome::Completed(added(record, request, duplicate)))
    }

    async fn delete_last(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let result = match self.expenses.delete_last(request.owner()).await? {
            Some((record, debts_removed)) => {
                tracing::info!(owner = %request.owner(), expense_id = %record.id, debts_removed, "expense deleted");
                HandlerResult::ExpenseDeleted { record, debts_removed }
            }
            None => HandlerResult::NothingToDelete,
        };
        Ok(HandlerOutcome::Completed(result))
    }

    /// Keyword hint or custom category name first, then the language model.
    async fn resolve_category(&self, request: &HandlerRequest<'_>) -> Result<Option<String>, HandlerError> {
        let parsed = &request.route.parsed;
        let categories = self.categories.list(request.owner()).await?;

        if let Some(hint) = &parsed.category_hint {
            let name = find_category(&categories, hint)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| hint.clone());
            return Ok(Some(name));
        }

        let lower = parsed.raw_text.to_lowercase();
        if let Some(custom) = categories
            .iter()
            .filter(|c| !c.is_default)
            .find(|c| contains_word(&lower, &c.name.to_lowercase()))
        {
            return Ok(Some(custom.name.clone()));
        }

        match (&self.ai, &parsed.description) {
            (Some(ai), Some(description)) => {
                Ok(self.ask_model(ai.as_ref(), request, description, &categories).await)
            }
            _ => Ok(None),
        }
    }

    /// Failures fall back to no category; the expense is still recorded.
    async fn ask_model(
        &self,
        ai: &dyn AIProvider,
        request: &HandlerRequest<'_>,
        description: &str,
        categories: &[Category],
    ) -> Option<String> {
        if categories.is_empty() {
            return None;
        }
        let names = categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
        let prompt = format!(
            "Categories: {}\nExpense description: \"{}\"\nCategory:",
            names, description
        );
        let completion = CompletionRequest::new(metadata(request.owner(), request))
            .with_system_prompt(CATEGORY_SYSTEM_PROMPT)
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(10)
            .with_temperature(0.0);

        match ai.complete(completion).await {
            Ok(response) => {
                let answer = response.content.trim().trim_matches(|c: char| c == '"' || c == '.');
                let picked = find_category(categories, answer).map(|c| c.name.clone());
                tracing::debug!(answer, picked = ?picked, "model category suggestion");
                picked
            }
            Err(e) => {
                tracing::warn!(error = %e, "category detection failed, leaving uncategorized");
                None
            }
        }
    }
}

#[async_trait]
impl IntentHandler for ExpenseHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Expense
    }

    async fn handle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        match request.route.intent {
            Intent::DeleteLastExpense => self.delete_last(request).await,
            _ => self.add(request).await,
        }
    }
}

fn added(record: ExpenseRecord, request: &HandlerRequest<'_>, duplicate: bool) -> HandlerResult {
    HandlerResult::ExpenseAdded {
        backdated: record.expense_date != request.today(),
        record,
        duplicate,
    }
}

fn metadata(owner: &UserId, request: &HandlerRequest<'_>) -> RequestMetadata {
    RequestMetadata::new(
        owner.clone(),
        request.conversation.id(),
        request.message.provider_message_id.as_str(),
    )
}

fn contains_word(haystack: &str, word: &str) -> bool {
    !word.is_empty()
        && haystack
            .match_indices(word)
            .any(|(i, m)| {
                let before = haystack[..i].chars().next_back();
                let after = haystack[i + m.len()..].chars().next();
                !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
            })
}
