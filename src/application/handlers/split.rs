//! SplitHandler - shared expenses, debts and settlements.
//!
//! The split expense and its debts are written by one store call so a
//! failed commit leaves neither behind.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatch::{HandlerError, HandlerOutcome, HandlerRequest, IntentHandler};
use crate::domain::expense::{DebtSummary, ExpenseRecord, NewExpense, SplitPlan};
use crate::domain::foundation::ValidationError;
use crate::domain::parsing::Intent;
use crate::domain::reply::HandlerResult;
use crate::domain::routing::HandlerKind;
use crate::ports::DebtRepository;

pub struct SplitHandler {
    debts: Arc<dyn DebtRepository>,
}

impl SplitHandler {
    pub fn new(debts: Arc<dyn DebtRepository>) -> Self {
        Self { debts }
    }

    async fn split(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let parsed = &request.route.parsed;
        let amount = parsed.amount.ok_or_else(|| ValidationError::missing_field("amount"))?;
        let target = parsed
            .split
            .as_ref()
            .ok_or_else(|| ValidationError::missing_field("participants"))?;

        let plan = SplitPlan::equal(amount, target)?;
        let record = ExpenseRecord::new(NewExpense {
            owner: request.owner().clone(),
            amount,
            category: parsed.category_hint.clone(),
            description: parsed.description.clone(),
            source: request.message.kind,
            expense_date: parsed.expense_date.unwrap_or_else(|| request.today()),
            source_message_id: request.message.provider_message_id.clone(),
        })?
        .with_split(plan.split_info());

        let outcome = self.debts.commit_split(&record, &plan).await?;
        let duplicate = outcome.is_duplicate();
        let record = outcome.into_record();
        tracing::info!(
            owner = %request.owner(),
            expense_id = %record.id,
            total = plan.total().minor(),
            head_count = plan.head_count(),
            duplicate,
            "split committed"
        );

        Ok(HandlerOutcome::Completed(HandlerResult::SplitCreated {
            record,
            plan,
            duplicate,
        }))
    }

    async fn check(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let debts = self.debts.open_debts(request.owner()).await?;
        Ok(HandlerOutcome::Completed(HandlerResult::Debts(DebtSummary::from_debts(&debts))))
    }

    async fn settle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let person = request
            .route
            .parsed
            .person_name
            .clone()
            .ok_or_else(|| ValidationError::missing_field("person"))?;

        let count = self.debts.settle_with(request.owner(), &person).await?;
        tracing::info!(owner = %request.owner(), person = %person, count, "debts settled");
        Ok(HandlerOutcome::Completed(HandlerResult::DebtsSettled { person, count }))
    }
}

#[async_trait]
impl IntentHandler for SplitHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Split
    }

    async fn handle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        match request.route.intent {
            Intent::CheckDebts => self.check(request).await,
            Intent::SettleDebt => self.settle(request).await,
            _ => self.split(request).await,
        }
    }
}
