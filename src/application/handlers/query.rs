//! QueryHandler - read-only spending summaries and listings.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatch::{HandlerError, HandlerOutcome, HandlerRequest, IntentHandler};
use crate::domain::expense::ExpenseSummary;
use crate::domain::parsing::{Intent, TimeRange};
use crate::domain::reply::HandlerResult;
use crate::domain::routing::HandlerKind;
use crate::ports::{ExpenseQuery, ExpenseRepository};

/// Records shown by a listing.
pub const LIST_LIMIT: usize = 10;

pub struct QueryHandler {
    expenses: Arc<dyn ExpenseRepository>,
}

impl QueryHandler {
    pub fn new(expenses: Arc<dyn ExpenseRepository>) -> Self {
        Self { expenses }
    }

    async fn summary(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let parsed = &request.route.parsed;
        let today = request.today();
        let range = parsed.time_range.unwrap_or_default();
        let (start, end) = range.bounds(today);
        let category = parsed.category_hint.as_deref();

        let query = ExpenseQuery::between(start, end)
            .in_currency(parsed.currency)
            .in_category(category.map(str::to_string));
        let records = self.expenses.list(request.owner(), &query).await?;

        let summary = ExpenseSummary::from_records(&records, range, today, parsed.currency, category);
        tracing::debug!(
            owner = %request.owner(),
            range = range.label(),
            count = summary.count,
            "summary computed"
        );
        Ok(HandlerOutcome::Completed(HandlerResult::Summary(summary)))
    }

    async fn list(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        let parsed = &request.route.parsed;
        let range = parsed.time_range.unwrap_or(TimeRange::ThisMonth);
        let (start, end) = range.bounds(request.today());

        let query = ExpenseQuery::between(start, end)
            .in_category(parsed.category_hint.clone())
            .limit(LIST_LIMIT);
        let records = self.expenses.list(request.owner(), &query).await?;

        Ok(HandlerOutcome::Completed(HandlerResult::ExpenseList { range, records }))
    }
}

#[async_trait]
impl IntentHandler for QueryHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Query
    }

    async fn handle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        match request.route.intent {
            Intent::ListExpenses => self.list(request).await,
            _ => self.summary(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedger;
    use crate::domain::conversation::{Conversation, MessageKind, NormalizedMessage};
    use crate::domain::expense::{ExpenseRecord, NewExpense, SplitInfo};
    use crate::domain::foundation::{Currency, Money, ProviderMessageId, Timestamp, UserId};
    use crate::domain::parsing::TextParser;
    use crate::domain::routing::{IntentRouter, Route, RouteDecision};
    use crate::ports::ExpenseRepository;
    use chrono::{Duration, Offset, Utc};

    fn owner() -> UserId {
        UserId::new("+919876543210").unwrap()
    }

    async fn seed(ledger: &InMemoryLedger, id: &str, major: i64, category: &str, days_ago: i64) -> ExpenseRecord {
        let record = ExpenseRecord::new(NewExpense {
            owner: owner(),
            amount: Money::from_major(major, Currency::Inr),
            category: Some(category.to_string()),
            description: None,
            source: MessageKind::Text,
            expense_date: Timestamp::now().date_at(Utc.fix()) - Duration::days(days_ago),
            source_message_id: ProviderMessageId::new(id).unwrap(),
        })
        .unwrap();
        ledger.create(&record).await.unwrap();
        record
    }

    fn routed(text: &str) -> (NormalizedMessage, Route, Conversation) {
        let conversation = Conversation::new(owner());
        let message = NormalizedMessage::text(ProviderMessageId::new("SMq").unwrap(), owner(), text, Timestamp::now());
        let route = match IntentRouter::new(TextParser::new(Currency::Inr)).route(&message, &conversation) {
            RouteDecision::Dispatch(route) => route,
            other => panic!("expected dispatch, got {:?}", other),
        };
        (message, route, conversation)
    }

    #[tokio::test]
    async fn today_summary_counts_only_today() {
        let ledger = Arc::new(InMemoryLedger::new());
        seed(&ledger, "SM1", 500, "Food", 0).await;
        seed(&ledger, "SM2", 200, "Transport", 0).await;
        seed(&ledger, "SM3", 999, "Food", 1).await;
        let handler = QueryHandler::new(ledger);

        let (message, route, conversation) = routed("How much did I spend today?");
        let outcome = handler.handle(&HandlerRequest::new(&message, &route, &conversation)).await.unwrap();

        let HandlerOutcome::Completed(HandlerResult::Summary(summary)) = outcome else {
            panic!("expected summary");
        };
        assert_eq!(summary.range, TimeRange::Today);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total, Money::from_major(700, Currency::Inr));
        assert_eq!(summary.by_category[0].0, "Food");
    }

    #[tokio::test]
    async fn split_expense_counts_owner_share() {
        let ledger = Arc::new(InMemoryLedger::new());
        let record = ExpenseRecord::new(NewExpense {
            owner: owner(),
            amount: Money::from_major(1200, Currency::Inr),
            category: Some("Food".to_string()),
            description: None,
            source: MessageKind::Text,
            expense_date: Timestamp::now().date_at(Utc.fix()),
            source_message_id: ProviderMessageId::new("SMs").unwrap(),
        })
        .unwrap()
        .with_split(SplitInfo {
            head_count: 3,
            participants: vec!["Alice".into(), "Bob".into()],
            owner_share: Money::from_major(400, Currency::Inr),
        });
        ledger.create(&record).await.unwrap();
        let handler = QueryHandler::new(ledger);

        let (message, route, conversation) = routed("How much did I spend today?");
        let outcome = handler.handle(&HandlerRequest::new(&message, &route, &conversation)).await.unwrap();
        let HandlerOutcome::Completed(HandlerResult::Summary(summary)) = outcome else {
            panic!("expected summary");
        };
        assert_eq!(summary.total, Money::from_major(400, Currency::Inr));
    }

    #[tokio::test]
    async fn listing_is_capped() {
        let ledger = Arc::new(InMemoryLedger::new());
        for i in 0..12 {
            seed(&ledger, &format!("SM{}", i), 10 + i, "Food", 0).await;
        }
        let handler = QueryHandler::new(ledger);

        let (message, route, conversation) = routed("show recent expenses");
        assert_eq!(route.intent, Intent::ListExpenses);
        let outcome = handler.handle(&HandlerRequest::new(&message, &route, &conversation)).await.unwrap();
        let HandlerOutcome::Completed(HandlerResult::ExpenseList { records, .. }) = outcome else {
            panic!("expected list");
        };
        assert_eq!(records.len(), LIST_LIMIT);
    }
}
