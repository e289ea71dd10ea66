//! Reply composer - turns structured results into WhatsApp text.
//!
//! Pure formatting: no I/O, no clock. WhatsApp renders `*text*` as bold.

use super::locale::{format_amount, Locale};
use super::result::HandlerResult;
use crate::domain::conversation::{MessageKind, MissingField, PendingClarification};
use crate::domain::expense::{DebtSummary, ExpenseRecord, ExpenseSummary};
use crate::domain::foundation::{Money, ValidationError};
use crate::domain::parsing::{Intent, TimeRange};
use crate::domain::routing::{AmbiguousIntentError, ClarificationRequest};

pub const HELP_TEXT: &str = "*Thuk Commands*

*Add Expenses:*
- \"Spent 500 on food\"
- \"Paid $20 for coffee yesterday\"
- Send a bank transaction screenshot
- Send a voice note

*Split Payments:*
- \"2000 dinner split with 4 people\"
- \"1000 movie with Rahul and Priya\"
- \"Who owes me money?\"
- \"Rahul paid me back\"

*Query Expenses:*
- \"How much did I spend today?\"
- \"Show this month's expenses\"
- \"Food expenses this week\"

*Categories:*
- \"Show my categories\"
- \"Add category Subscriptions\"
- \"Delete category Subscriptions\"

*Other:*
- \"Delete last expense\"
- \"Cancel\" - Drop a pending question
- \"Help\" - Show this message";

const REPHRASE_TEXT: &str = "Sorry, I didn't understand that. Try something like:
- \"Spent 500 on food\"
- \"How much did I spend today?\"
- \"2000 split with 4 people\"
Send \"help\" for all commands.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyComposer {
    locale: Locale,
}

impl ReplyComposer {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Renders a handler result.
    pub fn compose(&self, result: &HandlerResult) -> String {
        match result {
            HandlerResult::ExpenseAdded {
                record,
                backdated,
                duplicate,
            } => {
                let mut line = format!("{}{}", format_amount(record.amount), self.category_suffix(record));
                if *backdated {
                    line.push_str(&format!(" on {}", self.locale.format_date(record.expense_date)));
                }
                if *duplicate {
                    format!("Already recorded: {}", line)
                } else {
                    format!("Added expense: {}", line)
                }
            }
            HandlerResult::ExpenseDeleted { record, debts_removed } => {
                let mut reply = format!(
                    "Deleted last expense: {}{}",
                    format_amount(record.amount),
                    self.category_suffix(record)
                );
                if *debts_removed > 0 {
                    reply.push_str(&format!("\nAlso removed {} related debt(s).", debts_removed));
                }
                reply
            }
            HandlerResult::NothingToDelete => "No expenses found to delete.".to_string(),
            HandlerResult::Summary(summary) => self.summary(summary),
            HandlerResult::ExpenseList { range, records } => self.expense_list(*range, records),
            HandlerResult::SplitCreated {
                record,
                plan,
                duplicate,
            } => {
                let mut lines = vec![if *duplicate {
                    "This split was already recorded.".to_string()
                } else {
                    "Split expense created!".to_string()
                }];
                lines.push(format!("Total: {}", format_amount(plan.total())));
                lines.push(format!("Your share: {}", format_amount(plan.owner_share())));
                let others = plan
                    .total()
                    .checked_sub(plan.owner_share())
                    .unwrap_or_else(|| Money::zero(plan.total().currency()));
                lines.push(format!(
                    "Others owe you: {} ({} people)",
                    format_amount(others),
                    plan.head_count() - 1
                ));
                let participants = plan.participants();
                if !participants.is_empty() {
                    lines.push(String::new());
                    lines.push("*Debts created:*".to_string());
                    for share in plan.shares() {
                        if let Some(person) = &share.person {
                            lines.push(format!("- {}: {}", person, format_amount(share.amount)));
                        }
                    }
                }
                if let Some(category) = &record.category {
                    lines.push(format!("Category: {}", category));
                }
                lines.join("\n")
            }
            HandlerResult::Debts(debts) => self.debts(debts),
            HandlerResult::DebtsSettled { person, count } => {
                if *count > 0 {
                    format!("Settled {} debt(s) with {}!", count, person)
                } else {
                    format!("No pending debts found with {}.", person)
                }
            }
            HandlerResult::CategoryAdded { name } => format!("Added category: {}", name),
            HandlerResult::CategoryExists { name } => format!("Category '{}' already exists!", name),
            HandlerResult::Categories { defaults, custom } => {
                let mut lines = vec!["*Your Categories*".to_string(), String::new()];
                if !defaults.is_empty() {
                    lines.push("*Default:*".to_string());
                    lines.extend(defaults.iter().map(|n| format!("- {}", n)));
                }
                if !custom.is_empty() {
                    lines.push(String::new());
                    lines.push("*Custom:*".to_string());
                    lines.extend(custom.iter().map(|n| format!("- {}", n)));
                }
                lines.join("\n")
            }
            HandlerResult::CategoryDeleted { name } => format!("Deleted category: {}", name),
            HandlerResult::CategoryNotFound { name } => format!("Category '{}' not found.", name),
            HandlerResult::CategoryProtected { name } => {
                format!("Cannot delete default category '{}'.", name)
            }
        }
    }

    /// Question for a pending clarification.
    pub fn clarification(&self, request: &ClarificationRequest) -> String {
        let question = self.question(&request.pending);
        match &request.reason {
            AmbiguousIntentError::FieldNotSupplied { .. } => {
                format!("I still need that to continue. {}", question)
            }
            _ => question,
        }
    }

    /// Question text for a pending clarification, without preamble.
    pub fn question(&self, pending: &PendingClarification) -> String {
        match pending {
            PendingClarification::ChooseIntent {
                original_text,
                candidates,
            } => {
                let mut lines = vec![format!(
                    "I'm not sure what to do with \"{}\". Reply with a number:",
                    original_text
                )];
                for (i, intent) in candidates.iter().enumerate() {
                    lines.push(format!("{}. {}", i + 1, capitalize(intent.describe())));
                }
                lines.push("Or say \"cancel\".".to_string());
                lines.join("\n")
            }
            PendingClarification::MissingField { intent, field, .. } => missing_field_question(*intent, *field),
            PendingClarification::Rephrase { .. } => REPHRASE_TEXT.to_string(),
        }
    }

    pub fn help(&self) -> String {
        HELP_TEXT.to_string()
    }

    pub fn dismissed(&self, had_pending: bool) -> String {
        if had_pending {
            "Okay, cancelled. What would you like to do next?".to_string()
        } else {
            "Nothing to cancel. Send \"help\" to see what I can do.".to_string()
        }
    }

    pub fn extraction_failed(&self, kind: MessageKind) -> String {
        match kind {
            MessageKind::Image => {
                "Sorry, I couldn't read a transaction from that image. Please send a clearer screenshot or type the expense, e.g. \"Spent 500 on food\".".to_string()
            }
            MessageKind::Audio => {
                "Sorry, I couldn't understand that voice note. Please try again or type the expense.".to_string()
            }
            MessageKind::Text => "I received an empty message. Send \"help\" to see what I can do.".to_string(),
        }
    }

    pub fn rejected(&self, error: &ValidationError) -> String {
        match error {
            ValidationError::NotPositive { field } => {
                format!("The {} must be more than zero. Please try again.", field)
            }
            ValidationError::InvalidFormat { field, reason } => {
                format!("I couldn't read the {} ({}). Could you rephrase?", field, reason)
            }
            ValidationError::EmptyField { field } | ValidationError::MissingField { field } => {
                format!("I need a {} to do that. Could you rephrase?", field)
            }
        }
    }

    pub fn service_unavailable(&self) -> String {
        "Sorry, something went wrong on my side. Please try again in a moment.".to_string()
    }

    pub fn not_applied(&self) -> String {
        "Sorry, that didn't go through and nothing was saved. Please try again.".to_string()
    }

    fn category_suffix(&self, record: &ExpenseRecord) -> String {
        record
            .category
            .as_ref()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default()
    }

    fn summary(&self, summary: &ExpenseSummary) -> String {
        let period = match &summary.category_filter {
            Some(category) => format!("{} {}", category, summary.range.label()),
            None => summary.range.label().to_string(),
        };
        if summary.is_empty() {
            return format!("No expenses found {}.", period);
        }
        let mut lines = vec![
            format!("*Spending Summary* {}", period),
            String::new(),
            format!("Total: {} ({} expenses)", format_amount(summary.total), summary.count),
        ];
        if !summary.by_category.is_empty() {
            lines.push(String::new());
            lines.push("*By Category:*".to_string());
            for (name, amount) in &summary.by_category {
                lines.push(format!("- {}: {}", name, format_amount(*amount)));
            }
        }
        lines.join("\n")
    }

    fn expense_list(&self, range: TimeRange, records: &[ExpenseRecord]) -> String {
        if records.is_empty() {
            return format!("No expenses found {}.", range.label());
        }
        let mut lines = vec![format!("*Recent Expenses* {}", range.label()), String::new()];
        for record in records {
            let description = record
                .description
                .as_ref()
                .map(|d| format!(" - {}", d))
                .unwrap_or_default();
            let split = if record.is_split() { " [split]" } else { "" };
            lines.push(format!(
                "- {}: {}{}{}{}",
                self.locale.format_date(record.expense_date),
                format_amount(record.amount),
                self.category_suffix(record),
                description,
                split
            ));
        }
        lines.join("\n")
    }

    fn debts(&self, debts: &DebtSummary) -> String {
        if debts.is_empty() {
            return "You have no pending debts!".to_string();
        }
        let mut lines = vec!["*Debt Summary*".to_string(), String::new()];
        if !debts.owed_to_me.is_empty() {
            lines.push(format!("*People owe you:* {}", totals(&debts.owed_to_me)));
            for (person, amount) in &debts.owed_to_me {
                lines.push(format!("- {}: {}", person, format_amount(*amount)));
            }
        }
        if !debts.i_owe.is_empty() {
            if !debts.owed_to_me.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("*You owe:* {}", totals(&debts.i_owe)));
            for (person, amount) in &debts.i_owe {
                lines.push(format!("- {}: {}", person, format_amount(*amount)));
            }
        }
        lines.join("\n")
    }
}

/// Question asked when a handler is missing a field.
pub fn missing_field_question(intent: Intent, field: MissingField) -> String {
    match field {
        MissingField::Amount => match intent {
            Intent::SplitPayment => "How much was the total to split? Reply with the amount, e.g. 1200.".to_string(),
            _ => "How much was it? Reply with the amount, e.g. 500 or $20.".to_string(),
        },
        MissingField::Participants => {
            "Who should I split it with? Reply with names (\"Alice and Bob\") or a head count (\"4 people\").".to_string()
        }
        MissingField::PersonName => "Who settled up with you? Reply with their name.".to_string(),
        MissingField::CategoryName => match intent {
            Intent::DeleteCategory => "Which category should I delete? Reply with its name.".to_string(),
            _ => "What should the new category be called?".to_string(),
        },
    }
}

fn totals(lines: &[(String, Money)]) -> String {
    DebtSummary::totals(lines)
        .into_iter()
        .map(format_amount)
        .collect::<Vec<_>>()
        .join(" + ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::MessageKind;
    use crate::domain::expense::{NewExpense, SplitPlan};
    use crate::domain::foundation::{Currency, ProviderMessageId, UserId};
    use crate::domain::parsing::SplitTarget;
    use crate::domain::parsing::AMOUNT_ONLY_CANDIDATES;
    use chrono::NaiveDate;

    fn record(major: i64, category: Option<&str>) -> ExpenseRecord {
        ExpenseRecord::new(NewExpense {
            owner: UserId::new("+911").unwrap(),
            amount: Money::from_major(major, Currency::Inr),
            category: category.map(str::to_string),
            description: Some("dinner".into()),
            source: MessageKind::Text,
            expense_date: NaiveDate::from_ymd_opt(2024, 10, 18).unwrap(),
            source_message_id: ProviderMessageId::generate(),
        })
        .unwrap()
    }

    #[test]
    fn expense_added_mentions_amount_category_and_backdate() {
        let composer = ReplyComposer::new(Locale::EnIn);
        let reply = composer.compose(&HandlerResult::ExpenseAdded {
            record: record(500, Some("Food")),
            backdated: true,
            duplicate: false,
        });
        assert_eq!(reply, "Added expense: ₹500 (Food) on 18 Oct");

        let us = ReplyComposer::new(Locale::EnUs).compose(&HandlerResult::ExpenseAdded {
            record: record(500, None),
            backdated: true,
            duplicate: true,
        });
        assert_eq!(us, "Already recorded: ₹500 on Oct 18");
    }

    #[test]
    fn split_reply_lists_debts() {
        let plan = SplitPlan::equal(
            Money::from_major(1200, Currency::Inr),
            &SplitTarget::People(vec!["Alice".into(), "Bob".into()]),
        )
        .unwrap();
        let reply = ReplyComposer::default().compose(&HandlerResult::SplitCreated {
            record: record(1200, Some("Food")),
            plan,
            duplicate: false,
        });
        assert!(reply.starts_with("Split expense created!"));
        assert!(reply.contains("Your share: ₹400"));
        assert!(reply.contains("Others owe you: ₹800 (2 people)"));
        assert!(reply.contains("- Alice: ₹400"));
        assert!(reply.contains("- Bob: ₹400"));
    }

    #[test]
    fn choose_intent_question_numbers_candidates() {
        let text = ReplyComposer::default().question(&PendingClarification::ChooseIntent {
            original_text: "1200".into(),
            candidates: AMOUNT_ONLY_CANDIDATES.to_vec(),
        });
        assert!(text.contains("1. Log it as your expense"));
        assert!(text.contains("2. Split it with others"));
    }

    #[test]
    fn reasked_question_has_preamble() {
        let request = ClarificationRequest {
            pending: PendingClarification::MissingField {
                intent: Intent::SettleDebt,
                field: MissingField::PersonName,
                original_text: "settled".into(),
            },
            reason: AmbiguousIntentError::FieldNotSupplied {
                intent: Intent::SettleDebt,
                field: MissingField::PersonName,
            },
        };
        let text = ReplyComposer::default().clarification(&request);
        assert!(text.starts_with("I still need that"));
        assert!(text.contains("Reply with their name"));
    }

    #[test]
    fn empty_debts_and_summary() {
        let composer = ReplyComposer::default();
        assert_eq!(
            composer.compose(&HandlerResult::Debts(DebtSummary::default())),
            "You have no pending debts!"
        );
        let summary = ExpenseSummary::from_records(
            &[],
            TimeRange::ThisWeek,
            NaiveDate::from_ymd_opt(2024, 10, 18).unwrap(),
            Currency::Inr,
            None,
        );
        assert_eq!(composer.compose(&HandlerResult::Summary(summary)), "No expenses found this week.");
    }

    #[test]
    fn categories_are_grouped() {
        let reply = ReplyComposer::default().compose(&HandlerResult::Categories {
            defaults: vec!["Food".into()],
            custom: vec!["Pets".into()],
        });
        assert!(reply.contains("*Default:*\n- Food"));
        assert!(reply.contains("*Custom:*\n- Pets"));
    }
}
