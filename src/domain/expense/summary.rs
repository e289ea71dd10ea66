//! Aggregations over expense records and debts.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::record::ExpenseRecord;
use super::split::{Debt, DebtDirection};
use crate::domain::foundation::{Currency, Money};
use crate::domain::parsing::TimeRange;

/// Spending over one period in one currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseSummary {
    pub range: TimeRange,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub category_filter: Option<String>,
    pub total: Money,
    pub count: usize,
    /// Per-category totals, largest first.
    pub by_category: Vec<(String, Money)>,
}

impl ExpenseSummary {
    /// Summarizes the records that fall in `[start, end]`, are in `currency`
    /// and match the category filter. Split expenses count the owner's share.
    pub fn from_records(
        records: &[ExpenseRecord],
        range: TimeRange,
        today: NaiveDate,
        currency: Currency,
        category_filter: Option<&str>,
    ) -> Self {
        let (start, end) = range.bounds(today);
        let mut by_category: BTreeMap<String, i64> = BTreeMap::new();
        let mut total = 0_i64;
        let mut count = 0_usize;

        for record in records.iter().filter(|r| {
            r.expense_date >= start
                && r.expense_date <= end
                && r.amount.currency() == currency
                && category_filter.map_or(true, |c| r.category_label().eq_ignore_ascii_case(c))
        }) {
            let minor = record.owner_amount().minor();
            total += minor;
            count += 1;
            *by_category.entry(record.category_label().to_string()).or_default() += minor;
        }

        let mut by_category: Vec<(String, Money)> = by_category
            .into_iter()
            .map(|(name, minor)| (name, Money::new(minor, currency)))
            .collect();
        by_category.sort_by(|a, b| b.1.minor().cmp(&a.1.minor()).then_with(|| a.0.cmp(&b.0)));

        Self {
            range,
            start,
            end,
            category_filter: category_filter.map(str::to_string),
            total: Money::new(total, currency),
            count,
            by_category,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Outstanding debts grouped by direction and person.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebtSummary {
    pub owed_to_me: Vec<(String, Money)>,
    pub i_owe: Vec<(String, Money)>,
}

impl DebtSummary {
    /// Groups open debts. Settled rows are ignored; amounts for the same
    /// person and currency are added up.
    pub fn from_debts(debts: &[Debt]) -> Self {
        let mut owed: BTreeMap<(String, Currency), i64> = BTreeMap::new();
        let mut owing: BTreeMap<(String, Currency), i64> = BTreeMap::new();
        for debt in debts.iter().filter(|d| !d.settled) {
            let bucket = match debt.direction {
                DebtDirection::OwesMe => &mut owed,
                DebtDirection::IOwe => &mut owing,
            };
            *bucket
                .entry((debt.person.clone(), debt.amount.currency()))
                .or_default() += debt.amount.minor();
        }
        let flatten = |map: BTreeMap<(String, Currency), i64>| -> Vec<(String, Money)> {
            map.into_iter()
                .map(|((person, currency), minor)| (person, Money::new(minor, currency)))
                .collect()
        };
        Self {
            owed_to_me: flatten(owed),
            i_owe: flatten(owing),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owed_to_me.is_empty() && self.i_owe.is_empty()
    }

    /// Totals per currency for one side.
    pub fn totals(lines: &[(String, Money)]) -> Vec<Money> {
        let mut totals: BTreeMap<&'static str, Money> = BTreeMap::new();
        for (_, amount) in lines {
            let entry = totals
                .entry(amount.currency().code())
                .or_insert_with(|| Money::zero(amount.currency()));
            if let Some(sum) = entry.checked_add(*amount) {
                *entry = sum;
            }
        }
        totals.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::MessageKind;
    use crate::domain::expense::record::{NewExpense, SplitInfo};
    use crate::domain::foundation::{ExpenseId, ProviderMessageId, Timestamp, UserId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()
    }

    fn record(major: i64, category: &str, date: NaiveDate) -> ExpenseRecord {
        ExpenseRecord::new(NewExpense {
            owner: UserId::new("+911").unwrap(),
            amount: Money::from_major(major, Currency::Inr),
            category: Some(category.to_string()),
            description: None,
            source: MessageKind::Text,
            expense_date: date,
            source_message_id: ProviderMessageId::generate(),
        })
        .unwrap()
    }

    #[test]
    fn summary_groups_and_sorts_by_category() {
        let records = vec![
            record(100, "Food", today()),
            record(500, "Transport", today()),
            record(250, "Food", today()),
            record(999, "Food", NaiveDate::from_ymd_opt(2024, 11, 30).unwrap()),
        ];
        let s = ExpenseSummary::from_records(&records, TimeRange::ThisMonth, today(), Currency::Inr, None);
        assert_eq!(s.count, 3);
        assert_eq!(s.total, Money::from_major(850, Currency::Inr));
        assert_eq!(s.by_category[0].0, "Transport");
        assert_eq!(s.by_category[1], ("Food".to_string(), Money::from_major(350, Currency::Inr)));
    }

    #[test]
    fn summary_counts_owner_share_of_splits() {
        let split = record(1200, "Food", today()).with_split(SplitInfo {
            head_count: 3,
            participants: vec![],
            owner_share: Money::from_major(400, Currency::Inr),
        });
        let s = ExpenseSummary::from_records(&[split], TimeRange::Today, today(), Currency::Inr, Some("food"));
        assert_eq!(s.total, Money::from_major(400, Currency::Inr));
    }

    #[test]
    fn summary_filters_currency_and_category() {
        let records = vec![record(100, "Food", today()), record(50, "Bills", today())];
        let s = ExpenseSummary::from_records(&records, TimeRange::Today, today(), Currency::Usd, None);
        assert!(s.is_empty());
        let s = ExpenseSummary::from_records(&records, TimeRange::Today, today(), Currency::Inr, Some("Bills"));
        assert_eq!(s.count, 1);
    }

    #[test]
    fn debt_summary_ignores_settled_and_merges_people() {
        let owner = UserId::new("+911").unwrap();
        let expense = ExpenseId::new();
        let mut settled = Debt::owed_to_me(owner.clone(), "Bob", Money::from_major(10, Currency::Inr), expense);
        settled.settle(Timestamp::now());
        let debts = vec![
            Debt::owed_to_me(owner.clone(), "Alice", Money::from_major(400, Currency::Inr), expense),
            Debt::owed_to_me(owner.clone(), "Alice", Money::from_major(100, Currency::Inr), expense),
            settled,
        ];
        let s = DebtSummary::from_debts(&debts);
        assert_eq!(s.owed_to_me, vec![("Alice".to_string(), Money::from_major(500, Currency::Inr))]);
        assert!(s.i_owe.is_empty());
        assert_eq!(DebtSummary::totals(&s.owed_to_me), vec![Money::from_major(500, Currency::Inr)]);
    }
}
