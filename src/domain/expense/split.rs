//! Split plans and the debts they create.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::{ExpenseRecord, SplitInfo};
use crate::domain::foundation::{
    DebtId, DomainError, ErrorCode, ExpenseId, Money, Timestamp, UserId, ValidationError,
};
use crate::domain::parsing::SplitTarget;

/// Who owes whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    /// The other person owes the user.
    OwesMe,
    /// The user owes the other person.
    IOwe,
}

impl DebtDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtDirection::OwesMe => "owes_me",
            DebtDirection::IOwe => "i_owe",
        }
    }
}

impl fmt::Display for DebtDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owes_me" => Ok(DebtDirection::OwesMe),
            "i_owe" => Ok(DebtDirection::IOwe),
            other => Err(ValidationError::invalid_format(
                "direction",
                format!("unknown direction {}", other),
            )),
        }
    }
}

/// An outstanding or settled amount between the user and another person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debt {
    pub id: DebtId,
    pub owner: UserId,
    pub person: String,
    pub amount: Money,
    pub direction: DebtDirection,
    pub settled: bool,
    pub expense_id: Option<ExpenseId>,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl Debt {
    pub fn owed_to_me(owner: UserId, person: impl Into<String>, amount: Money, expense_id: ExpenseId) -> Self {
        Self {
            id: DebtId::new(),
            owner,
            person: person.into(),
            amount,
            direction: DebtDirection::OwesMe,
            settled: false,
            expense_id: Some(expense_id),
            created_at: Timestamp::now(),
            settled_at: None,
        }
    }

    pub fn settle(&mut self, at: Timestamp) {
        self.settled = true;
        self.settled_at = Some(at);
    }
}

/// One participant's part of a split. `person` is `None` for unnamed heads
/// ("split with 4 people"), which produce no debt row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub person: Option<String>,
    pub amount: Money,
}

/// How a total is divided between the owner and the other participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    total: Money,
    owner_share: Money,
    shares: Vec<Share>,
}

impl SplitPlan {
    /// Equal shares in minor units; the remainder goes to the owner so the
    /// shares always add up to the total.
    pub fn equal(total: Money, target: &SplitTarget) -> Result<Self, ValidationError> {
        if !total.is_positive() {
            return Err(ValidationError::not_positive("amount"));
        }
        let heads = target.head_count();
        if heads < 2 {
            return Err(ValidationError::invalid_format(
                "participants",
                "a split needs at least one other person",
            ));
        }
        let base = total.minor() / i64::from(heads);
        let remainder = total.minor() % i64::from(heads);
        let share = Money::new(base, total.currency());

        let shares = match target {
            SplitTarget::People(people) => people
                .iter()
                .map(|p| Share {
                    person: Some(p.clone()),
                    amount: share,
                })
                .collect(),
            SplitTarget::Count(_) => (1..heads)
                .map(|_| Share {
                    person: None,
                    amount: share,
                })
                .collect(),
        };

        Ok(Self {
            total,
            owner_share: Money::new(base + remainder, total.currency()),
            shares,
        })
    }

    /// Builds a plan from explicit shares without checking them.
    ///
    /// Stores call [`SplitPlan::verify`] before committing, so an
    /// inconsistent plan built here is refused there.
    pub fn from_parts(total: Money, owner_share: Money, shares: Vec<Share>) -> Self {
        Self {
            total,
            owner_share,
            shares,
        }
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn owner_share(&self) -> Money {
        self.owner_share
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn head_count(&self) -> u32 {
        self.shares.len() as u32 + 1
    }

    /// Named participants in order.
    pub fn participants(&self) -> Vec<String> {
        self.shares.iter().filter_map(|s| s.person.clone()).collect()
    }

    /// Checks that every share is in the total's currency and that the
    /// shares add up to the total exactly.
    pub fn verify(&self) -> Result<(), DomainError> {
        let mismatch = |reason: &str| {
            DomainError::new(ErrorCode::SplitMismatch, reason.to_string())
                .with_detail("total", self.total.minor().to_string())
        };
        let mut sum = self.owner_share;
        for share in &self.shares {
            sum = sum
                .checked_add(share.amount)
                .ok_or_else(|| mismatch("share currency differs from total"))?;
        }
        if sum != self.total {
            return Err(mismatch("split shares do not add up to the total")
                .with_detail("sum", sum.minor().to_string()));
        }
        Ok(())
    }

    pub fn split_info(&self) -> SplitInfo {
        SplitInfo {
            head_count: self.head_count(),
            participants: self.participants(),
            owner_share: self.owner_share,
        }
    }

    /// Debt rows for the named participants of `record`.
    pub fn debts_for(&self, record: &ExpenseRecord) -> Vec<Debt> {
        self.shares
            .iter()
            .filter_map(|s| {
                s.person
                    .as_ref()
                    .map(|p| Debt::owed_to_me(record.owner.clone(), p.clone(), s.amount, record.id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Currency;
    use proptest::prelude::*;

    fn inr(major: i64) -> Money {
        Money::from_major(major, Currency::Inr)
    }

    #[test]
    fn equal_split_between_named_people() {
        let plan = SplitPlan::equal(
            inr(1200),
            &SplitTarget::People(vec!["Alice".into(), "Bob".into()]),
        )
        .unwrap();
        assert_eq!(plan.owner_share(), inr(400));
        assert!(plan.shares().iter().all(|s| s.amount == inr(400)));
        assert_eq!(plan.participants(), vec!["Alice".to_string(), "Bob".to_string()]);
        assert!(plan.verify().is_ok());
    }

    #[test]
    fn remainder_goes_to_owner() {
        let plan = SplitPlan::equal(Money::new(1000, Currency::Inr), &SplitTarget::Count(3)).unwrap();
        assert_eq!(plan.owner_share().minor(), 334);
        assert!(plan.shares().iter().all(|s| s.amount.minor() == 333));
        assert_eq!(plan.head_count(), 3);
        assert!(plan.participants().is_empty());
    }

    #[test]
    fn a_split_needs_someone_else() {
        assert!(SplitPlan::equal(inr(100), &SplitTarget::Count(1)).is_err());
        assert!(SplitPlan::equal(Money::zero(Currency::Inr), &SplitTarget::Count(2)).is_err());
    }

    #[test]
    fn verify_rejects_short_shares() {
        let plan = SplitPlan::from_parts(
            inr(1200),
            inr(400),
            vec![Share {
                person: Some("Alice".into()),
                amount: inr(300),
            }],
        );
        let err = plan.verify().unwrap_err();
        assert_eq!(err.code, ErrorCode::SplitMismatch);
    }

    #[test]
    fn verify_rejects_mixed_currency() {
        let plan = SplitPlan::from_parts(
            inr(10),
            inr(5),
            vec![Share {
                person: None,
                amount: Money::from_major(5, Currency::Usd),
            }],
        );
        assert!(plan.verify().is_err());
    }

    #[test]
    fn direction_round_trips_through_str() {
        assert_eq!("owes_me".parse::<DebtDirection>().unwrap(), DebtDirection::OwesMe);
        assert_eq!(DebtDirection::IOwe.to_string(), "i_owe");
    }

    proptest! {
        #[test]
        fn equal_shares_always_sum_to_total(minor in 1i64..10_000_000, heads in 2u32..20) {
            let plan = SplitPlan::equal(Money::new(minor, Currency::Inr), &SplitTarget::Count(heads)).unwrap();
            prop_assert!(plan.verify().is_ok());
            for share in plan.shares() {
                prop_assert!(plan.owner_share().minor() >= share.amount.minor());
                prop_assert!(plan.owner_share().minor() - share.amount.minor() < i64::from(heads));
            }
        }
    }
}
