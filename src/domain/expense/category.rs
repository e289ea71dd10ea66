//! User-defined expense categories.

use crate::domain::foundation::{CategoryId, Timestamp, UserId, ValidationError};
use crate::domain::parsing::title_case;

/// Categories every user starts with. They cannot be deleted.
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "Food",
    "Transport",
    "Shopping",
    "Bills",
    "Entertainment",
    "Health",
    "Other",
];

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub owner: UserId,
    pub name: String,
    pub is_default: bool,
    pub created_at: Timestamp,
}

impl Category {
    /// Creates a custom category with a title-cased name.
    pub fn custom(owner: UserId, name: &str) -> Result<Self, ValidationError> {
        let name = title_case(name.trim());
        if name.is_empty() {
            return Err(ValidationError::empty_field("category"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::invalid_format(
                "category",
                format!("must be at most {} characters", MAX_NAME_LEN),
            ));
        }
        Ok(Self {
            id: CategoryId::new(),
            owner,
            name,
            is_default: false,
            created_at: Timestamp::now(),
        })
    }

    /// The seeded default set for a new user.
    pub fn defaults_for(owner: &UserId) -> Vec<Self> {
        let now = Timestamp::now();
        DEFAULT_CATEGORIES
            .iter()
            .map(|name| Self {
                id: CategoryId::new(),
                owner: owner.clone(),
                name: (*name).to_string(),
                is_default: true,
                created_at: now,
            })
            .collect()
    }

    /// Case-insensitive name comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Finds a category by name, ignoring case.
pub fn find_category<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.matches(name))
}
