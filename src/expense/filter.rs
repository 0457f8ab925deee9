//! Filter criteria for the expense list.
//!
//! Filters that only look at the kind, category or search term are
//! evaluated against the cached expenses. Filters with amount or date
//! bounds are "complex" and are evaluated by the server.

use serde::{Deserialize, Serialize};
use time::Date;

use super::model::{Expense, ExpenseKind, date_format};

/// The criteria used to narrow down the expense list.
///
/// Every field is optional, the default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Only expenses or only income.
    #[serde(rename = "expenseType", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ExpenseKind>,
    /// Case-insensitive text that must appear in the category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// The exact category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The smallest amount to include.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// The largest amount to include.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// The earliest date to include.
    #[serde(
        default,
        with = "date_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<Date>,
    /// The latest date to include.
    #[serde(
        default,
        with = "date_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<Date>,
}

impl FilterCriteria {
    /// Match only `kind`.
    pub fn kind(mut self, kind: ExpenseKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Match only `category`.
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// Match categories containing `term`.
    pub fn search(mut self, term: &str) -> Self {
        self.search_term = Some(term.to_owned());
        self
    }

    /// Match amounts of at least `amount`.
    pub fn min_amount(mut self, amount: f64) -> Self {
        self.min_amount = Some(amount);
        self
    }

    /// Match amounts of at most `amount`.
    pub fn max_amount(mut self, amount: f64) -> Self {
        self.max_amount = Some(amount);
        self
    }

    /// Match dates on or after `date`.
    pub fn start_date(mut self, date: Date) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Match dates on or before `date`.
    pub fn end_date(mut self, date: Date) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Whether the filter has to be evaluated by the server.
    ///
    /// True when either date bound is set or either amount bound is greater
    /// than zero. An amount bound of zero excludes nothing and is ignored.
    pub fn is_complex(&self) -> bool {
        let positive = |amount: Option<f64>| amount.is_some_and(|amount| amount > 0.0);

        self.start_date.is_some()
            || self.end_date.is_some()
            || positive(self.min_amount)
            || positive(self.max_amount)
    }

    /// Whether `expense` satisfies the kind, category and search term.
    ///
    /// Amount and date bounds are not checked here, see
    /// [FilterCriteria::is_complex].
    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(term) = self.search_term.as_deref().filter(|term| !term.is_empty()) {
            let term = term.to_lowercase();
            if !expense.category.to_lowercase().contains(&term) {
                return false;
            }
        }

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty())
            && expense.category != category
        {
            return false;
        }

        if let Some(kind) = self.kind
            && expense.kind != kind
        {
            return false;
        }

        true
    }

    /// The expenses in `expenses` that satisfy [FilterCriteria::matches].
    pub fn apply(&self, expenses: &[Expense]) -> Vec<Expense> {
        expenses
            .iter()
            .filter(|expense| self.matches(expense))
            .cloned()
            .collect()
    }
}
