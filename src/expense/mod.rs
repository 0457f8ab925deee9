//! Expenses and income: the model, filtering, the store and reports.

mod filter;
mod model;
mod report;
mod store;

pub use filter::FilterCriteria;
pub use model::{
    Expense, ExpenseBuilder, ExpenseCategory, ExpenseId, ExpenseKind, IncomeCategory, parse_date,
};
pub use report::{CategoryTotal, Summary, category_breakdown, summarise};
pub use store::{ExpenseAction, ExpenseState, ExpenseStore};
