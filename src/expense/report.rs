//! Summaries of a list of expenses for the report screen.

use std::collections::HashMap;

use super::model::{Expense, ExpenseKind};

/// Totals over a list of expenses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    /// The sum of all income.
    pub total_income: f64,
    /// The sum of all expenses.
    pub total_expenses: f64,
    /// Income minus expenses.
    pub balance: f64,
    /// The number of transactions summarised.
    pub transactions: usize,
}

/// How much of the total went to a single category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    /// The category name.
    pub category: String,
    /// The sum of the amounts in this category.
    pub amount: f64,
    /// The share of the total for the kind, rounded to a whole percent.
    pub percentage: u8,
}

/// Sum up income and expenses.
pub fn summarise(expenses: &[Expense]) -> Summary {
    let mut summary = Summary {
        transactions: expenses.len(),
        ..Summary::default()
    };

    for expense in expenses {
        match expense.kind {
            ExpenseKind::Income => summary.total_income += expense.amount,
            ExpenseKind::Expense => summary.total_expenses += expense.amount,
        }
    }

    summary.balance = summary.total_income - summary.total_expenses;
    summary
}

/// Break the transactions of `kind` down by category, largest first.
///
/// Categories with equal totals are ordered by name.
pub fn category_breakdown(expenses: &[Expense], kind: ExpenseKind) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for expense in expenses.iter().filter(|expense| expense.kind == kind) {
        *totals.entry(expense.category.as_str()).or_default() += expense.amount;
    }

    let grand_total: f64 = totals.values().sum();

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, amount)| CategoryTotal {
            category: category.to_owned(),
            amount,
            percentage: if grand_total > 0.0 {
                (amount / grand_total * 100.0).round() as u8
            } else {
                0
            },
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    breakdown
}
