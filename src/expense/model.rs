//! The expense model, its categories and validation.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::Error;

/// Alias for the integer type the server uses for expense IDs.
pub type ExpenseId = i64;

/// Whether money was spent or earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpenseKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
}

impl ExpenseKind {
    /// The categories a transaction of this kind may use.
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            ExpenseKind::Expense => ExpenseCategory::NAMES,
            ExpenseKind::Income => IncomeCategory::NAMES,
        }
    }

    /// Whether `category` is one of the categories for this kind.
    pub fn allows_category(self, category: &str) -> bool {
        self.categories().contains(&category)
    }
}

impl Display for ExpenseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpenseKind::Expense => write!(f, "expense"),
            ExpenseKind::Income => write!(f, "income"),
        }
    }
}

impl std::str::FromStr for ExpenseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expense" => Ok(ExpenseKind::Expense),
            "income" => Ok(ExpenseKind::Income),
            _ => Err(format!("\"{s}\" is not a valid kind, use expense or income")),
        }
    }
}

macro_rules! categories {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// Every category, in display order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The display name of every category, in display order.
            pub const NAMES: &'static [&'static str] = &[$($label),+];

            /// The display name, which is also the value sent to the server.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Look up a category by its display name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

categories!(
    /// The categories money can be spent on.
    ExpenseCategory {
        Food => "Food",
        Transport => "Transport",
        Housing => "Housing",
        Utilities => "Utilities",
        Health => "Health",
        Entertainment => "Entertainment",
        Education => "Education",
        Shopping => "Shopping",
        Groceries => "Groceries",
        Insurance => "Insurance",
        Savings => "Savings",
        LoanPayments => "Loan Payments",
        Charity => "Charity",
        Other => "Other",
    }
);

categories!(
    /// The categories money can be earned from.
    IncomeCategory {
        Salary => "Salary",
        Bonus => "Bonus",
        Business => "Business",
        Interest => "Interest",
        Gifts => "Gifts",
        Other => "Other",
    }
);

pub(crate) mod date_format {
    //! Serializes a [time::Date] as "YYYY-MM-DD", the format the API uses.
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

    pub(crate) const DATE_FORMAT: &[BorrowedFormatItem] =
        format_description!("[year]-[month]-[day]");

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = date
            .format(DATE_FORMAT)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Some servers send a full timestamp, only the date part matters.
        let date_part = s.get(..10).unwrap_or(s.as_str());
        Date::parse(date_part, DATE_FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        //! The same format for optional dates.
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => {
                    let date_part = s.get(..10).unwrap_or(s.as_str());
                    Date::parse(date_part, super::DATE_FORMAT)
                        .map(Some)
                        .map_err(serde::de::Error::custom)
                }
                None => Ok(None),
            }
        }
    }
}

/// Parse a "YYYY-MM-DD" date.
///
/// # Errors
/// Returns the parse error as a string so it can be shown to the user.
pub fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, date_format::DATE_FORMAT).map_err(|error| format!("{text}: {error}"))
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Expense` with validation, use [Expense::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The ID assigned by the server, `None` until the expense is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ExpenseId>,
    /// Whether money was spent or earned.
    #[serde(rename = "expenseType")]
    pub kind: ExpenseKind,
    /// When the transaction happened.
    #[serde(with = "date_format")]
    pub date: Date,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// One of the categories for `kind`.
    ///
    /// Only checked when the expense is built, expenses from the server are
    /// taken as they are.
    pub category: String,
    /// The account the money moved through, e.g. "Bank" or "Cash".
    pub account: String,
    /// A free-text note.
    #[serde(default)]
    pub note: String,
}

impl Expense {
    /// Start building a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(
        kind: ExpenseKind,
        category: &str,
        amount: f64,
        date: Date,
        account: &str,
    ) -> ExpenseBuilder {
        ExpenseBuilder {
            id: None,
            kind,
            category: category.to_owned(),
            amount,
            date,
            account: account.to_owned(),
            note: String::new(),
        }
    }

    /// Start building an edited copy of this expense, keeping its ID.
    pub fn edit(&self) -> ExpenseBuilder {
        ExpenseBuilder {
            id: self.id,
            kind: self.kind,
            category: self.category.clone(),
            amount: self.amount,
            date: self.date,
            account: self.account.clone(),
            note: self.note.clone(),
        }
    }
}

/// A builder for creating validated [Expense] instances.
///
/// Call [ExpenseBuilder::finalize] to check the fields and create the
/// [Expense].
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseBuilder {
    /// Set when editing an expense that has already been saved.
    pub id: Option<ExpenseId>,
    /// Whether money was spent or earned.
    pub kind: ExpenseKind,
    /// Must be one of [ExpenseKind::categories] for `kind`.
    pub category: String,
    /// Must be greater than zero.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// Must not be blank.
    pub account: String,
    /// Optional free text.
    pub note: String,
}

impl ExpenseBuilder {
    /// Set the ID, marking the expense as already saved.
    pub fn id(mut self, id: Option<ExpenseId>) -> Self {
        self.id = id;
        self
    }

    /// Set the note.
    pub fn note(mut self, note: &str) -> Self {
        self.note = note.to_owned();
        self
    }

    /// Change the kind.
    ///
    /// The category is cleared when the kind changes since categories do not
    /// carry over between kinds.
    pub fn kind(mut self, kind: ExpenseKind) -> Self {
        if kind != self.kind {
            self.category.clear();
        }
        self.kind = kind;
        self
    }

    /// Set the category.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the amount.
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    /// Set the date.
    pub fn date(mut self, date: Date) -> Self {
        self.date = date;
        self
    }

    /// Set the account.
    pub fn account(mut self, account: &str) -> Self {
        self.account = account.to_owned();
        self
    }

    /// Validate the fields and create the expense.
    ///
    /// The account and note are trimmed.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidAmount] if the amount is not a number greater than zero,
    /// - [Error::InvalidCategory] if the category does not belong to the kind,
    /// - or [Error::EmptyAccount] if the account is blank.
    pub fn finalize(self) -> Result<Expense, Error> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::InvalidAmount(self.amount));
        }

        if !self.kind.allows_category(&self.category) {
            return Err(Error::InvalidCategory {
                category: self.category,
                kind: self.kind.to_string(),
            });
        }

        let account = self.account.trim();
        if account.is_empty() {
            return Err(Error::EmptyAccount);
        }

        Ok(Expense {
            id: self.id,
            kind: self.kind,
            date: self.date,
            amount: self.amount,
            category: self.category,
            account: account.to_owned(),
            note: self.note.trim().to_owned(),
        })
    }
}
