//! The expense store: the cached expenses, the active filter and the
//! actions that change them.
//!
//! The store reconciles server responses with its cache as follows:
//!
//! - `Load` replaces the cache.
//! - `Upsert` replaces the cached entry with the same ID, or appends the
//!   newly created expense with the ID the server assigned.
//! - `Delete` removes the cached entry. While a complex filter is active
//!   the cache is left alone and the filter is sent to the server again.
//! - `Filter` with a simple filter is evaluated locally on every read, a
//!   complex filter is sent to the server and its response kept separately.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    Error,
    action::{self, ActionHandler, ActionStream, StateStore},
    api::ExpenseApi,
    session::Session,
};

use super::{
    filter::FilterCriteria,
    model::{Expense, ExpenseId},
    report::{Summary, summarise},
};

/// The intents handled by the [ExpenseStore].
#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseAction {
    /// Fetch every expense.
    Load,
    /// Make `FilterCriteria` the active filter.
    Filter(FilterCriteria),
    /// Create an expense without an ID, update one with an ID.
    Upsert(Expense),
    /// Delete the expense with the ID.
    Delete(ExpenseId),
}

/// A snapshot of the expense state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseState {
    /// The number of actions that have been sent and not finished,
    /// including filters still waiting out the debounce delay.
    pub in_flight: usize,
    /// Why the last action failed, cleared when the next one is submitted.
    pub error: Option<String>,
    /// The active filter.
    pub filter: FilterCriteria,
    /// Every expense of the signed in user.
    pub expenses: Vec<Expense>,
    /// The server's response to the last complex filter.
    pub backend_filtered: Vec<Expense>,
}

impl ExpenseState {
    /// Whether any action is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// The expenses matching the active filter.
    pub fn filtered(&self) -> Vec<Expense> {
        if self.filter.is_complex() {
            self.backend_filtered.clone()
        } else {
            self.filter.apply(&self.expenses)
        }
    }

    /// The number of expenses matching the active filter.
    pub fn count(&self) -> usize {
        if self.filter.is_complex() {
            self.backend_filtered.len()
        } else {
            self.expenses
                .iter()
                .filter(|expense| self.filter.matches(expense))
                .count()
        }
    }

    /// The sum of the amounts matching the active filter.
    pub fn total_amount(&self) -> f64 {
        self.filtered().iter().map(|expense| expense.amount).sum()
    }

    /// Income and expense totals for the expenses matching the active
    /// filter.
    pub fn summary(&self) -> Summary {
        summarise(&self.filtered())
    }
}

enum Outcome {
    Loaded(Vec<Expense>),
    Filtered(Vec<Expense>),
    LocalFilter,
    Saved(Expense),
    Deleted(ExpenseId),
}

struct ExpenseHandler {
    api: Arc<dyn ExpenseApi>,
    state: StateStore<ExpenseState>,
}

impl ExpenseHandler {
    async fn run(&self, action: ExpenseAction) -> Result<Outcome, Error> {
        match action {
            ExpenseAction::Load => Ok(Outcome::Loaded(self.api.list().await?)),
            ExpenseAction::Filter(criteria) if criteria.is_complex() => {
                Ok(Outcome::Filtered(self.api.filter(&criteria).await?))
            }
            ExpenseAction::Filter(_) => Ok(Outcome::LocalFilter),
            ExpenseAction::Upsert(expense) => {
                let saved = match expense.id {
                    Some(id) => {
                        let mut saved = self.api.update(id, &expense).await?;
                        saved.id.get_or_insert(id);
                        saved
                    }
                    None => self.api.create(&expense).await?,
                };

                Ok(Outcome::Saved(saved))
            }
            ExpenseAction::Delete(id) => {
                self.api.delete(id).await?;

                let active = self.state.with(|state| state.filter.clone());
                if active.is_complex() {
                    tracing::debug!("Refreshing complex filter after deleting {id}");
                    return Ok(Outcome::Filtered(self.api.filter(&active).await?));
                }

                Ok(Outcome::Deleted(id))
            }
        }
    }
}

fn apply(state: &mut ExpenseState, outcome: Outcome) {
    match outcome {
        Outcome::Loaded(expenses) => state.expenses = expenses,
        Outcome::Filtered(expenses) => state.backend_filtered = expenses,
        Outcome::LocalFilter => {}
        Outcome::Saved(saved) => {
            let existing = saved.id.and_then(|id| {
                state
                    .expenses
                    .iter()
                    .position(|expense| expense.id == Some(id))
            });

            match existing {
                Some(index) => state.expenses[index] = saved,
                None => state.expenses.push(saved),
            }
        }
        Outcome::Deleted(id) => state.expenses.retain(|expense| expense.id != Some(id)),
    }
}

#[async_trait]
impl ActionHandler<ExpenseAction> for ExpenseHandler {
    fn submitted(&self, action: &ExpenseAction) {
        tracing::debug!("Expense action {action:?}");

        self.state.patch(|state| {
            state.error = None;

            if let ExpenseAction::Filter(criteria) = action {
                state.filter = criteria.clone();
            }
        });
    }

    async fn handle(&self, action: ExpenseAction) {
        let result = self.run(action).await;

        self.state.patch(|state| match result {
            Ok(outcome) => apply(state, outcome),
            Err(error) => {
                tracing::warn!("Expense action failed: {error}");
                state.error = Some(error.user_message());
            }
        });
    }
}

/// Holds the expenses of the signed in user.
///
/// Actions run concurrently and their results are applied in the order
/// they finish, so a slow `Load` does not hold up a later `Delete`.
pub struct ExpenseStore {
    actions: ActionStream<ExpenseAction>,
    state: StateStore<ExpenseState>,
}

impl ExpenseStore {
    /// Create the store and start its dispatcher. Filters wait for
    /// `debounce` without a newer filter before they are applied.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(api: Arc<dyn ExpenseApi>, debounce: Duration) -> Self {
        let state = StateStore::new(ExpenseState::default());

        let in_flight = state.clone();
        let (actions, queue) = action::channel_with_observer(debounce, move |count| {
            in_flight.patch(|state| state.in_flight = count);
        });
        queue.run(Arc::new(ExpenseHandler {
            api,
            state: state.clone(),
        }));

        Self { actions, state }
    }

    /// Fetch every expense from the server.
    pub fn load(&self) {
        self.actions.dispatch(ExpenseAction::Load);
    }

    /// Make `criteria` the active filter.
    pub fn apply_filter(&self, criteria: FilterCriteria) {
        self.state.patch(|state| state.error = None);
        self.actions
            .dispatch_debounced(ExpenseAction::Filter(criteria));
    }

    /// Save `expense`, creating it if it has no ID.
    pub fn upsert(&self, expense: Expense) {
        self.actions.dispatch(ExpenseAction::Upsert(expense));
    }

    /// Delete the expense with `id`.
    pub fn delete(&self, id: ExpenseId) {
        self.actions.dispatch(ExpenseAction::Delete(id));
    }

    /// Forget every cached expense and reset the filter.
    pub fn clear(&self) {
        self.state.patch(|state| {
            let in_flight = state.in_flight;
            *state = ExpenseState {
                in_flight,
                ..ExpenseState::default()
            };
        });
    }

    /// The current state.
    pub fn state(&self) -> ExpenseState {
        self.state.snapshot()
    }

    /// Get notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<ExpenseState> {
        self.state.subscribe()
    }

    /// Wait until every dispatched action has finished.
    pub async fn idle(&self) {
        self.actions.idle().await;
    }

    /// The expenses matching the active filter.
    pub fn filtered_expenses(&self) -> Vec<Expense> {
        self.state.with(ExpenseState::filtered)
    }

    /// The number of expenses matching the active filter.
    pub fn expense_count(&self) -> usize {
        self.state.with(ExpenseState::count)
    }

    /// The sum of the amounts matching the active filter.
    pub fn total_amount(&self) -> f64 {
        self.state.with(ExpenseState::total_amount)
    }

    /// Income and expense totals matching the active filter.
    pub fn summary(&self) -> Summary {
        self.state.with(ExpenseState::summary)
    }

    /// Keep the cache in step with `session`: load the expenses whenever a
    /// new token is set and clear them when the session ends.
    ///
    /// A token the session already holds does not trigger a load, call
    /// [ExpenseStore::load] when the expenses are first needed.
    pub fn follow_session(&self, session: &Session) -> JoinHandle<()> {
        let mut tokens = session.subscribe();
        let actions = self.actions.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            while tokens.changed().await.is_ok() {
                let signed_in = tokens.borrow_and_update().is_some();

                if signed_in {
                    actions.dispatch(ExpenseAction::Load);
                } else {
                    tracing::debug!("Session ended, clearing expenses");
                    state.patch(|state| {
                        state.expenses.clear();
                        state.backend_filtered.clear();
                        state.filter = FilterCriteria::default();
                        state.error = None;
                    });
                }
            }
        })
    }
}
