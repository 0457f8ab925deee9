use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::{
    Error,
    api::{AuthApi, AuthResponse, ExpenseApi, LoginRequest, RegisterRequest},
    expense::{Expense, ExpenseId, FilterCriteria},
};

/// Holds a fake API call until the test opens it.
#[derive(Clone)]
pub(crate) struct Gate(Arc<Semaphore>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    /// Let one waiting call through.
    pub(crate) fn open(&self) {
        self.0.add_permits(1);
    }

    async fn pass(&self) {
        self.0
            .acquire()
            .await
            .expect("Gate semaphore closed")
            .forget();
    }
}

/// An in-memory stand-in for the remote API.
///
/// Calls are recorded, can be made to fail once, and can be held behind a
/// [Gate] to control the order they finish in.
#[derive(Default)]
pub(crate) struct FakeApi {
    expenses: Mutex<Vec<Expense>>,
    filtered: Mutex<Vec<Expense>>,
    auth_response: Mutex<AuthResponse>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, Error>>,
    gates: Mutex<HashMap<&'static str, Gate>>,
    next_id: AtomicI64,
}

impl FakeApi {
    pub(crate) fn with_expenses(expenses: Vec<Expense>) -> Self {
        let api = Self::default();
        api.set_expenses(expenses);
        api
    }

    pub(crate) fn set_expenses(&self, expenses: Vec<Expense>) {
        *self.expenses.lock().unwrap() = expenses;
    }

    /// What `filter` returns, regardless of the criteria.
    pub(crate) fn set_filtered(&self, expenses: Vec<Expense>) {
        *self.filtered.lock().unwrap() = expenses;
    }

    pub(crate) fn set_auth_response(&self, response: AuthResponse) {
        *self.auth_response.lock().unwrap() = response;
    }

    /// Make the next call to `operation` fail with `error`.
    pub(crate) fn fail_next(&self, operation: &'static str, error: Error) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    /// Hold every call to `operation` until the returned gate is opened.
    pub(crate) fn gate(&self, operation: &'static str) -> Gate {
        self.gates
            .lock()
            .unwrap()
            .entry(operation)
            .or_insert_with(Gate::new)
            .clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, operation: &'static str, detail: String) -> Result<(), Error> {
        self.calls.lock().unwrap().push(detail);

        let gate = self.gates.lock().unwrap().get(operation).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        match self.failures.lock().unwrap().remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, Error> {
        self.enter("login", format!("login {}", request.username))
            .await?;

        Ok(self.auth_response.lock().unwrap().clone())
    }

    async fn signup(&self, request: &RegisterRequest) -> Result<AuthResponse, Error> {
        self.enter("signup", format!("signup {}", request.username))
            .await?;

        Ok(self.auth_response.lock().unwrap().clone())
    }
}

#[async_trait]
impl ExpenseApi for FakeApi {
    async fn list(&self) -> Result<Vec<Expense>, Error> {
        self.enter("list", "list".to_owned()).await?;

        Ok(self.expenses.lock().unwrap().clone())
    }

    async fn create(&self, expense: &Expense) -> Result<Expense, Error> {
        self.enter("create", "create".to_owned()).await?;

        let mut created = expense.clone();
        created.id = Some(100 + self.next_id.fetch_add(1, Ordering::SeqCst));
        self.expenses.lock().unwrap().push(created.clone());

        Ok(created)
    }

    async fn update(&self, id: ExpenseId, expense: &Expense) -> Result<Expense, Error> {
        self.enter("update", format!("update {id}")).await?;

        let mut updated = expense.clone();
        updated.id = Some(id);

        Ok(updated)
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), Error> {
        self.enter("delete", format!("delete {id}")).await?;

        self.expenses
            .lock()
            .unwrap()
            .retain(|expense| expense.id != Some(id));

        Ok(())
    }

    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>, Error> {
        self.enter("filter", format!("filter {}", serde_json::to_string(criteria).unwrap()))
            .await?;

        Ok(self.filtered.lock().unwrap().clone())
    }
}
