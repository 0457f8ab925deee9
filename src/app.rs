//! The application context that wires the stores together.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    Error,
    api::{AuthApi, ExpenseApi, HttpApi},
    auth::AuthStore,
    config::ClientConfig,
    expense::ExpenseStore,
    jwt,
    navigation::{Navigator, Route, guard},
    notification::Notifier,
    session::{Session, unix_now},
    storage::LocalStorage,
};

/// Everything a front end needs, created once at start up.
///
/// Background tasks keep the current screen in step with the session and
/// sign the user out when their token expires. They stop when the `App` is
/// dropped.
pub struct App {
    config: ClientConfig,
    session: Session,
    notifier: Notifier,
    navigator: Navigator,
    auth: AuthStore,
    expenses: ExpenseStore,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Create the app, restoring the session from `storage` and talking to
    /// the API described by `config`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `config` is invalid.
    pub fn new(config: ClientConfig, storage: Arc<dyn LocalStorage>) -> Result<Self, Error> {
        let session = Session::restore(storage);
        let notifier = Notifier::new();
        let api = Arc::new(HttpApi::new(
            config.clone(),
            session.clone(),
            notifier.clone(),
        )?);

        Ok(Self::with_api(config, session, notifier, api.clone(), api))
    }

    /// Create the app on top of custom API implementations.
    pub fn with_api(
        config: ClientConfig,
        session: Session,
        notifier: Notifier,
        auth_api: Arc<dyn AuthApi>,
        expense_api: Arc<dyn ExpenseApi>,
    ) -> Self {
        let navigator = Navigator::new(guard(Route::Expenses, session.is_authenticated()));
        let auth = AuthStore::new(auth_api, session.clone(), config.debounce());
        let expenses = ExpenseStore::new(expense_api, config.debounce());

        let tasks = vec![
            expenses.follow_session(&session),
            tokio::spawn(follow_session(session.subscribe(), navigator.clone())),
            tokio::spawn(watch_expiry(
                session.clone(),
                session.subscribe(),
                notifier.clone(),
            )),
        ];

        Self {
            config,
            session,
            notifier,
            navigator,
            auth,
            expenses,
            tasks,
        }
    }

    /// The config the app was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Where errors and confirmations are announced.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// The current screen.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Signing in and out.
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// The expenses of the signed in user.
    pub fn expenses(&self) -> &ExpenseStore {
        &self.expenses
    }

    /// Open `route` if the user is allowed to see it.
    ///
    /// Opening [Route::Expenses] fetches the expenses.
    pub fn navigate(&self, route: Route) -> Route {
        let opened = self
            .navigator
            .navigate(route, self.session.is_authenticated());

        if opened == Route::Expenses {
            self.expenses.load();
        }

        opened
    }

    /// Sign out.
    pub fn logout(&self) {
        self.auth.logout();
        self.notifier.info("You have been logged out");
    }

    /// Wait until neither store has an action in flight.
    pub async fn idle(&self) {
        self.auth.idle().await;
        self.expenses.idle().await;
    }
}

impl Drop for App {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn follow_session(mut tokens: watch::Receiver<Option<String>>, navigator: Navigator) {
    while tokens.changed().await.is_ok() {
        let signed_in = tokens.borrow_and_update().is_some();

        if !signed_in {
            navigator.redirect_to_login();
        } else if !navigator.current().requires_auth() {
            navigator.navigate(Route::Expenses, true);
        }
    }
}

/// Sign the session out once its token expires.
async fn watch_expiry(
    session: Session,
    mut tokens: watch::Receiver<Option<String>>,
    notifier: Notifier,
) {
    loop {
        let token = tokens.borrow_and_update().clone();

        let Some(token) = token else {
            if tokens.changed().await.is_err() {
                return;
            }
            continue;
        };

        // A token is expired once the clock has moved past `exp`.
        let remaining = jwt::remaining_lifetime(&token, unix_now()) + 1;

        tokio::select! {
            changed = tokens.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(remaining)) => {
                if session.expire_if_needed() {
                    notifier.error(Error::TokenExpired.user_message());
                }
            }
        }
    }
}
