//! The authentication store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    Error,
    action::{self, ActionHandler, ActionStream, StateStore},
    api::{AuthApi, AuthResponse, LoginRequest, RegisterRequest},
    session::Session,
};

use super::signup::SignupForm;

/// The intents handled by the [AuthStore].
#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    /// Sign in with existing credentials.
    Login(LoginRequest),
    /// Create an account and sign in.
    Signup(RegisterRequest),
}

/// A snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    /// The number of login or signup requests that have been sent and not
    /// answered yet, including those still waiting out the debounce delay.
    pub in_flight: usize,
    /// Why the last login or signup failed.
    pub error_message: Option<String>,
    /// The `sub` claim of the current token.
    pub username: Option<String>,
}

impl AuthState {
    /// Whether a login or signup request is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}

/// Signs users in and out.
///
/// Login and signup go through a debounced [ActionStream], so repeated
/// submissions in quick succession send a single request.
pub struct AuthStore {
    actions: ActionStream<AuthAction>,
    state: StateStore<AuthState>,
    session: Session,
    follower: JoinHandle<()>,
}

struct AuthHandler {
    api: Arc<dyn AuthApi>,
    session: Session,
    state: StateStore<AuthState>,
}

impl AuthHandler {
    fn accept(&self, result: Result<AuthResponse, Error>) -> Result<Option<String>, String> {
        let response = result.map_err(|error| error.user_message())?;

        if response.error {
            return Err(response
                .message
                .unwrap_or_else(|| "Authentication failed".to_owned()));
        }

        let Some(token) = response.token else {
            return Err(response
                .message
                .unwrap_or_else(|| "The server did not send a token".to_owned()));
        };

        self.session
            .set_token(token)
            .map_err(|error| error.user_message())?;

        Ok(self.session.username())
    }
}

#[async_trait]
impl ActionHandler<AuthAction> for AuthHandler {
    fn submitted(&self, action: &AuthAction) {
        tracing::debug!("Auth action {action:?}");

        self.state.patch(|state| state.error_message = None);
    }

    async fn handle(&self, action: AuthAction) {
        let result = match &action {
            AuthAction::Login(request) => self.api.login(request).await,
            AuthAction::Signup(request) => self.api.signup(request).await,
        };

        let outcome = self.accept(result);

        self.state.patch(|state| match outcome {
            Ok(username) => {
                state.username = username;
                state.error_message = None;
            }
            Err(message) => {
                tracing::warn!("Authentication failed: {message}");
                state.error_message = Some(message);
            }
        });
    }
}

impl AuthStore {
    /// Create the store and start its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(api: Arc<dyn AuthApi>, session: Session, debounce: Duration) -> Self {
        let state = StateStore::new(AuthState {
            username: session.username(),
            ..AuthState::default()
        });

        let in_flight = state.clone();
        let (actions, queue) = action::channel_with_observer(debounce, move |count| {
            in_flight.patch(|state| state.in_flight = count);
        });
        queue.run(Arc::new(AuthHandler {
            api,
            session: session.clone(),
            state: state.clone(),
        }));

        let follower = tokio::spawn(follow_username(
            session.clone(),
            session.subscribe(),
            state.clone(),
        ));

        Self {
            actions,
            state,
            session,
            follower,
        }
    }

    fn send(&self, action: AuthAction) {
        self.state.patch(|state| state.error_message = None);
        self.actions.dispatch_debounced(action);
    }

    /// Sign in as `username`.
    ///
    /// # Errors
    /// Returns [Error::InvalidUsername] without sending anything if the
    /// username is blank.
    pub fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidUsername);
        }

        self.send(AuthAction::Login(LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
        }));

        Ok(())
    }

    /// Validate `form` and register the new user.
    ///
    /// # Errors
    /// Returns the validation error of [SignupForm::validate]; nothing is
    /// sent in that case.
    pub fn signup(&self, form: &SignupForm) -> Result<(), Error> {
        let request = form.validate()?;
        self.send(AuthAction::Signup(request));

        Ok(())
    }

    /// Sign out and reset the state.
    pub fn logout(&self) {
        self.session.clear();
        self.state.patch(|state| *state = AuthState::default());
    }

    /// Whether the user is signed in with an unexpired token.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// The current state.
    pub fn state(&self) -> AuthState {
        self.state.snapshot()
    }

    /// Get notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait for every login and signup to finish.
    pub async fn idle(&self) {
        self.actions.idle().await;
    }

    /// The signed in user, read from the token.
    pub fn username(&self) -> Option<String> {
        self.session.username()
    }

    /// The raw bearer token.
    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    /// The session this store signs in and out of.
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for AuthStore {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

/// Keep `username` in step with the token, whoever changes it.
async fn follow_username(
    session: Session,
    mut tokens: watch::Receiver<Option<String>>,
    state: StateStore<AuthState>,
) {
    while tokens.changed().await.is_ok() {
        tokens.borrow_and_update();
        let username = session.username();
        state.patch(|state| state.username = username);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use crate::{
        Error,
        api::AuthResponse,
        auth::SignupForm,
        session::Session,
        storage::{AUTH_TOKEN_KEY, LocalStorage, MemoryStorage},
        test_utils::{FakeApi, expired_token, valid_token},
    };

    use super::AuthStore;

    const DEBOUNCE: Duration = Duration::from_millis(200);

    fn store(api: Arc<FakeApi>) -> (AuthStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let session = Session::restore(Arc::new(storage.clone()));

        (AuthStore::new(api, session, DEBOUNCE), storage)
    }

    fn token_response(token: String) -> AuthResponse {
        AuthResponse {
            token: Some(token),
            message: None,
            error: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn login_stores_token_and_username() {
        let api = Arc::new(FakeApi::default());
        let token = valid_token("alice");
        api.set_auth_response(token_response(token.clone()));
        let (store, storage) = store(api.clone());

        store.login("alice", "hunter2").unwrap();
        store.idle().await;

        assert!(store.is_authenticated());
        assert_eq!(store.token(), Some(token.clone()));
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), Some(token));
        let state = store.state();
        assert_eq!(state.username.as_deref(), Some("alice"));
        assert_eq!(state.error_message, None);
        assert!(!state.is_loading());
        assert_eq!(api.calls(), vec!["login alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_logins_send_one_request() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(token_response(valid_token("alice")));
        let (store, _) = store(api.clone());

        store.login("alice", "a").unwrap();
        store.login("alice", "b").unwrap();
        store.login("alice", "c").unwrap();
        store.idle().await;

        assert_eq!(api.calls(), vec!["login alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn error_response_sets_message() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(AuthResponse {
            token: None,
            message: Some("Invalid credentials".to_owned()),
            error: true,
        });
        let (store, _) = store(api);

        store.login("alice", "wrong").unwrap();
        store.idle().await;

        assert!(!store.is_authenticated());
        assert_eq!(
            store.state().error_message.as_deref(),
            Some("Invalid credentials")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_sets_message_and_keeps_accepting_actions() {
        let api = Arc::new(FakeApi::default());
        api.fail_next("login", Error::Network("connection refused".to_owned()));
        api.set_auth_response(token_response(valid_token("alice")));
        let (store, _) = store(api.clone());

        store.login("alice", "hunter2").unwrap();
        store.idle().await;

        assert_eq!(
            store.state().error_message.as_deref(),
            Some("An error occured : connection refused")
        );

        store.login("alice", "hunter2").unwrap();
        store.idle().await;

        assert!(store.is_authenticated());
        assert_eq!(store.state().error_message, None);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_username_is_not_sent() {
        let api = Arc::new(FakeApi::default());
        let (store, _) = store(api.clone());

        assert_eq!(store.login("  ", "pw"), Err(Error::InvalidUsername));
        store.idle().await;

        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn signup_validates_before_sending() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(token_response(valid_token("bob")));
        let (store, _) = store(api.clone());
        let form = SignupForm {
            first_name: "Bob".to_owned(),
            last_name: String::new(),
            username: "bob".to_owned(),
            password: "roostersgocockledoodledoo".to_owned(),
            confirm_password: "turkeysgogobblegobble".to_owned(),
        };

        assert_eq!(store.signup(&form), Err(Error::PasswordMismatch));

        let form = SignupForm {
            confirm_password: form.password.clone(),
            ..form
        };
        store.signup(&form).unwrap();
        store.idle().await;

        assert_eq!(api.calls(), vec!["signup bob"]);
        assert!(store.is_authenticated());
        assert_eq!(store.username().as_deref(), Some("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn loading_while_request_in_flight() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(token_response(valid_token("alice")));
        let gate = api.gate("login");
        let (store, _) = store(api);
        let mut state = store.subscribe();

        store.login("alice", "hunter2").unwrap();
        state.wait_for(|state| state.is_loading()).await.unwrap();

        gate.open();
        store.idle().await;

        assert!(!store.state().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_everything() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(token_response(valid_token("alice")));
        let (store, storage) = store(api);
        store.login("alice", "hunter2").unwrap();
        store.idle().await;

        store.logout();

        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.state(), Default::default());
    }

    #[tokio::test]
    async fn expired_token_is_not_authenticated_even_if_stored() {
        let storage = MemoryStorage::new();
        let session = Session::restore(Arc::new(storage.clone()));
        let token = expired_token("alice");
        // Bypass the checks done when restoring.
        session.set_token(token.clone()).unwrap();
        let store = AuthStore::new(Arc::new(FakeApi::default()), session, DEBOUNCE);

        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), Some(token));
        assert!(!store.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_session_elsewhere_forgets_username() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(token_response(valid_token("alice")));
        let (store, _) = store(api);
        store.login("alice", "hunter2").unwrap();
        store.idle().await;
        assert_eq!(store.state().username.as_deref(), Some("alice"));
        let mut state = store.subscribe();

        // As done on a 401 response or when the token expires.
        store.session().clear();

        state
            .wait_for(|state| state.username.is_none())
            .await
            .unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.username(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn submitting_marks_loading_and_clears_error_before_debounce() {
        let api = Arc::new(FakeApi::default());
        api.set_auth_response(AuthResponse {
            token: None,
            message: Some("Invalid credentials".to_owned()),
            error: true,
        });
        let (store, _) = store(api.clone());
        store.login("alice", "wrong").unwrap();
        store.idle().await;
        assert!(store.state().error_message.is_some());

        store.login("alice", "right").unwrap();

        let state = store.state();
        assert!(state.is_loading());
        assert_eq!(state.error_message, None);
        assert_eq!(api.calls(), vec!["login alice"]);

        store.idle().await;
        assert!(!store.state().is_loading());
    }
}
