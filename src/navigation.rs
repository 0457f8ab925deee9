//! The screens of the client and the rules for moving between them.

use std::sync::Arc;

use tokio::sync::watch;

/// A screen of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The login form.
    Login,
    /// The signup form.
    Register,
    /// The expense list, only for signed in users.
    Expenses,
}

impl Route {
    /// Every route, in the order they appear in the navigation bar.
    pub const ALL: [Route; 3] = [Route::Expenses, Route::Login, Route::Register];

    /// The path of the route, e.g. "/login".
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Expenses => "/expenses",
        }
    }

    /// The title shown for the route.
    pub fn title(self) -> &'static str {
        match self {
            Route::Login => "Log In",
            Route::Register => "Sign Up",
            Route::Expenses => "Expenses",
        }
    }

    /// The route for `path`. Unknown paths lead to [Route::Login].
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');

        Route::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Route::Login)
    }

    /// Whether only signed in users may see the route.
    pub fn requires_auth(self) -> bool {
        matches!(self, Route::Expenses)
    }
}

/// Where a user trying to open `route` ends up.
///
/// Signed out users are sent to the login screen, signed in users skip the
/// login and signup screens.
pub fn guard(route: Route, authenticated: bool) -> Route {
    match (route.requires_auth(), authenticated) {
        (true, false) => Route::Login,
        (false, true) => Route::Expenses,
        _ => route,
    }
}

/// Tracks the current screen.
///
/// Cloning gives another handle onto the same screen.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Arc<watch::Sender<Route>>,
}

impl Navigator {
    /// Start on `initial`.
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial);

        Self {
            current: Arc::new(current),
        }
    }

    /// The current screen.
    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    /// Get notified whenever the screen changes.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }

    /// Try to open `route`, returning the screen that was actually opened.
    pub fn navigate(&self, route: Route, authenticated: bool) -> Route {
        let target = guard(route, authenticated);
        if target != route {
            tracing::debug!("Redirecting from {} to {}", route.path(), target.path());
        }

        self.current.send_if_modified(|current| {
            let changed = *current != target;
            *current = target;
            changed
        });

        target
    }

    /// Go to the login screen unless it is already open.
    ///
    /// Returns true if the screen changed.
    pub fn redirect_to_login(&self) -> bool {
        self.current.send_if_modified(|current| {
            if *current == Route::Login {
                return false;
            }

            tracing::info!("Redirecting to {}", Route::Login.path());
            *current = Route::Login;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Navigator, Route, guard};

    #[test]
    fn paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), route);
        }
    }

    #[test]
    fn unknown_path_falls_back_to_login() {
        assert_eq!(Route::from_path("/does-not-exist"), Route::Login);
        assert_eq!(Route::from_path(""), Route::Login);
    }

    #[test]
    fn from_path_ignores_trailing_slash_and_query() {
        assert_eq!(Route::from_path("/expenses/?page=2"), Route::Expenses);
    }

    #[test]
    fn guard_sends_signed_out_users_to_login() {
        assert_eq!(guard(Route::Expenses, false), Route::Login);
        assert_eq!(guard(Route::Register, false), Route::Register);
        assert_eq!(guard(Route::Login, false), Route::Login);
    }

    #[test]
    fn guard_sends_signed_in_users_to_expenses() {
        assert_eq!(guard(Route::Login, true), Route::Expenses);
        assert_eq!(guard(Route::Register, true), Route::Expenses);
        assert_eq!(guard(Route::Expenses, true), Route::Expenses);
    }

    #[test]
    fn navigate_applies_guard() {
        let navigator = Navigator::new(Route::Login);

        assert_eq!(navigator.navigate(Route::Expenses, false), Route::Login);
        assert_eq!(navigator.current(), Route::Login);

        assert_eq!(navigator.navigate(Route::Expenses, true), Route::Expenses);
        assert_eq!(navigator.current(), Route::Expenses);
    }

    #[test]
    fn redirect_to_login_only_changes_other_screens() {
        let navigator = Navigator::new(Route::Login);
        let mut changes = navigator.subscribe();

        assert!(!navigator.redirect_to_login());
        assert!(!changes.has_changed().unwrap());

        navigator.navigate(Route::Expenses, true);
        changes.borrow_and_update();

        assert!(navigator.redirect_to_login());
        assert!(changes.has_changed().unwrap());
        assert_eq!(navigator.current(), Route::Login);
    }
}
