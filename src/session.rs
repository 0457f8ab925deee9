//! The authenticated session shared by the stores and the API client.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::{
    Error, jwt,
    storage::{AUTH_TOKEN_KEY, LocalStorage},
};

/// The current time as seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Holds the bearer token in memory and keeps the stored copy in sync.
///
/// Cloning is cheap and all clones share the same token.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn LocalStorage>,
    token: Arc<watch::Sender<Option<String>>>,
}

impl Session {
    /// Create a session, restoring a previously stored token.
    ///
    /// A stored token that is expired or malformed is removed from storage
    /// instead of being restored.
    pub fn restore(storage: Arc<dyn LocalStorage>) -> Self {
        Self::restore_at(storage, unix_now())
    }

    pub(crate) fn restore_at(storage: Arc<dyn LocalStorage>, now: i64) -> Self {
        let stored = match storage.get(AUTH_TOKEN_KEY) {
            Ok(stored) => stored,
            Err(error) => {
                tracing::error!("Could not read the stored token: {error}");
                None
            }
        };

        let token = match stored {
            Some(token) if !jwt::is_expired(&token, now) => {
                tracing::info!("Restored session for {:?}", jwt::username(&token));
                Some(token)
            }
            Some(_) => {
                tracing::info!("Discarding expired stored token");
                if let Err(error) = storage.remove(AUTH_TOKEN_KEY) {
                    tracing::error!("Could not remove the stored token: {error}");
                }
                None
            }
            None => None,
        };

        let (sender, _) = watch::channel(token);

        Self {
            storage,
            token: Arc::new(sender),
        }
    }

    /// The in-memory token, whether or not it is still valid.
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// Get notified whenever the token changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }

    /// The storage the token is persisted to.
    pub fn storage(&self) -> &Arc<dyn LocalStorage> {
        &self.storage
    }

    /// Store `token` in memory and in storage.
    ///
    /// # Errors
    /// Returns an error if the token could not be persisted. The in-memory
    /// token is left untouched in that case.
    pub fn set_token(&self, token: String) -> Result<(), Error> {
        self.storage.set(AUTH_TOKEN_KEY, &token)?;
        tracing::info!("Signed in as {:?}", jwt::username(&token));
        self.token.send_replace(Some(token));

        Ok(())
    }

    /// Forget the token, both in memory and in storage.
    pub fn clear(&self) {
        if let Err(error) = self.storage.remove(AUTH_TOKEN_KEY) {
            tracing::error!("Could not remove the stored token: {error}");
        }

        self.token.send_if_modified(|token| {
            let was_signed_in = token.is_some();
            *token = None;
            was_signed_in
        });
    }

    /// Whether the user is signed in at `now`.
    ///
    /// Requires an in-memory token, a stored copy and an `exp` claim that has
    /// not passed. Does not modify the session.
    pub fn is_authenticated_at(&self, now: i64) -> bool {
        let Some(token) = self.token() else {
            return false;
        };

        let stored = matches!(self.storage.get(AUTH_TOKEN_KEY), Ok(Some(_)));

        stored && !jwt::is_expired(&token, now)
    }

    /// Whether the user is signed in right now.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(unix_now())
    }

    /// Clear the session if its token has expired at `now`.
    ///
    /// Returns true if the session was cleared.
    pub fn expire_if_needed_at(&self, now: i64) -> bool {
        match self.token() {
            Some(token) if jwt::is_expired(&token, now) => {
                tracing::info!("Session expired, signing out");
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Clear the session if its token has expired.
    pub fn expire_if_needed(&self) -> bool {
        self.expire_if_needed_at(unix_now())
    }

    /// The token to attach to a request, if the session is still valid.
    ///
    /// An expired token is cleared and not returned.
    pub fn valid_token(&self) -> Option<String> {
        if self.expire_if_needed() {
            return None;
        }

        self.token()
    }

    /// The username of the signed in user.
    pub fn username(&self) -> Option<String> {
        self.token().as_deref().and_then(jwt::username)
    }

    /// Seconds until the current token expires.
    pub fn remaining_lifetime(&self) -> u64 {
        self.token()
            .map(|token| jwt::remaining_lifetime(&token, unix_now()))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        storage::{AUTH_TOKEN_KEY, LocalStorage, MemoryStorage},
        test_utils::make_token,
    };

    use super::Session;

    const NOW: i64 = 1_760_000_000;

    fn token_expiring_at(exp: i64) -> String {
        make_token(json!({"sub": "alice", "exp": exp}))
    }

    #[test]
    fn restore_keeps_valid_stored_token() {
        let storage = MemoryStorage::new();
        let token = token_expiring_at(NOW + 60);
        storage.set(AUTH_TOKEN_KEY, &token).unwrap();

        let session = Session::restore_at(Arc::new(storage), NOW);

        assert_eq!(session.token(), Some(token));
        assert!(session.is_authenticated_at(NOW));
    }

    #[test]
    fn restore_removes_expired_stored_token() {
        let storage = MemoryStorage::new();
        storage
            .set(AUTH_TOKEN_KEY, &token_expiring_at(NOW - 1))
            .unwrap();

        let session = Session::restore_at(Arc::new(storage.clone()), NOW);

        assert_eq!(session.token(), None);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn set_token_persists_and_clear_removes() {
        let storage = MemoryStorage::new();
        let session = Session::restore_at(Arc::new(storage.clone()), NOW);
        let token = token_expiring_at(NOW + 60);

        session.set_token(token.clone()).unwrap();
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), Some(token));
        assert_eq!(session.username().as_deref(), Some("alice"));

        session.clear();
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn expired_token_is_not_authenticated_even_when_stored() {
        let storage = MemoryStorage::new();
        let session = Session::restore_at(Arc::new(storage.clone()), NOW);
        let token = token_expiring_at(NOW - 1);

        session.set_token(token.clone()).unwrap();

        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), Some(token));
        assert!(!session.is_authenticated_at(NOW));
    }

    #[test]
    fn missing_stored_copy_is_not_authenticated() {
        let storage = MemoryStorage::new();
        let session = Session::restore_at(Arc::new(storage.clone()), NOW);
        session.set_token(token_expiring_at(NOW + 60)).unwrap();

        storage.remove(AUTH_TOKEN_KEY).unwrap();

        assert!(session.token().is_some());
        assert!(!session.is_authenticated_at(NOW));
    }

    #[test]
    fn expire_if_needed_clears_only_expired_tokens() {
        let storage = MemoryStorage::new();
        let session = Session::restore_at(Arc::new(storage.clone()), NOW);
        session.set_token(token_expiring_at(NOW + 60)).unwrap();

        assert!(!session.expire_if_needed_at(NOW));
        assert!(session.token().is_some());

        assert!(session.expire_if_needed_at(NOW + 61));
        assert_eq!(session.token(), None);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn subscribers_see_token_changes() {
        let session = Session::restore_at(Arc::new(MemoryStorage::new()), NOW);
        let mut receiver = session.subscribe();

        session.set_token(token_expiring_at(NOW + 60)).unwrap();
        assert!(receiver.has_changed().unwrap());
        assert!(receiver.borrow_and_update().is_some());

        session.clear();
        assert!(receiver.has_changed().unwrap());
        assert!(receiver.borrow_and_update().is_none());
    }
}
