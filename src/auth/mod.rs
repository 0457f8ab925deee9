//! Signing in, signing up and signing out.

mod password;
mod signup;
mod store;

pub use password::ValidatedPassword;
pub use signup::SignupForm;
pub use store::{AuthAction, AuthState, AuthStore};
