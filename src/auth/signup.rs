//! The signup form and its validation.

use crate::{Error, api::RegisterRequest};

use super::password::ValidatedPassword;

/// What the user typed into the signup form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupForm {
    /// Optional.
    pub first_name: String,
    /// Optional.
    pub last_name: String,
    /// Required, surrounding whitespace is ignored.
    pub username: String,
    /// Must be strong.
    pub password: String,
    /// Must equal `password`.
    pub confirm_password: String,
}

impl SignupForm {
    /// Check the form and turn it into a request for the signup endpoint.
    ///
    /// # Errors
    ///
    /// - [Error::InvalidUsername] if the username is empty or contains
    ///   whitespace.
    /// - [Error::PasswordMismatch] if the confirmation differs.
    /// - [Error::TooWeak] if the password is easy to guess.
    pub fn validate(&self) -> Result<RegisterRequest, Error> {
        let username = self.username.trim();
        if username.is_empty() || username.contains(char::is_whitespace) {
            return Err(Error::InvalidUsername);
        }

        if self.password != self.confirm_password {
            return Err(Error::PasswordMismatch);
        }

        let password = ValidatedPassword::new(&self.password, &[username])?;

        let full_name = [self.first_name.trim(), self.last_name.trim()]
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(RegisterRequest {
            full_name,
            username: username.to_owned(),
            password: password.into_inner(),
        })
    }
}
