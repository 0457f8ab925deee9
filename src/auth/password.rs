//! Password strength checks for new accounts.

use std::fmt::Display;

use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A password that is hard enough to guess to be sent to the signup
/// endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Check the strength of `raw_password`.
    ///
    /// `user_inputs` are words the password should not be built from, such
    /// as the username.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] if the password is considered too weak. The
    /// error message explains why and suggests how to make it stronger.
    pub fn new(raw_password: &str, user_inputs: &[&str]) -> Result<Self, Error> {
        let analysis = zxcvbn(raw_password, user_inputs);

        match analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => Err(Error::TooWeak(
                analysis
                    .feedback()
                    .unwrap_or(&Feedback::default())
                    .to_string(),
            )),
        }
    }

    /// The raw password.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::ValidatedPassword;

    #[test]
    fn new_fails_on_empty() {
        let result = ValidatedPassword::new("", &[]);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_fails_on_short_password() {
        let result = ValidatedPassword::new("imtooshort", &[]);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_succeeds_on_long_password() {
        let result = ValidatedPassword::new("asomewhatlongpassword1", &[]);

        assert!(result.is_ok());
    }

    #[test]
    fn display_hides_password() {
        let password = ValidatedPassword::new("thisisaverysecurepassword!!!!", &[]).unwrap();

        assert_eq!(password.to_string(), "********");
    }
}
