//! Defines the crate level error type and how errors are shown to users.

/// The errors that may occur in the client.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request never produced an HTTP response, e.g. the server is
    /// unreachable or the connection was reset.
    ///
    /// Treated as status code 0.
    #[error("An error occured : {0}")]
    Network(String),

    /// The server answered with a non-success status code.
    ///
    /// `message` holds the `message` field of the response body when the
    /// server sent one.
    #[error("{}", format_http_error(*status, status_text))]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The canonical reason phrase for `status`.
        status_text: String,
        /// The message supplied by the server, if any.
        message: Option<String>,
    },

    /// The server answered with an envelope whose `success` flag is false.
    #[error("{0}")]
    Api(String),

    /// The session token is past its `exp` claim.
    #[error("your session has expired, please log in again")]
    TokenExpired,

    /// The session token could not be decoded.
    #[error("Invalid token format: {0}")]
    TokenMalformed(String),

    /// An amount that is zero, negative or not a number.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// The category is not one of the categories allowed for the kind of
    /// transaction.
    #[error("\"{category}\" is not a valid {kind} category")]
    InvalidCategory {
        /// The rejected category.
        category: String,
        /// The kind of transaction, e.g. "expense".
        kind: String,
    },

    /// The account label was empty.
    #[error("account cannot be empty")]
    EmptyAccount,

    /// The username was empty or contained whitespace.
    #[error("username cannot be empty or contain whitespace")]
    InvalidUsername,

    /// The password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unhandled/unexpected SQL error from the local storage database.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the local storage lock.
    #[error("could not acquire the storage lock")]
    StorageLockError,

    /// The action needs a signed in user.
    #[error("you are not logged in")]
    NotAuthenticated,

    /// No cached expense has the ID.
    #[error("there is no expense with the ID {0}")]
    ExpenseNotFound(i64),

    /// Reading from the terminal failed.
    #[error("could not read input: {0}")]
    Prompt(String),

    /// The configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// The status code used to classify this error, 0 for transport errors.
    ///
    /// Returns `None` for errors that did not come from a request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Network(_) => Some(0),
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the request as unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// The message to show the user.
    ///
    /// A message sent by the server takes precedence over the generic
    /// message for the status code.
    pub fn user_message(&self) -> String {
        match self {
            Error::Http {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            error => error.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => Error::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_owned(),
                message: None,
            },
            None => Error::Network(value.to_string()),
        }
    }
}

/// Map a status code to the message shown to users.
///
/// Status codes without a dedicated message fall back to a generic message
/// that includes the code and `status_text`.
pub fn format_http_error(status: u16, status_text: &str) -> String {
    let message = match status {
        0 => "Unable to reach the server, check your internet connection",
        400 => "The request was invalid, check the values you entered",
        401 => "Your session has expired, please log in again",
        403 => "You do not have permission to do that",
        404 => "The requested resource could not be found",
        409 => "The request conflicts with existing data",
        422 => "The server could not process the values you entered",
        500 => "The server encountered an internal error, try again later",
        502 => "The server is unreachable right now, try again later",
        503 => "The service is temporarily unavailable, try again later",
        504 => "The server took too long to respond, try again later",
        _ => {
            return format!("Server returned code: {status}, error message is {status_text}");
        }
    };

    message.to_owned()
}
