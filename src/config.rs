//! Settings for talking to the remote API.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The paths of the API endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Exchanges credentials for a token.
    pub login: String,
    /// Registers a new user and returns a token.
    pub signup: String,
    /// The expense collection.
    pub expenses: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/login".to_owned(),
            signup: "/signup".to_owned(),
            expenses: "/expenses".to_owned(),
        }
    }
}

/// The client configuration.
///
/// Every field has a default, so a config file only needs to set what it
/// changes, usually just `api_base_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The URL every endpoint path is appended to, e.g. "http://localhost:3000".
    pub api_base_url: String,
    /// The endpoint paths.
    pub endpoints: Endpoints,
    /// How long login, signup and filter actions wait for a newer action
    /// before they are dispatched, in milliseconds.
    pub debounce_ms: u64,
    /// How long to wait for the server to respond, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_owned(),
            endpoints: Endpoints::default(),
            debounce_ms: 200,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Create the default config pointing at `api_base_url`.
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.to_owned(),
            ..Self::default()
        }
    }

    /// Load a config from the JSON file at `path`.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the file cannot be read, is not
    /// valid JSON, or fails [ClientConfig::validate].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|error| Error::InvalidConfig(format!("could not read {path:?}: {error}")))?;

        Self::from_json(&text)
    }

    /// Parse a config from JSON text.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the text is not valid JSON or fails
    /// [ClientConfig::validate].
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(text).map_err(|error| Error::InvalidConfig(error.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Check that the config can be used to build requests.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the base URL is empty or an endpoint
    /// path does not start with '/'.
    pub fn validate(&self) -> Result<(), Error> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("api_base_url cannot be empty".to_owned()));
        }

        for (name, path) in [
            ("login", &self.endpoints.login),
            ("signup", &self.endpoints.signup),
            ("expenses", &self.endpoints.expenses),
        ] {
            if !path.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "the {name} endpoint \"{path}\" must start with '/'"
                )));
            }
        }

        Ok(())
    }

    /// The full URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    /// Whether `url` can be requested without a bearer token.
    ///
    /// Only the login and signup endpoints under `api_base_url` are public.
    pub fn is_public_endpoint(&self, url: &str) -> bool {
        let Some(path) = url.strip_prefix(self.api_base_url.trim_end_matches('/')) else {
            return false;
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        path == self.endpoints.login || path == self.endpoints.signup
    }

    /// The debounce delay as a [Duration].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The request timeout as a [Duration].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::ClientConfig;

    #[test]
    fn partial_json_uses_defaults() {
        let config = ClientConfig::from_json(r#"{"api_base_url": "https://api.example.com"}"#)
            .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.endpoints.login, "/login");
        assert_eq!(config.endpoints.signup, "/signup");
        assert_eq!(config.endpoints.expenses, "/expenses");
        assert_eq!(config.debounce_ms, 200);
    }

    #[test]
    fn endpoints_can_be_renamed() {
        let config = ClientConfig::from_json(
            r#"{"api_base_url": "http://localhost", "endpoints": {"signup": "/register"}}"#,
        )
        .unwrap();

        assert_eq!(config.endpoints.signup, "/register");
        assert_eq!(config.endpoints.login, "/login");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = ClientConfig::from_json(r#"{"api_base_url": " "}"#);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn relative_endpoint_is_rejected() {
        let result = ClientConfig::from_json(
            r#"{"api_base_url": "http://localhost", "endpoints": {"login": "login"}}"#,
        );

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            ClientConfig::from_json("{"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = ClientConfig::new("http://localhost:3000/");

        assert_eq!(
            config.url(&config.endpoints.expenses),
            "http://localhost:3000/expenses"
        );
    }

    #[test]
    fn login_and_signup_are_public() {
        let config = ClientConfig::new("http://localhost:3000");

        assert!(config.is_public_endpoint("http://localhost:3000/login"));
        assert!(config.is_public_endpoint("http://localhost:3000/signup"));
        assert!(!config.is_public_endpoint("http://localhost:3000/expenses"));
    }

    #[test]
    fn host_named_like_an_endpoint_is_not_public() {
        let config = ClientConfig::new("https://login.example.com");

        assert!(!config.is_public_endpoint(&config.url(&config.endpoints.expenses)));
        assert!(config.is_public_endpoint(&config.url(&config.endpoints.login)));

        let config = ClientConfig::new("https://api.example.com/signup");
        assert!(!config.is_public_endpoint(&config.url(&config.endpoints.expenses)));
    }

    #[test]
    fn endpoints_under_other_paths_are_not_public() {
        let config = ClientConfig::new("http://localhost:3000");

        assert!(!config.is_public_endpoint("http://localhost:3000/expenses/login"));
        assert!(!config.is_public_endpoint("http://elsewhere:3000/login"));
        assert!(config.is_public_endpoint("http://localhost:3000/login?next=/expenses"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "http://example.test", "debounce_ms": 0}"#)
            .unwrap();

        let config = ClientConfig::load(&path).unwrap();

        assert_eq!(config.api_base_url, "http://example.test");
        assert_eq!(config.debounce_ms, 0);
    }
}
