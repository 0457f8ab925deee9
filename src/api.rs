//! The client for the remote REST API.
//!
//! [AuthApi] and [ExpenseApi] are the seams the stores talk through,
//! [HttpApi] implements both over HTTP.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Error,
    config::ClientConfig,
    expense::{Expense, ExpenseId, FilterCriteria},
    notification::Notifier,
    session::Session,
};

/// The envelope the expense endpoints wrap their data in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// A human readable message, usually set on failure.
    #[serde(default)]
    pub message: String,
    /// The payload.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
        }
    }

    /// Take the payload out of the envelope.
    ///
    /// # Errors
    /// Returns [Error::Api] with the server's message if `success` is false,
    /// or if a successful response carries no data.
    pub fn into_result(self) -> Result<T, Error> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(Error::Api(
                "the server response did not include any data".to_owned(),
            )),
            (false, _) if self.message.trim().is_empty() => {
                Err(Error::Api("the server could not complete the request".to_owned()))
            }
            (false, _) => Err(Error::Api(self.message)),
        }
    }
}

/// The response of the login and signup endpoints.
///
/// These endpoints do not use the [ApiResponse] envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The bearer token, set on success.
    pub token: Option<String>,
    /// An error or info message.
    pub message: Option<String>,
    /// Whether the request failed.
    #[serde(default)]
    pub error: bool,
}

/// The credentials sent to the login endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// The username.
    pub username: String,
    /// The raw password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// The details sent to the signup endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// First and last name joined by a space, may be empty.
    pub full_name: String,
    /// The username.
    pub username: String,
    /// The raw password.
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("full_name", &self.full_name)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// The authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, Error>;

    /// Register a new user.
    async fn signup(&self, request: &RegisterRequest) -> Result<AuthResponse, Error>;
}

/// The expense endpoints.
#[async_trait]
pub trait ExpenseApi: Send + Sync {
    /// Fetch every expense of the signed in user.
    async fn list(&self) -> Result<Vec<Expense>, Error>;

    /// Save a new expense, returning it with its assigned ID.
    async fn create(&self, expense: &Expense) -> Result<Expense, Error>;

    /// Replace the expense with `id`.
    async fn update(&self, id: ExpenseId, expense: &Expense) -> Result<Expense, Error>;

    /// Delete the expense with `id`.
    async fn delete(&self, id: ExpenseId) -> Result<(), Error>;

    /// Fetch the expenses matching `criteria`, evaluated by the server.
    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>, Error>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Talks to the remote API over HTTP.
///
/// Every request except login and signup carries the session's bearer token.
/// A 401 response signs the session out, and every failure is also shown
/// as an error notification.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    config: ClientConfig,
    session: Session,
    notifier: Notifier,
}

impl HttpApi {
    /// Create a client for the API described by `config`.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the config is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig, session: Session, notifier: Notifier) -> Result<Self, Error> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| Error::InvalidConfig(error.to_string()))?;

        Ok(Self {
            client,
            config,
            session,
            notifier,
        })
    }

    fn expenses_url(&self) -> String {
        self.config.url(&self.config.endpoints.expenses)
    }

    fn expense_url(&self, id: ExpenseId) -> String {
        format!("{}/{id}", self.expenses_url())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        tracing::debug!("{method} {url}");
        let request = self.client.request(method, url);

        if self.config.is_public_endpoint(url) {
            return request;
        }

        match self.session.valid_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_text = status.canonical_reason().unwrap_or_default().to_owned();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.message);

        Err(Error::Http {
            status: status.as_u16(),
            status_text,
            message,
        })
    }

    /// Run the error side effects for a finished request.
    fn report<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(error) = &result {
            tracing::warn!("Request failed: {error:?}");

            if error.is_unauthorized() {
                self.session.clear();
            }

            self.notifier.error(error.user_message());
        }

        result
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let result = match self.send(request).await {
            Ok(response) => read_json(response).await,
            Err(error) => Err(error),
        };

        self.report(result)
    }

    async fn call_envelope<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let envelope: ApiResponse<T> = self.call(request).await?;

        self.report(envelope.into_result())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await?;

    serde_json::from_slice(&bytes)
        .map_err(|error| Error::Api(format!("unexpected response from the server: {error}")))
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, Error> {
        let url = self.config.url(&self.config.endpoints.login);

        self.call(self.request(Method::POST, &url).json(request))
            .await
    }

    async fn signup(&self, request: &RegisterRequest) -> Result<AuthResponse, Error> {
        let url = self.config.url(&self.config.endpoints.signup);

        self.call(self.request(Method::POST, &url).json(request))
            .await
    }
}

#[async_trait]
impl ExpenseApi for HttpApi {
    async fn list(&self) -> Result<Vec<Expense>, Error> {
        self.call_envelope(self.request(Method::GET, &self.expenses_url()))
            .await
    }

    async fn create(&self, expense: &Expense) -> Result<Expense, Error> {
        self.call_envelope(self.request(Method::POST, &self.expenses_url()).json(expense))
            .await
    }

    async fn update(&self, id: ExpenseId, expense: &Expense) -> Result<Expense, Error> {
        self.call_envelope(self.request(Method::PUT, &self.expense_url(id)).json(expense))
            .await
    }

    async fn delete(&self, id: ExpenseId) -> Result<(), Error> {
        let result: Result<(), Error> = async {
            let response = self
                .send(self.request(Method::DELETE, &self.expense_url(id)))
                .await?;
            let bytes = response.bytes().await?;

            // The body is optional, but an explicit failure must not be ignored.
            match serde_json::from_slice::<ApiResponse<serde_json::Value>>(&bytes) {
                Ok(envelope) if !envelope.success => envelope.into_result().map(|_| ()),
                _ => Ok(()),
            }
        }
        .await;

        self.report(result)
    }

    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>, Error> {
        let url = format!("{}/filter", self.expenses_url());

        self.call_envelope(self.request(Method::POST, &url).json(criteria))
            .await
    }
}
