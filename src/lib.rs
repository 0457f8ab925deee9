//! A client for a personal finance API.
//!
//! Users sign in or sign up, then create, list, filter, edit and delete
//! expense and income transactions stored on a remote server.
//!
//! User intents flow through an [ActionStream] into a [StateStore]: the
//! [AuthStore] handles signing in and out, the [ExpenseStore] keeps a cache
//! of the user's transactions and reconciles it with the server's
//! responses. [App] wires both stores to a shared [Session] and the HTTP
//! client.

#![warn(missing_docs)]

pub mod action;
pub mod api;
mod app;
pub mod auth;
pub mod config;
mod error;
pub mod expense;
pub mod jwt;
pub mod navigation;
pub mod notification;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use action::{ActionStream, StateStore};
pub use app::App;
pub use auth::AuthStore;
pub use config::ClientConfig;
pub use error::{Error, format_http_error};
pub use expense::ExpenseStore;
pub use session::Session;
