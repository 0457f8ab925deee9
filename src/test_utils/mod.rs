#![allow(missing_docs)]

pub(crate) mod fake;
pub(crate) mod http;
pub(crate) mod token;

pub(crate) use fake::{FakeApi, Gate};
pub(crate) use http::spawn_mock_server;
pub(crate) use token::{expired_token, make_token, valid_token};
