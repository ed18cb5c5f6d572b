//! Bearer-token authorization gate.
//!
//! Wraps the routing step: `gate.authorize(&request, |r| router.dispatch(r))`.
//! The downstream closure runs only when the `Authorization` header (exact
//! key casing) equals `Bearer <token>`.

use thiserror::Error;

use crate::config::AuthConfig;
use crate::http::request::Request;
use crate::http::response::{self, Response};

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    Missing,

    #[error("invalid bearer credential")]
    Invalid,
}

impl AuthError {
    /// The reply sent in place of the handler's output.
    pub fn to_response(&self) -> Response {
        Response::new("Unauthorized", response::UNAUTHORIZED)
    }
}

#[derive(Debug, Clone)]
pub struct BearerGate {
    expected: String,
}

impl BearerGate {
    pub fn new(token: &str) -> Self {
        Self {
            expected: format!("Bearer {token}"),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            expected: config.expected_header(),
        }
    }

    /// Check the credential without running anything.
    pub fn check(&self, request: &Request) -> Result<(), AuthError> {
        match request.header(AUTHORIZATION) {
            None => Err(AuthError::Missing),
            Some(value) if value == self.expected => Ok(()),
            Some(_) => Err(AuthError::Invalid),
        }
    }

    /// Run `next` only for authorized requests.
    pub fn authorize<T, F>(&self, request: &Request, next: F) -> Result<T, AuthError>
    where
        F: FnOnce(&Request) -> T,
    {
        self.check(request)?;
        Ok(next(request))
    }
}
