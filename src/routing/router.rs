//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Map (method, path) to a [`Route`]
//! - Run the matching handler and return its outcome
//!
//! # Design Decisions
//! - Rules are evaluated in a fixed order; the first match wins
//! - Special paths take precedence over method handlers
//! - Immutable after construction (shared across tasks without locks)

use thiserror::Error;

use crate::config::{CannedConfig, CannedResponse};
use crate::http::request::Request;
use crate::http::response::{self, Response};
use crate::routing::canned::{CannedSequence, SequenceExhausted};

pub const GENERATE_PATH: &str = "/generate-response";
pub const STREAM_PATH: &str = "/stream-response";

/// The handler selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Canned,
    Stream,
    Get,
    Post,
    MethodNotAllowed,
}

/// Result of running a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// A complete response ready to be written.
    Buffered(Response),
    /// The connection must be handed to the streaming engine.
    Stream,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Exhausted(#[from] SequenceExhausted),
}

/// Fixed route table.
#[derive(Debug, Clone)]
pub struct Router {
    canned: Vec<CannedResponse>,
}

impl Router {
    pub fn new(canned: Vec<CannedResponse>) -> Self {
        Self { canned }
    }

    pub fn from_config(config: &CannedConfig) -> Self {
        Self::new(config.responses.clone())
    }

    /// Select the handler for a request.
    pub fn resolve(&self, request: &Request) -> Route {
        match (request.path(), request.method()) {
            (GENERATE_PATH, _) => Route::Canned,
            (STREAM_PATH, _) => Route::Stream,
            (_, "GET") => Route::Get,
            (_, "POST") => Route::Post,
            _ => Route::MethodNotAllowed,
        }
    }

    /// Run the handler for an already resolved route.
    pub fn handle(&self, route: Route, request: &Request) -> Result<Handled, RouteError> {
        let reply = match route {
            Route::Canned => self.canned_response()?,
            Route::Stream => return Ok(Handled::Stream),
            Route::Get => handle_get(request),
            Route::Post => handle_post(request),
            Route::MethodNotAllowed => Response::new("Method not allowed", response::METHOD_NOT_ALLOWED),
        };
        Ok(Handled::Buffered(reply))
    }

    /// Resolve and handle in one step.
    pub fn dispatch(&self, request: &Request) -> Result<Handled, RouteError> {
        self.handle(self.resolve(request), request)
    }

    // A fresh sequence per call: every request sees the head of the list.
    fn canned_response(&self) -> Result<Response, SequenceExhausted> {
        let mut sequence = CannedSequence::new(self.canned.iter().cloned());
        let canned = sequence.next_response()?;
        Ok(Response::new(canned.body, canned.status))
    }
}

fn handle_get(request: &Request) -> Response {
    Response::new(format!("Handled GET request for {}", request.path()), response::OK)
}

fn handle_post(request: &Request) -> Response {
    Response::new(format!("Handled POST request for {}", request.path()), response::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(method: &str, path: &str) -> Request {
        Request::new(method, path, HashMap::new())
    }

    fn router() -> Router {
        Router::from_config(&CannedConfig::default())
    }

    fn buffered(handled: Handled) -> Response {
        match handled {
            Handled::Buffered(r) => r,
            Handled::Stream => panic!("expected buffered response"),
        }
    }

    #[test]
    fn resolves_in_rule_order() {
        let router = router();
        assert_eq!(router.resolve(&request("POST", GENERATE_PATH)), Route::Canned);
        assert_eq!(router.resolve(&request("DELETE", STREAM_PATH)), Route::Stream);
        assert_eq!(router.resolve(&request("GET", "/x")), Route::Get);
        assert_eq!(router.resolve(&request("POST", "/x")), Route::Post);
        assert_eq!(router.resolve(&request("PUT", "/x")), Route::MethodNotAllowed);
        assert_eq!(router.resolve(&request("get", "/x")), Route::MethodNotAllowed);
    }

    #[test]
    fn generic_handlers_echo_path() {
        let router = router();
        for path in ["/test", "/a/b/c", "/"] {
            let get = buffered(router.dispatch(&request("GET", path)).unwrap());
            assert_eq!(get, Response::new(format!("Handled GET request for {path}"), 200));

            let post = buffered(router.dispatch(&request("POST", path)).unwrap());
            assert_eq!(post, Response::new(format!("Handled POST request for {path}"), 201));
        }
    }

    #[test]
    fn other_methods_rejected() {
        let response = buffered(router().dispatch(&request("DELETE", "/delete")).unwrap());
        assert_eq!(response, Response::new("Method not allowed", 405));
    }

    #[test]
    fn canned_route_restarts_sequence_each_call() {
        let router = router();
        for _ in 0..4 {
            let response = buffered(router.dispatch(&request("GET", GENERATE_PATH)).unwrap());
            assert_eq!(response, Response::new("Hello, World!", 200));
        }
    }

    #[test]
    fn empty_canned_list_is_explicit_error() {
        let router = Router::new(Vec::new());
        let err = router.dispatch(&request("GET", GENERATE_PATH)).unwrap_err();
        assert!(matches!(err, RouteError::Exhausted(SequenceExhausted { served: 0 })));
    }

    #[test]
    fn stream_route_defers_to_engine() {
        assert_eq!(
            router().dispatch(&request("GET", STREAM_PATH)).unwrap(),
            Handled::Stream
        );
    }
}
