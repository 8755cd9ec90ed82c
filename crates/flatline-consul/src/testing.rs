//! In-memory transport with canned responses, for tests.
//!
//! Responses are queued per `(method, path)`. Each request pops the next
//! response; the last one stays in place and is replayed for every further
//! request on that route.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;

use crate::client::{ConsulRequest, ConsulResponse, Transport};
use crate::error::{ConsulError, ConsulResult};

#[derive(Default)]
struct Route {
    responses: VecDeque<ConsulResult<ConsulResponse>>,
    latency: Duration,
}

/// A `Transport` that records every request and replays scripted responses.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), Route>>,
    requests: Mutex<Vec<ConsulRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for a route.
    pub fn respond(
        &self,
        method: Method,
        path: &str,
        responses: Vec<ConsulResult<ConsulResponse>>,
    ) {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry((method, path.to_string()))
            .or_default()
            .responses
            .extend(responses);
    }

    /// Delay every response on a route, e.g. to stand in for a blocking query.
    pub fn latency(&self, method: Method, path: &str, latency: Duration) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry((method, path.to_string())).or_default().latency = latency;
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ConsulRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests seen for one route.
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<ConsulRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == *method && r.path == path)
            .cloned()
            .collect()
    }

    fn next_response(&self, request: &ConsulRequest) -> (Duration, ConsulResult<ConsulResponse>) {
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(&(request.method.clone(), request.path.clone())) else {
            return (Duration::ZERO, Err(unscripted(request)));
        };
        let response = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        (route.latency, response.unwrap_or_else(|| Err(unscripted(request))))
    }
}

fn unscripted(request: &ConsulRequest) -> ConsulError {
    ConsulError::Unexpected(format!(
        "no scripted response for {} {}",
        request.method, request.path
    ))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ConsulRequest) -> ConsulResult<ConsulResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let (latency, response) = self.next_response(request);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}
