#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use storefront_client::{
    RequestBody, TOKEN_PATH, Transport, TransportError, TransportRequest, TransportResponse,
};

/// In-process transport that records requests and answers from a script.
#[derive(Debug)]
pub struct ScriptedTransport {
    requests: Mutex<Vec<TransportRequest>>,
    token_status: u16,
    token_delay: Duration,
    api_body: Value,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            token_status: 200,
            token_delay: Duration::ZERO,
            api_body: json!({"ok": true}),
        }
    }

    pub fn failing_token_endpoint(mut self, status: u16) -> Self {
        self.token_status = status;
        self
    }

    pub fn slow_token_endpoint(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub fn api_body(mut self, body: Value) -> Self {
        self.api_body = body;
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn token_requests(&self) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.path().ends_with(TOKEN_PATH))
            .collect()
    }

    pub fn api_requests(&self) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|request| !request.url.path().ends_with(TOKEN_PATH))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let is_token = request.url.path().ends_with(TOKEN_PATH);
        self.requests.lock().push(request);

        if !is_token {
            return Ok(response(200, self.api_body.clone()));
        }

        tokio::time::sleep(self.token_delay).await;
        if self.token_status == 200 {
            Ok(response(
                200,
                json!({"access_token": "fresh", "refresh_token": "r2", "expires_in": 600}),
            ))
        } else {
            Ok(response(
                self.token_status,
                json!({"errors": [{
                    "title": "Unauthorized",
                    "detail": "The refresh token is invalid."
                }]}),
            ))
        }
    }
}

pub fn response(status: u16, body: Value) -> TransportResponse {
    TransportResponse {
        status,
        headers: HashMap::new(),
        body,
    }
}

pub fn json_body(request: &TransportRequest) -> Value {
    match &request.body {
        Some(RequestBody::Json(body)) => body.clone(),
        _ => Value::Null,
    }
}
