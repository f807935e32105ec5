use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use thiserror::Error;

/// A fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Header pairs in the order they should be sent.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Looks up a header value, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Response headers keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl TransportResponse {
    /// Looks up a header value, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An exchange that never produced a status.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Request payload.
#[derive(Clone, Debug)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

/// A `multipart/form-data` payload.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    pub parts: Vec<MultipartPart>,
}

#[derive(Clone, Debug)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type,
            bytes,
        });
        self
    }
}

/// The network primitive a client dispatches through.
///
/// Implementations resolve with a [`TransportResponse`] for every exchange that
/// produced a status, including 4xx and 5xx, and with a [`TransportError`] only
/// when no status was received.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Whether the transport builds its own multipart boundary header.
    fn supports_multipart(&self) -> bool {
        true
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.http.request(request.method, request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            Some(RequestBody::Json(json_body)) => builder.json(&json_body),
            Some(RequestBody::Multipart(form)) => builder.multipart(build_form(form)?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let payload = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&payload),
        })
    }
}

fn build_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut multipart = reqwest::multipart::Form::new();
    for part in form.parts {
        multipart = match part {
            MultipartPart::Text { name, value } => multipart.text(name, value),
            MultipartPart::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                if let Some(mime_type) = mime_type {
                    file = file.mime_str(&mime_type)?;
                }
                multipart.part(name, file)
            }
        };
    }
    Ok(multipart)
}

/// Parses a response payload, keeping non-JSON text as a JSON string.
pub(crate) fn parse_body(payload: &str) -> Value {
    if payload.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_owned()))
}
