use std::collections::HashMap;
use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::transport::{TransportError, TransportResponse};

const UNKNOWN_ERROR_TITLE: &str = "Unknown error";
const UNKNOWN_ERROR_DETAIL: &str =
    "API did not return errors, but request failed. Please check the network tab.";
const MISSING_DETAIL: &str = "No error details provided.";
const NETWORK_FAILURE: &str = "Network request failed";

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// The requested operation id is not registered in the client's catalog.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// An operation id is not of the form `<name> <method> <path>`.
    #[error("invalid operation id '{id}': {reason}")]
    InvalidOperationId { id: String, reason: &'static str },

    /// A required path template parameter was not provided.
    #[error("missing required path parameter '{parameter}' for '{template}'")]
    MissingPathParameter { template: String, parameter: String },

    /// The operation needs request parameters but none were passed.
    #[error("operation '{0}' requires parameters")]
    MissingParameters(String),

    /// Query parameters must be given as a JSON object.
    #[error("query parameters must be a JSON object, got {0}")]
    InvalidQuery(String),

    /// A caller-supplied argument violates a precondition.
    #[error("{0}")]
    InvalidArgument(String),

    /// The exchange never completed (connection, DNS, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The exchange completed with a status outside `200..300`.
    #[error(transparent)]
    Api(Box<ApiClientError>),

    /// A request or response payload could not be (de)serialized.
    #[error("failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the API error details when the server answered with a failure status.
    pub fn as_api_error(&self) -> Option<&ApiClientError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }

    /// Returns true for errors raised before any request was sent.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Api(_) | Self::Json(_))
    }
}

/// One entry of the `errors` array in a failed API response.
///
/// Scalar fields accept strings, numbers or booleans; anything else reads as absent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Location of the offending field inside the request payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ErrorSource {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
}

impl ApiError {
    fn unknown() -> Self {
        Self {
            title: Some(UNKNOWN_ERROR_TITLE.to_owned()),
            detail: Some(UNKNOWN_ERROR_DETAIL.to_owned()),
            ..Self::default()
        }
    }

    fn message_line(&self) -> String {
        let title = self.title.as_deref().unwrap_or_default();
        let pointer = self
            .source
            .as_ref()
            .and_then(|source| source.pointer.as_deref())
            .filter(|pointer| !pointer.is_empty())
            .map(|pointer| format!("[{pointer}]"))
            .unwrap_or_default();
        let detail = self.detail.as_deref().unwrap_or(MISSING_DETAIL);
        format!("\n - [{title}]{pointer} {detail}")
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

fn lenient_source<'de, D>(deserializer: D) -> Result<Option<ErrorSource>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

/// Decodes each entry of `errors` on its own; entries that are not objects are skipped.
fn decode_errors(body: &Value) -> Vec<ApiError> {
    body.get("errors")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|entry| entry.is_object())
                .filter_map(|entry| ApiError::deserialize(entry).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// A completed HTTP exchange whose status was outside `200..300`.
#[derive(Clone, Debug)]
pub struct ApiClientError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Reason phrase for `status`.
    pub status_text: String,
    /// URL of the request.
    pub url: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Errors reported by the server, or a single synthetic entry.
    pub errors: Vec<ApiError>,
    message: String,
}

impl ApiClientError {
    /// Human-readable, multi-line description built from all errors.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiClientError {}

/// Converts a completed response with a failure status into [`ClientError::Api`].
pub fn normalize_response(response: &TransportResponse, url: &str) -> ClientError {
    let mut errors = decode_errors(&response.body);
    if errors.is_empty() {
        errors.push(ApiError::unknown());
    }

    let mut message = String::from("Failed request");
    for error in &errors {
        message.push_str(&error.message_line());
    }

    let status_text = StatusCode::from_u16(response.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Error")
        .to_owned();

    ClientError::Api(Box::new(ApiClientError {
        status: response.status,
        status_text,
        url: url.to_owned(),
        headers: response.headers.clone(),
        errors,
        message,
    }))
}

/// Converts a failed exchange without a status into [`ClientError::Transport`].
pub fn normalize_transport(error: TransportError) -> ClientError {
    if error.message.trim().is_empty() {
        ClientError::Transport(TransportError::new(NETWORK_FAILURE))
    } else {
        ClientError::Transport(error)
    }
}
