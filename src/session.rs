use std::fmt;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::headers::DefaultHeaders;
use crate::hooks::ClientHooks;
use crate::ClientError;

/// Token endpoint of the administration API.
pub const TOKEN_PATH: &str = "/oauth/token";

const REFRESH_CLIENT_ID: &str = "administration";
const AUTHORIZATION: &str = "Authorization";

/// OAuth session of the administration client.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as milliseconds since the Unix epoch.
    pub expiration_time: i64,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        self.expiration_time <= now_millis()
    }
}

/// Grant used to obtain a session when no refresh token is stored.
#[derive(Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum Credentials {
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    Password {
        client_id: String,
        username: String,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scopes: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Password {
                client_id,
                username,
                ..
            } => f
                .debug_struct("Password")
                .field("client_id", client_id)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Holds the admin session and keeps it fresh.
///
/// At most one token exchange runs at a time: callers that find the session
/// expired queue on `refresh_lock` and re-check expiry once they hold it.
pub(crate) struct SessionManager {
    data: RwLock<SessionData>,
    credentials: Option<Credentials>,
    refresh_lock: Mutex<()>,
    headers: DefaultHeaders,
    hooks: ClientHooks,
}

impl SessionManager {
    pub(crate) fn new(
        data: SessionData,
        credentials: Option<Credentials>,
        headers: DefaultHeaders,
        hooks: ClientHooks,
    ) -> Self {
        Self {
            data: RwLock::new(normalized(data)),
            credentials,
            refresh_lock: Mutex::new(()),
            headers,
            hooks,
        }
    }

    pub(crate) fn get(&self) -> SessionData {
        self.data.read().clone()
    }

    /// Replaces the session and the `Authorization` header without firing `on_auth_change`.
    pub(crate) fn set(&self, data: SessionData) -> SessionData {
        let data = normalized(data);
        self.write_authorization(&data.access_token);
        *self.data.write() = data.clone();
        data
    }

    pub(crate) fn set_access_token(&self, token: String) -> SessionData {
        let mut data = self.get();
        data.access_token = token;
        self.set(data)
    }

    /// Runs a token exchange first when the session has expired.
    pub(crate) async fn ensure_fresh(&self, client: &ApiClient) -> Result<(), ClientError> {
        if !self.data.read().is_expired() {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.data.read().is_expired() {
            return Ok(());
        }

        let Some(grant) = self.grant_body() else {
            warn!(
                "no credentials or refresh token available for the admin client; \
                 sending the request unauthenticated"
            );
            return Ok(());
        };

        debug!("admin session expired, requesting a new token");
        client.request_token(grant).await
    }

    /// Updates the session from a response body carrying `access_token`.
    pub(crate) fn absorb(&self, body: &Value) {
        let Some(access_token) = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
        else {
            return;
        };

        let refresh_token = body
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let expires_in = body.get("expires_in").and_then(Value::as_i64).unwrap_or(0);

        let snapshot = self.set(SessionData {
            access_token: access_token.to_owned(),
            refresh_token,
            expiration_time: now_millis().saturating_add(expires_in.saturating_mul(1000)),
        });
        self.hooks.auth_change(&snapshot);
    }

    fn grant_body(&self) -> Option<Value> {
        let refresh_token = self.data.read().refresh_token.clone();
        select_grant(self.credentials.as_ref(), refresh_token.as_deref())
    }

    fn write_authorization(&self, access_token: &str) {
        if access_token.is_empty() {
            if self.headers.contains(AUTHORIZATION) {
                self.headers.remove(AUTHORIZATION);
            }
        } else {
            self.headers.set(AUTHORIZATION, authorization_header(access_token));
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("SessionManager")
            .field("expiration_time", &data.expiration_time)
            .field("has_refresh_token", &data.refresh_token.is_some())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Credentials win only while no refresh token is stored.
fn select_grant(credentials: Option<&Credentials>, refresh_token: Option<&str>) -> Option<Value> {
    match (credentials, refresh_token) {
        (Some(credentials), None) => serde_json::to_value(credentials).ok(),
        (_, Some(refresh_token)) => Some(json!({
            "grant_type": "refresh_token",
            "client_id": REFRESH_CLIENT_ID,
            "refresh_token": refresh_token,
        })),
        (None, None) => None,
    }
}

pub(crate) fn authorization_header(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_owned()
    } else {
        format!("Bearer {token}")
    }
}

fn normalized(mut data: SessionData) -> SessionData {
    if data.refresh_token.as_deref().is_some_and(str::is_empty) {
        data.refresh_token = None;
    }
    data
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
