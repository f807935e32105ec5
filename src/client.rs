use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{normalize_response, normalize_transport};
use crate::headers::{DefaultHeaders, merge_headers};
use crate::hooks::{ClientHooks, ResponseFailure};
use crate::path::{append_query, render_path};
use crate::session::{SessionManager, TOKEN_PATH};
use crate::transport::{
    MultipartForm, ReqwestTransport, RequestBody, Transport, TransportRequest, TransportResponse,
};
use crate::ClientError;

/// Client-wide transport settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Timeout applied to every request unless overridden per call.
    pub timeout: Option<Duration>,
}

/// Current base configuration of a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

/// Partial update for [`BaseConfig`]. `None` fields leave the current value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaseConfigUpdate {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

/// Transport-specific overrides, applied after everything else.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    /// Headers that win over both request and default headers.
    pub headers: Vec<(String, String)>,
}

/// Inputs for one request. All parts are optional.
#[derive(Clone, Debug, Default)]
pub struct RequestParams {
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// JSON object of query parameters; `null` entries are skipped.
    pub query: Value,
    pub path_params: Vec<(String, String)>,
    pub options: RequestOptions,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serializes `body` as the JSON request payload.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ClientError> {
        Ok(self.body(serde_json::to_value(body)?))
    }

    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    #[must_use]
    pub fn query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn raw_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }
}

/// Successful response: payload, status and headers.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl ApiResponse<Value> {
    /// Decodes `data` into `T`, keeping status and headers.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, ClientError> {
        Ok(ApiResponse {
            data: serde_json::from_value(self.data)?,
            status: self.status,
            headers: self.headers,
        })
    }
}

/// Generic async JSON REST client.
///
/// This is the request engine shared by [`crate::StoreApiClient`] and
/// [`crate::AdminApiClient`]. It has no operation catalog; pass method and path
/// directly. Clones share headers, configuration and session state.
#[derive(Clone, Debug)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    base: RwLock<Base>,
    default_headers: DefaultHeaders,
    hooks: ClientHooks,
    transport: Arc<dyn Transport>,
    fetch_options: FetchOptions,
    context_header: Option<&'static str>,
    session: Option<SessionManager>,
}

#[derive(Debug)]
struct Base {
    url: Url,
    config: BaseConfig,
}

/// Everything a client variant wires into the engine.
pub(crate) struct EngineParts {
    pub base_url: String,
    pub access_token: Option<String>,
    pub default_headers: DefaultHeaders,
    pub hooks: ClientHooks,
    pub transport: Arc<dyn Transport>,
    pub fetch_options: FetchOptions,
    /// Response header carrying a rotating context token, if any.
    pub context_header: Option<&'static str>,
    pub session: Option<SessionManager>,
}

impl ApiClient {
    /// Creates a new client with the given base URL.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Self::from_parts(EngineParts {
            base_url: base_url.as_ref().to_owned(),
            access_token: None,
            default_headers: DefaultHeaders::new([("Accept", Some("application/json"))], |_, _| {}),
            hooks: ClientHooks::default(),
            transport: Arc::new(ReqwestTransport::new()),
            fetch_options: FetchOptions::default(),
            context_header: None,
            session: None,
        })
    }

    pub(crate) fn from_parts(parts: EngineParts) -> Result<Self, ClientError> {
        let url = parse_base_url(&parts.base_url)?;
        Ok(Self {
            inner: Arc::new(Inner {
                base: RwLock::new(Base {
                    url,
                    config: BaseConfig {
                        base_url: parts.base_url,
                        access_token: parts.access_token,
                    },
                }),
                default_headers: parts.default_headers,
                hooks: parts.hooks,
                transport: parts.transport,
                fetch_options: parts.fetch_options,
                context_header: parts.context_header,
                session: parts.session,
            }),
        })
    }

    /// Headers sent with every request unless overridden per call.
    pub fn default_headers(&self) -> &DefaultHeaders {
        &self.inner.default_headers
    }

    pub fn get_base_config(&self) -> BaseConfig {
        self.inner.base.read().config.clone()
    }

    /// Applies the present fields of `update`. A new base URL is validated first;
    /// on error nothing changes.
    pub fn update_base_config(&self, update: BaseConfigUpdate) -> Result<(), ClientError> {
        let url = update.base_url.as_deref().map(parse_base_url).transpose()?;
        let mut base = self.inner.base.write();
        if let (Some(url), Some(raw)) = (url, update.base_url) {
            base.url = url;
            base.config.base_url = raw;
        }
        if let Some(token) = update.access_token {
            base.config.access_token = Some(token);
        }
        Ok(())
    }

    pub(crate) fn session(&self) -> Option<&SessionManager> {
        self.inner.session.as_ref()
    }

    /// Sends a `POST` request with a JSON body and returns the parsed JSON payload.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        Ok(self
            .request(Method::POST, path, RequestParams::new().body(body))
            .await?
            .data)
    }

    /// Sends a request.
    ///
    /// `path` may contain `{name}` placeholders filled from `params.path_params`.
    /// Responses outside `200..300` are returned as [`ClientError::Api`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: RequestParams,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let rendered = render_path(path, &params.path_params)?;
        let rendered = append_query(&rendered, &params.query)?;
        let url = self.build_url(&rendered)?;

        if let Some(session) = &self.inner.session
            && !is_token_endpoint(&url)
        {
            session.ensure_fresh(self).await?;
        }

        self.dispatch(method, url, &params.headers, params.body, params.options)
            .await
    }

    /// Posts an OAuth grant to the token endpoint without a session check.
    pub(crate) async fn request_token(&self, grant: Value) -> Result<(), ClientError> {
        let url = self.build_url(TOKEN_PATH)?;
        self.dispatch(
            Method::POST,
            url,
            &[],
            Some(RequestBody::Json(grant)),
            RequestOptions::default(),
        )
        .await?;
        Ok(())
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        headers: &[(String, String)],
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let transport = Arc::clone(&self.inner.transport);

        let mut merged = merge_headers(self.inner.default_headers.snapshot(), headers);
        if matches!(body, Some(RequestBody::Multipart(_))) && transport.supports_multipart() {
            merged.retain(|(name, value)| !is_multipart_content_type(name, value));
        }
        let merged = merge_headers(merged, &options.headers);

        let request = TransportRequest {
            method,
            url,
            headers: merged,
            body,
            timeout: options.timeout.or(self.inner.fetch_options.timeout),
        };
        let url = request.url.to_string();

        self.inner.hooks.request(&request);
        debug!(method = %request.method, url = %url, "dispatching request");

        match transport.send(request).await {
            Ok(response) if response.is_success() => {
                self.handle_success(&response);
                Ok(ApiResponse {
                    data: response.body,
                    status: response.status,
                    headers: response.headers,
                })
            }
            Ok(response) => {
                debug!(status = response.status, url = %url, "request failed");
                self.inner
                    .hooks
                    .response_error(ResponseFailure::Response(&response));
                Err(normalize_response(&response, &url))
            }
            Err(error) => {
                debug!(error = %error, url = %url, "transport failure");
                self.inner
                    .hooks
                    .response_error(ResponseFailure::Transport(&error));
                Err(normalize_transport(error))
            }
        }
    }

    fn handle_success(&self, response: &TransportResponse) {
        self.inner.hooks.success_response(response);

        if let Some(header) = self.inner.context_header
            && let Some(token) = response.header(header).filter(|token| !token.is_empty())
            && self.inner.default_headers.get(header).as_deref() != Some(token)
        {
            self.inner.default_headers.set(header, token);
        }

        if let Some(session) = &self.inner.session {
            session.absorb(&response.body);
        }
    }

    fn build_url(&self, path: &str) -> Result<Url, ClientError> {
        let relative = path.trim_start_matches('/');
        self.inner
            .base
            .read()
            .url
            .join(relative)
            .map_err(|_| ClientError::InvalidPath(path.to_owned()))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw)
        .map(ensure_trailing_slash)
        .map_err(|_| ClientError::InvalidBaseUrl(raw.to_owned()))
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}

fn is_token_endpoint(url: &Url) -> bool {
    url.path().ends_with(TOKEN_PATH)
}

fn is_multipart_content_type(name: &str, value: &str) -> bool {
    name.eq_ignore_ascii_case("content-type")
        && value
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("multipart/form-data")
}

#[cfg(test)]
mod tests {
    use super::{ApiClient, BaseConfigUpdate, is_multipart_content_type};
    use crate::ClientError;

    #[test]
    fn joins_paths_from_base_with_nested_prefix() {
        let client = ApiClient::new("https://example.com/store-api").expect("valid url");
        let resolved = client.build_url("/context?p=1").expect("valid path");
        assert_eq!(resolved.as_str(), "https://example.com/store-api/context?p=1");
    }

    #[test]
    fn rejects_relative_base_url() {
        let error = ApiClient::new("/store-api").expect_err("relative url");
        assert!(matches!(error, ClientError::InvalidBaseUrl(_)));
    }

    #[test]
    fn update_base_config_merges_present_fields() {
        let client = ApiClient::new("https://example.com/api").expect("valid url");
        client
            .update_base_config(BaseConfigUpdate {
                access_token: Some("key".to_owned()),
                ..BaseConfigUpdate::default()
            })
            .expect("update");
        client
            .update_base_config(BaseConfigUpdate {
                base_url: Some("https://other.test/api".to_owned()),
                access_token: None,
            })
            .expect("update");

        let config = client.get_base_config();
        assert_eq!(config.base_url, "https://other.test/api");
        assert_eq!(config.access_token.as_deref(), Some("key"));
        let resolved = client.build_url("/context").expect("valid path");
        assert_eq!(resolved.as_str(), "https://other.test/api/context");
    }

    #[test]
    fn invalid_update_leaves_config_untouched() {
        let client = ApiClient::new("https://example.com/api").expect("valid url");
        let error = client
            .update_base_config(BaseConfigUpdate {
                base_url: Some("not a url".to_owned()),
                access_token: Some("ignored".to_owned()),
            })
            .expect_err("invalid url");
        assert!(matches!(error, ClientError::InvalidBaseUrl(_)));
        assert_eq!(client.get_base_config().access_token, None);
    }

    #[test]
    fn detects_multipart_content_type() {
        assert!(is_multipart_content_type(
            "Content-Type",
            "multipart/form-data; boundary=x"
        ));
        assert!(!is_multipart_content_type("content-type", "application/json"));
        assert!(!is_multipart_content_type("accept", "multipart/form-data"));
    }
}
