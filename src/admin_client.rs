use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::{Operation, OperationCatalog, OperationDefinition};
use crate::client::{
    ApiClient, ApiResponse, BaseConfig, BaseConfigUpdate, EngineParts, FetchOptions, RequestParams,
};
use crate::headers::DefaultHeaders;
use crate::hooks::ClientHooks;
use crate::invoke::Invoker;
use crate::session::{Credentials, SessionData, SessionManager, authorization_header};
use crate::transport::{ReqwestTransport, Transport};
use crate::ClientError;

/// Administration operations known out of the box, as `(id, requires_params)`.
pub const ADMIN_OPERATIONS: &[(&str, bool)] = &[
    ("token post /oauth/token", true),
    ("infoShopwareVersion get /_info/version", false),
    ("searchOrder post /search/order", false),
    ("getOrder get /order/{id}", true),
    ("updateOrder patch /order/{id}", true),
];

/// Administration API client with an OAuth session.
///
/// Before every request except the token exchange itself, an expired session
/// is renewed with the stored refresh token or the configured [`Credentials`].
#[derive(Clone, Debug)]
pub struct AdminApiClient {
    invoker: Invoker,
}

impl AdminApiClient {
    pub fn builder(base_url: impl Into<String>) -> AdminApiClientBuilder {
        AdminApiClientBuilder {
            base_url: base_url.into(),
            credentials: None,
            session_data: None,
            default_headers: Vec::new(),
            fetch_options: FetchOptions::default(),
            hooks: ClientHooks::default(),
            transport: None,
            catalog: None,
        }
    }

    /// Calls an operation by id, e.g. `searchOrder post /search/order`.
    pub async fn invoke(
        &self,
        operation_id: &str,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.invoker.invoke(operation_id, params).await
    }

    /// Like [`Self::invoke`], decoding the payload into `T`.
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        operation_id: &str,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.invoker.invoke_as(operation_id, params).await
    }

    /// Calls a statically described operation.
    pub async fn call<O: Operation>(
        &self,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<O::Response>, ClientError> {
        self.invoker.call::<O>(params).await
    }

    pub fn register_operation(
        &self,
        operation_id: &str,
        requires_params: bool,
    ) -> Result<Arc<OperationDefinition>, ClientError> {
        self.invoker.register(operation_id, requires_params)
    }

    pub fn operations(&self) -> Vec<OperationDefinition> {
        self.invoker.operations()
    }

    /// The underlying request engine, for calls outside the catalog.
    pub fn api(&self) -> &ApiClient {
        self.invoker.engine()
    }

    pub fn default_headers(&self) -> &DefaultHeaders {
        self.api().default_headers()
    }

    /// Returns a copy of the current session.
    pub fn get_session_data(&self) -> SessionData {
        self.session().map(SessionManager::get).unwrap_or_default()
    }

    /// Replaces the session and the `Authorization` header.
    ///
    /// Does not fire `on_auth_change`.
    pub fn set_session_data(&self, data: SessionData) -> SessionData {
        match self.session() {
            Some(session) => session.set(data),
            None => data,
        }
    }

    /// Applies the present fields. A new access token replaces the session's
    /// token and `Authorization` header; refresh token and expiry are kept, so an
    /// already expired session is still renewed before the next request. Use
    /// [`Self::set_session_data`] to install a token with a known lifetime.
    pub fn update_base_config(&self, update: BaseConfigUpdate) -> Result<(), ClientError> {
        self.api().update_base_config(BaseConfigUpdate {
            base_url: update.base_url,
            access_token: None,
        })?;
        if let (Some(token), Some(session)) = (update.access_token, self.session()) {
            session.set_access_token(token);
        }
        Ok(())
    }

    /// Base URL plus the current session access token, if any.
    pub fn get_base_config(&self) -> BaseConfig {
        BaseConfig {
            access_token: Some(self.get_session_data().access_token)
                .filter(|token| !token.is_empty()),
            ..self.api().get_base_config()
        }
    }

    fn session(&self) -> Option<&SessionManager> {
        self.api().session()
    }
}

/// Configures an [`AdminApiClient`].
#[derive(Debug)]
pub struct AdminApiClientBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    session_data: Option<SessionData>,
    default_headers: Vec<(String, String)>,
    fetch_options: FetchOptions,
    hooks: ClientHooks,
    transport: Option<Arc<dyn Transport>>,
    catalog: Option<OperationCatalog>,
}

impl AdminApiClientBuilder {
    /// Grant used whenever the session expires and no refresh token is stored.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Session to resume, e.g. one persisted from `on_auth_change`.
    #[must_use]
    pub fn session_data(mut self, data: SessionData) -> Self {
        self.session_data = Some(data);
        self
    }

    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: ClientHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the built-in catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: OperationCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<AdminApiClient, ClientError> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => OperationCatalog::from_entries(ADMIN_OPERATIONS)?,
        };

        let session_data = self.session_data.unwrap_or_default();
        let authorization = Some(session_data.access_token.as_str())
            .filter(|token| !token.is_empty())
            .map(authorization_header);

        let mut initial: Vec<(String, Option<String>)> = vec![
            ("Authorization".to_owned(), authorization),
            ("Accept".to_owned(), Some("application/json".to_owned())),
        ];
        initial.extend(
            self.default_headers
                .into_iter()
                .map(|(name, value)| (name, Some(value))),
        );

        let hooks = self.hooks.clone();
        let default_headers = DefaultHeaders::new(initial, move |name, value| {
            hooks.default_header_changed(name, value);
        });

        let session = SessionManager::new(
            session_data,
            self.credentials,
            default_headers.clone(),
            self.hooks.clone(),
        );

        let engine = ApiClient::from_parts(EngineParts {
            base_url: self.base_url,
            access_token: None,
            default_headers,
            hooks: self.hooks,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            fetch_options: self.fetch_options,
            context_header: None,
            session: Some(session),
        })?;

        Ok(AdminApiClient {
            invoker: Invoker::new(engine, catalog),
        })
    }
}
