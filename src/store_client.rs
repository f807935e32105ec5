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
use crate::transport::{ReqwestTransport, Transport};
use crate::ClientError;

/// Header carrying the static storefront access key.
pub const ACCESS_KEY_HEADER: &str = "sw-access-key";
/// Header carrying the rotating storefront context token.
pub const CONTEXT_TOKEN_HEADER: &str = "sw-context-token";

/// Storefront operations called by the bundled frontend, as `(id, requires_params)`.
pub const STORE_OPERATIONS: &[(&str, bool)] = &[
    ("readContext get /context", false),
    ("updateContext patch /context", true),
    ("loginCustomer post /account/login", true),
    ("readCustomer post /account/customer", false),
    ("readOrder post /order", false),
    ("cancelOrder post /order/state/cancel", true),
    ("orderSetPayment post /order/payment", true),
    ("handlePaymentMethod post /handle-payment", true),
    ("readPaymentMethod post /payment-method", false),
    ("searchPage post /search", true),
    ("readProductListing post /product-listing/{categoryId}", true),
    ("orderDownloadFile get /order/download/{orderId}/{downloadId}", true),
    ("download post /document/download/{documentId}/{deepLinkCode}", true),
];

/// Storefront API client.
///
/// Authenticates with a static access key and tracks the context token the
/// server rotates through response headers.
#[derive(Clone, Debug)]
pub struct StoreApiClient {
    invoker: Invoker,
}

impl StoreApiClient {
    /// Creates a client with the built-in storefront catalog and no access key.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> StoreApiClientBuilder {
        StoreApiClientBuilder {
            base_url: base_url.into(),
            access_token: None,
            context_token: None,
            default_headers: Vec::new(),
            fetch_options: FetchOptions::default(),
            hooks: ClientHooks::default(),
            transport: None,
            catalog: None,
        }
    }

    /// Calls an operation by id, e.g. `readContext get /context`.
    ///
    /// `params` may be `None` only for operations that take no parameters.
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

    /// Adds an operation to this client's catalog.
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

    /// Headers sent with every request unless overridden per call.
    pub fn default_headers(&self) -> &DefaultHeaders {
        self.api().default_headers()
    }

    pub fn context_token(&self) -> Option<String> {
        self.default_headers().get(CONTEXT_TOKEN_HEADER)
    }

    /// Applies the present fields; a new access token also replaces `sw-access-key`.
    pub fn update_base_config(&self, update: BaseConfigUpdate) -> Result<(), ClientError> {
        let access_token = update.access_token.clone();
        self.api().update_base_config(update)?;
        if let Some(token) = access_token {
            self.default_headers().set(ACCESS_KEY_HEADER, token);
        }
        Ok(())
    }

    pub fn get_base_config(&self) -> BaseConfig {
        self.api().get_base_config()
    }
}

/// Configures a [`StoreApiClient`].
#[derive(Debug)]
pub struct StoreApiClientBuilder {
    base_url: String,
    access_token: Option<String>,
    context_token: Option<String>,
    default_headers: Vec<(String, String)>,
    fetch_options: FetchOptions,
    hooks: ClientHooks,
    transport: Option<Arc<dyn Transport>>,
    catalog: Option<OperationCatalog>,
}

impl StoreApiClientBuilder {
    /// Sales channel access key, sent as `sw-access-key`.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Context token to resume, sent as `sw-context-token`.
    #[must_use]
    pub fn context_token(mut self, token: impl Into<String>) -> Self {
        self.context_token = Some(token.into());
        self
    }

    /// Extra default header. Wins over the access key and context token headers.
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

    pub fn build(self) -> Result<StoreApiClient, ClientError> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => OperationCatalog::from_entries(STORE_OPERATIONS)?,
        };

        let mut initial: Vec<(String, Option<String>)> = vec![
            (ACCESS_KEY_HEADER.to_owned(), self.access_token.clone()),
            ("accept".to_owned(), Some("application/json".to_owned())),
            (CONTEXT_TOKEN_HEADER.to_owned(), self.context_token),
        ];
        initial.extend(
            self.default_headers
                .into_iter()
                .map(|(name, value)| (name, Some(value))),
        );

        let hooks = self.hooks.clone();
        let default_headers = DefaultHeaders::new(initial, move |name, value| {
            hooks.default_header_changed(name, value);
            if let Some(token) = value.filter(|token| !token.is_empty())
                && name.eq_ignore_ascii_case(CONTEXT_TOKEN_HEADER)
            {
                hooks.context_changed(token);
            }
        });

        let engine = ApiClient::from_parts(EngineParts {
            base_url: self.base_url,
            access_token: self.access_token,
            default_headers,
            hooks: self.hooks,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            fetch_options: self.fetch_options,
            context_header: Some(CONTEXT_TOKEN_HEADER),
            session: None,
        })?;

        Ok(StoreApiClient {
            invoker: Invoker::new(engine, catalog),
        })
    }
}
