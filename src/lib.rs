//! Typed REST clients for the storefront and administration commerce APIs.
//!
//! Public API layers:
//! - [`ApiClient`]: request engine shared by both variants (method + path).
//! - [`StoreApiClient`]/[`AdminApiClient`]: operation-id clients backed by an
//!   [`OperationCatalog`].
//! - [`SessionContext`]: cached storefront context with setters.
//! - [`ClientError`]: unified error type used by all clients.
//!
//! Operations are addressed by ids of the form `<name> <method> <path>`, for
//! example `readContext get /context`.

mod admin_client;
mod catalog;
mod client;
mod context;
mod error;
mod headers;
mod hooks;
mod invoke;
mod path;
mod session;
mod store_client;
mod transport;

/// Administration client with OAuth session handling.
pub use admin_client::{ADMIN_OPERATIONS, AdminApiClient, AdminApiClientBuilder};
/// Operation table and static operation descriptions.
pub use catalog::{Operation, OperationCatalog, OperationDefinition};
/// Request engine and per-request parameters.
pub use client::{
    ApiClient, ApiResponse, BaseConfig, BaseConfigUpdate, FetchOptions, RequestOptions,
    RequestParams,
};
pub use context::{
    ContextDetails, Country, Currency, Language, PaymentMethod, ReadContext, SalesChannel,
    SalesChannelContext, SessionContext, ShippingLocation, UpdateContext,
};
/// Error type returned by all client operations.
pub use error::{ApiClientError, ApiError, ClientError, ErrorSource};
pub use headers::DefaultHeaders;
pub use hooks::{ClientHooks, ResponseFailure};
pub use session::{Credentials, SessionData, TOKEN_PATH};
/// Storefront client with context-token tracking.
pub use store_client::{
    ACCESS_KEY_HEADER, CONTEXT_TOKEN_HEADER, STORE_OPERATIONS, StoreApiClient,
    StoreApiClientBuilder,
};
pub use transport::{
    MultipartForm, MultipartPart, RequestBody, ReqwestTransport, Transport, TransportError,
    TransportRequest, TransportResponse,
};
