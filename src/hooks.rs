use std::fmt;
use std::sync::Arc;

use crate::session::SessionData;
use crate::transport::{TransportError, TransportRequest, TransportResponse};

/// What went wrong with an exchange, as passed to `on_response_error`.
#[derive(Clone, Copy, Debug)]
pub enum ResponseFailure<'a> {
    /// The server answered with a status outside `200..300`.
    Response(&'a TransportResponse),
    /// No status was received.
    Transport(&'a TransportError),
}

type Callback<T> = Option<Arc<T>>;

/// Lifecycle callbacks, one typed slot per event.
///
/// Hooks observe requests; they cannot change their outcome.
#[derive(Clone, Default)]
pub struct ClientHooks {
    on_request: Callback<dyn Fn(&TransportRequest) + Send + Sync>,
    on_success_response: Callback<dyn Fn(&TransportResponse) + Send + Sync>,
    on_response_error: Callback<dyn Fn(ResponseFailure<'_>) + Send + Sync>,
    on_context_changed: Callback<dyn Fn(&str) + Send + Sync>,
    on_default_header_changed: Callback<dyn Fn(&str, Option<&str>) + Send + Sync>,
    on_auth_change: Callback<dyn Fn(&SessionData) + Send + Sync>,
}

impl ClientHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires right before a request is handed to the transport.
    #[must_use]
    pub fn on_request(mut self, hook: impl Fn(&TransportRequest) + Send + Sync + 'static) -> Self {
        self.on_request = Some(Arc::new(hook));
        self
    }

    /// Fires for every response with a `2xx` status.
    #[must_use]
    pub fn on_success_response(
        mut self,
        hook: impl Fn(&TransportResponse) + Send + Sync + 'static,
    ) -> Self {
        self.on_success_response = Some(Arc::new(hook));
        self
    }

    /// Fires for failed statuses and transport failures, before the error is returned.
    #[must_use]
    pub fn on_response_error(
        mut self,
        hook: impl Fn(ResponseFailure<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_response_error = Some(Arc::new(hook));
        self
    }

    /// Fires with the new storefront context token whenever it changes.
    #[must_use]
    pub fn on_context_changed(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_context_changed = Some(Arc::new(hook));
        self
    }

    /// Fires on every default header write or removal.
    #[must_use]
    pub fn on_default_header_changed(
        mut self,
        hook: impl Fn(&str, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_default_header_changed = Some(Arc::new(hook));
        self
    }

    /// Fires with a copy of the admin session after tokens were issued or rotated.
    #[must_use]
    pub fn on_auth_change(mut self, hook: impl Fn(&SessionData) + Send + Sync + 'static) -> Self {
        self.on_auth_change = Some(Arc::new(hook));
        self
    }

    pub(crate) fn request(&self, request: &TransportRequest) {
        if let Some(hook) = &self.on_request {
            hook(request);
        }
    }

    pub(crate) fn success_response(&self, response: &TransportResponse) {
        if let Some(hook) = &self.on_success_response {
            hook(response);
        }
    }

    pub(crate) fn response_error(&self, failure: ResponseFailure<'_>) {
        if let Some(hook) = &self.on_response_error {
            hook(failure);
        }
    }

    pub(crate) fn context_changed(&self, token: &str) {
        if let Some(hook) = &self.on_context_changed {
            hook(token);
        }
    }

    pub(crate) fn default_header_changed(&self, name: &str, value: Option<&str>) {
        if let Some(hook) = &self.on_default_header_changed {
            hook(name, value);
        }
    }

    pub(crate) fn auth_change(&self, session: &SessionData) {
        if let Some(hook) = &self.on_auth_change {
            hook(session);
        }
    }
}

impl fmt::Debug for ClientHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHooks")
            .field("on_request", &self.on_request.is_some())
            .field("on_success_response", &self.on_success_response.is_some())
            .field("on_response_error", &self.on_response_error.is_some())
            .field("on_context_changed", &self.on_context_changed.is_some())
            .field(
                "on_default_header_changed",
                &self.on_default_header_changed.is_some(),
            )
            .field("on_auth_change", &self.on_auth_change.is_some())
            .finish()
    }
}
