//! Storefront session context: the sales channel state bound to a context token.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::error;

use crate::catalog::Operation;
use crate::client::RequestParams;
use crate::store_client::StoreApiClient;
use crate::ClientError;

/// Context returned by `readContext get /context`.
///
/// Only the fields this crate reads are typed; everything else is kept in `extra`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesChannelContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_location: Option<ShippingLocation>,
    /// Sales channel the context belongs to, sent as `channel`.
    #[serde(default, alias = "salesChannel", skip_serializing_if = "Option::is_none")]
    pub channel: Option<SalesChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDetails {
    #[serde(default)]
    pub language_id_chain: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `readContext get /context`
#[derive(Debug)]
pub struct ReadContext;

impl Operation for ReadContext {
    const ID: &'static str = "readContext get /context";
    type Response = SalesChannelContext;
}

/// `updateContext patch /context`
#[derive(Debug)]
pub struct UpdateContext;

impl Operation for UpdateContext {
    const ID: &'static str = "updateContext patch /context";
    type Response = Value;
}

/// Cached storefront context with helpers that patch it.
///
/// Every setter sends `updateContext` and then re-reads the context.
#[derive(Clone, Debug)]
pub struct SessionContext {
    client: StoreApiClient,
    current: Arc<RwLock<Option<SalesChannelContext>>>,
}

impl SessionContext {
    pub fn new(client: StoreApiClient) -> Self {
        Self {
            client,
            current: Arc::default(),
        }
    }

    /// Starts from an already known context instead of an empty one.
    pub fn with_context(client: StoreApiClient, context: SalesChannelContext) -> Self {
        let session = Self::new(client);
        session.set_context(context);
        session
    }

    /// Fetches the context. Failures are logged and leave the cached value untouched.
    pub async fn refresh(&self) {
        match self.client.call::<ReadContext>(None).await {
            Ok(response) => *self.current.write() = Some(response.data),
            Err(err) => error!(error = %err, "failed to refresh session context"),
        }
    }

    pub fn set_context(&self, context: SalesChannelContext) {
        *self.current.write() = Some(context);
    }

    pub async fn set_country(&self, country_id: &str) -> Result<(), ClientError> {
        self.update(json!({ "countryId": country_id })).await
    }

    /// Switches currency. A currency without id is logged and ignored.
    pub async fn set_currency(&self, currency: &Currency) -> Result<(), ClientError> {
        let Some(id) = currency.id.as_deref() else {
            error!(?currency, "a currency id is required to set the currency");
            return Ok(());
        };
        self.update(json!({ "currencyId": id })).await
    }

    /// Switches language. A language without id is ignored.
    pub async fn set_language(&self, language: &Language) -> Result<(), ClientError> {
        let Some(id) = language.id.as_deref() else {
            return Ok(());
        };
        self.update(json!({ "languageId": id })).await
    }

    pub async fn set_payment_method(
        &self,
        payment_method: &PaymentMethod,
    ) -> Result<(), ClientError> {
        let id = payment_method
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::InvalidArgument(
                    "You need to provide payment method id in order to set payment method."
                        .to_owned(),
                )
            })?;
        self.update(json!({ "paymentMethodId": id })).await
    }

    pub fn context(&self) -> Option<SalesChannelContext> {
        self.current.read().clone()
    }

    pub fn currency(&self) -> Option<Currency> {
        self.read(|context| context.currency.clone())
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.read(|context| context.payment_method.clone())
    }

    pub fn country_id(&self) -> Option<String> {
        self.read(|context| {
            context
                .shipping_location
                .as_ref()?
                .country
                .as_ref()?
                .id
                .clone()
        })
    }

    pub fn channel_country_id(&self) -> Option<String> {
        self.read(|context| context.channel.as_ref()?.country_id.clone())
    }

    pub fn language_id(&self) -> Option<String> {
        self.read(|context| context.channel.as_ref()?.language_id.clone())
    }

    /// First entry of the language id chain, or an empty string.
    pub fn language_id_chain(&self) -> String {
        self.read(|context| context.context.as_ref()?.language_id_chain.first().cloned())
            .unwrap_or_default()
    }

    pub fn customer(&self) -> Option<Value> {
        self.read(|context| context.customer.clone().filter(|customer| !customer.is_null()))
    }

    async fn update(&self, body: Value) -> Result<(), ClientError> {
        self.client
            .call::<UpdateContext>(Some(RequestParams::new().body(body)))
            .await?;
        self.refresh().await;
        Ok(())
    }

    fn read<T>(&self, project: impl FnOnce(&SalesChannelContext) -> Option<T>) -> Option<T> {
        self.current.read().as_ref().and_then(project)
    }
}
