use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ClientError;
use crate::catalog::{Operation, OperationCatalog, OperationDefinition};
use crate::client::{ApiClient, ApiResponse, RequestParams};

/// Operation-id dispatch shared by both client variants.
#[derive(Clone, Debug)]
pub(crate) struct Invoker {
    engine: ApiClient,
    catalog: Arc<RwLock<OperationCatalog>>,
}

impl Invoker {
    pub(crate) fn new(engine: ApiClient, catalog: OperationCatalog) -> Self {
        Self {
            engine,
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    pub(crate) fn engine(&self) -> &ApiClient {
        &self.engine
    }

    pub(crate) fn operations(&self) -> Vec<OperationDefinition> {
        self.catalog.read().iter().cloned().collect()
    }

    pub(crate) fn register(
        &self,
        operation_id: &str,
        requires_params: bool,
    ) -> Result<Arc<OperationDefinition>, ClientError> {
        self.catalog.write().register(operation_id, requires_params)
    }

    pub(crate) async fn invoke(
        &self,
        operation_id: &str,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let operation = self.catalog.read().get(operation_id)?;
        let params = match params {
            Some(params) => params,
            None if operation.requires_params => {
                return Err(ClientError::MissingParameters(operation.id()));
            }
            None => RequestParams::default(),
        };

        self.engine
            .request(operation.method.clone(), &operation.path_template, params)
            .await
    }

    pub(crate) async fn invoke_as<T: DeserializeOwned>(
        &self,
        operation_id: &str,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.invoke(operation_id, params).await?.decode()
    }

    pub(crate) async fn call<O: Operation>(
        &self,
        params: Option<RequestParams>,
    ) -> Result<ApiResponse<O::Response>, ClientError> {
        self.invoke_as(O::ID, params).await
    }
}
