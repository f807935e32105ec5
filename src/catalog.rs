use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::ClientError;
use crate::path::placeholders;

/// Metadata for one API operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationDefinition {
    /// Human label, e.g. `readOrder`.
    pub name: String,
    pub method: Method,
    /// Path template, potentially containing `{param}` placeholders.
    pub path_template: String,
    /// Placeholder names extracted from `path_template`.
    pub path_params: Vec<String>,
    /// Whether a call must pass body, query, header or path parameters.
    pub requires_params: bool,
}

impl OperationDefinition {
    /// Parses an operation id of the form `<name> <method> <path>`.
    ///
    /// Operations with path placeholders always require parameters.
    pub fn parse(operation_id: &str, requires_params: bool) -> Result<Self, ClientError> {
        let invalid = |reason| ClientError::InvalidOperationId {
            id: operation_id.to_owned(),
            reason,
        };

        let mut tokens = operation_id.split(' ');
        let (Some(name), Some(method), Some(path), None) =
            (tokens.next(), tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(invalid("expected `<name> <method> <path>`"));
        };
        if name.is_empty() {
            return Err(invalid("operation name is empty"));
        }
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| invalid("unsupported HTTP method"))?;
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }

        let path_params = placeholders(path);
        Ok(Self {
            name: name.to_owned(),
            method,
            path_template: path.to_owned(),
            requires_params: requires_params || !path_params.is_empty(),
            path_params,
        })
    }

    /// Canonical identifier, e.g. `readOrder post /order`.
    pub fn id(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.method.as_str().to_ascii_lowercase(),
            self.path_template
        )
    }
}

/// Lookup table from operation id to [`OperationDefinition`].
///
/// Ids are parsed once when registered; dispatch is a map lookup.
#[derive(Clone, Debug, Default)]
pub struct OperationCatalog {
    operations: BTreeMap<String, Arc<OperationDefinition>>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from `(operation_id, requires_params)` entries.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a (&'a str, bool)>,
    ) -> Result<Self, ClientError> {
        let mut catalog = Self::new();
        for (operation_id, requires_params) in entries {
            catalog.register(operation_id, *requires_params)?;
        }
        Ok(catalog)
    }

    /// Parses and registers an operation, replacing any earlier one with the same id.
    pub fn register(
        &mut self,
        operation_id: &str,
        requires_params: bool,
    ) -> Result<Arc<OperationDefinition>, ClientError> {
        let definition = Arc::new(OperationDefinition::parse(operation_id, requires_params)?);
        self.operations
            .insert(definition.id(), Arc::clone(&definition));
        Ok(definition)
    }

    pub fn get(&self, operation_id: &str) -> Result<Arc<OperationDefinition>, ClientError> {
        self.operations
            .get(&canonical_id(operation_id))
            .cloned()
            .ok_or_else(|| ClientError::UnknownOperation(operation_id.to_owned()))
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.operations.contains_key(&canonical_id(operation_id))
    }

    /// All operations, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.values().map(|definition| &**definition)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Normalizes the method token so `readContext GET /context` finds `readContext get /context`.
fn canonical_id(operation_id: &str) -> String {
    let mut tokens = operation_id.splitn(3, ' ');
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(name), Some(method), Some(path)) => {
            format!("{name} {} {path}", method.to_ascii_lowercase())
        }
        _ => operation_id.to_owned(),
    }
}

/// A statically described operation.
///
/// Implementors name the operation id and the decoded response type, so calls
/// through `call::<O>()` are checked at compile time.
pub trait Operation {
    /// Operation id registered in the client's catalog.
    const ID: &'static str;
    /// Decoded type of the response payload.
    type Response: DeserializeOwned;
}
