pub mod memory_store;
pub mod subscription;

pub use memory_store::InMemoryOrderStore;
pub use subscription::{Subscription, SubscriptionEvent};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Address of one physically stored document in a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub collection: String,
    pub document_id: String,
}

impl DocumentHandle {
    pub fn new(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.document_id)
    }
}

/// Remote document store holding the order collection.
///
/// Implementations deliver subscription events to a single listener in
/// commit order and own any retry/reconnect policy.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Register a standing subscription on a collection
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    /// Resolve the documents whose `field` equals `value`
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<DocumentHandle>, StoreError>;

    /// Overwrite a single field of a document
    async fn update_field(
        &self,
        handle: &DocumentHandle,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentHandle),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl From<domain::DomainError> for StoreError {
    fn from(err: domain::DomainError) -> Self {
        match err {
            domain::DomainError::UnknownField(field) => StoreError::UnknownField(field),
            domain::DomainError::InvalidRecord(msg) => StoreError::MalformedPayload(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_handle_display() {
        let handle = DocumentHandle::new("pedidos", "a1b2");
        assert_eq!(handle.to_string(), "pedidos/a1b2");
    }

    #[test]
    fn test_domain_error_conversion() {
        let err: StoreError = domain::DomainError::UnknownField("direccion".to_string()).into();
        assert_eq!(err, StoreError::UnknownField("direccion".to_string()));
    }
}
