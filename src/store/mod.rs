//! Remote object store boundary
//!
//! The store is a key/value blob service: HEAD gives an object's identity
//! snapshot, GET gives its body. The trait exists so the cache layer can be
//! exercised against a mock store in tests.

pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;

pub use client::HttpStoreClient;
pub use errors::StoreError;
pub use types::ObjectMeta;

/// Remote object store operations the cache layer depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only query: the object's current size, content-identity
    /// token, and modification time. No body transfer.
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError>;

    /// Download the full object body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
}
