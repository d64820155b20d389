//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CollectionConfig, ObjectPage, SearchHit, SearchQuery, Tenant};

/// Operations the server needs from a Weaviate instance.
///
/// `tenant` scopes a call to one partition of a multi-tenant collection.
#[async_trait]
pub trait VectorClient: Send + Sync {
    /// Readiness probe. `Ok(false)` means reachable but not ready.
    async fn is_ready(&self) -> Result<bool>;

    // Schema operations
    async fn list_collections(&self) -> Result<Vec<String>>;
    async fn collection_config(&self, name: &str) -> Result<CollectionConfig>;
    async fn tenants(&self, collection: &str) -> Result<Vec<Tenant>>;

    // Query operations
    async fn search(
        &self,
        collection: &str,
        tenant: Option<&str>,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>>;

    async fn fetch_objects(
        &self,
        collection: &str,
        tenant: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<ObjectPage>;

    /// Release connection resources. Called once by the owning manager.
    async fn close(&self) -> Result<()>;
}
