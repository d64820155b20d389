//! Lazily-connected client handle shared by the MCP tools.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use wv_core::{
    CollectionConfig, CollectionSummary, ObjectPage, Result, SchemaReport, SearchHit, SearchQuery,
    Tenant, VectorClient, WeaviateConfig,
};

use crate::http::WeaviateClient;

/// Builds a client handle from configuration.
pub type Connector =
    Box<dyn Fn(&WeaviateConfig) -> Result<Arc<dyn VectorClient>> + Send + Sync>;

/// Owns at most one live client handle.
///
/// The handle is created on first use and reused until [`close`](Self::close).
/// First use is serialized, so concurrent callers share a single construction.
pub struct ClientManager {
    config: WeaviateConfig,

    /// `None` until connected, and again after close.
    client: Mutex<Option<Arc<dyn VectorClient>>>,

    connector: Connector,
}

impl ClientManager {
    /// Create a manager that connects with [`WeaviateClient`].
    pub fn new(config: WeaviateConfig) -> Self {
        Self::with_connector(
            config,
            Box::new(|config: &WeaviateConfig| {
                Ok(Arc::new(WeaviateClient::connect(config)?) as Arc<dyn VectorClient>)
            }),
        )
    }

    /// Create a manager with a custom client constructor.
    pub fn with_connector(config: WeaviateConfig, connector: Connector) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            connector,
        }
    }

    pub fn config(&self) -> &WeaviateConfig {
        &self.config
    }

    /// Get the client handle, connecting on first call.
    pub async fn get_client(&self) -> Result<Arc<dyn VectorClient>> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = (self.connector)(&self.config)?;
        info!(
            "Created {} Weaviate client",
            self.config.connection_type()
        );
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Whether a handle is currently held.
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Check if the Weaviate instance is ready. Errors are logged and reported as `false`.
    pub async fn is_ready(&self) -> bool {
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(e) => {
                error!("Error checking readiness: {}", e);
                return false;
            }
        };

        match client.is_ready().await {
            Ok(ready) => ready,
            Err(e) => {
                error!("Error checking readiness: {}", e);
                false
            }
        }
    }

    /// Poll readiness once a second for up to `startup_period` seconds.
    ///
    /// The bound is wall-clock time, so a probe stuck on a slow host is cut off.
    pub async fn wait_until_ready(&self) -> bool {
        let period = Duration::from_secs(self.config.startup_period.max(1));
        let poll = async {
            while !self.is_ready().await {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        };

        if tokio::time::timeout(period, poll).await.is_ok() {
            return true;
        }

        warn!(
            "Weaviate not ready after {} second(s)",
            self.config.startup_period
        );
        false
    }

    /// Names of all collections.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.get_client().await?.list_collections().await
    }

    /// Get collection object without tenant context.
    pub async fn get_collection(&self, name: &str) -> Result<Collection> {
        Ok(Collection {
            client: self.get_client().await?,
            name: name.to_string(),
            tenant: None,
        })
    }

    /// Get collection object with tenant context.
    pub async fn get_collection_with_tenant(&self, name: &str, tenant: &str) -> Result<Collection> {
        Ok(self.get_collection(name).await?.with_tenant(tenant))
    }

    /// Check if a collection has multi-tenancy enabled.
    pub async fn try_multi_tenancy_enabled(&self, name: &str) -> Result<bool> {
        let config = self.get_collection(name).await?.config().await?;
        Ok(config.multi_tenancy_enabled())
    }

    /// Like [`try_multi_tenancy_enabled`](Self::try_multi_tenancy_enabled), with errors as `false`.
    pub async fn is_multi_tenancy_enabled(&self, name: &str) -> bool {
        self.try_multi_tenancy_enabled(name)
            .await
            .unwrap_or_else(|e| {
                error!("Error checking multi-tenancy status for {}: {}", name, e);
                false
            })
    }

    /// Multi-tenancy flag and tenant names of a collection, from one schema read.
    ///
    /// The tenant list is empty when multi-tenancy is disabled.
    pub async fn try_tenant_status(&self, name: &str) -> Result<(bool, Vec<String>)> {
        let collection = self.get_collection(name).await?;
        if !collection.config().await?.multi_tenancy_enabled() {
            return Ok((false, Vec::new()));
        }

        let tenants = collection.tenants().await?;
        Ok((true, tenants.into_iter().map(|t| t.name).collect()))
    }

    /// Tenant names of a collection; empty when multi-tenancy is disabled.
    pub async fn try_tenant_list(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.try_tenant_status(name).await?.1)
    }

    /// Like [`try_tenant_list`](Self::try_tenant_list), with errors as an empty list.
    pub async fn get_tenant_list(&self, name: &str) -> Vec<String> {
        self.try_tenant_list(name).await.unwrap_or_else(|e| {
            error!("Error getting tenant list for {}: {}", name, e);
            Vec::new()
        })
    }

    /// Schema of every collection.
    ///
    /// A collection whose config cannot be read is still listed, with its error.
    pub async fn get_schema(&self) -> SchemaReport {
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(e) => {
                error!("Error getting schema: {}", e);
                return SchemaReport::failed(e.to_string());
            }
        };

        let names = match client.list_collections().await {
            Ok(names) => names,
            Err(e) => {
                error!("Error getting schema: {}", e);
                return SchemaReport::failed(e.to_string());
            }
        };

        let mut collections = Vec::with_capacity(names.len());
        for name in names {
            match client.collection_config(&name).await {
                Ok(config) => collections.push(CollectionSummary {
                    name,
                    properties: config.properties,
                    error: None,
                }),
                Err(e) => {
                    warn!("Error getting config for collection {}: {}", name, e);
                    collections.push(CollectionSummary {
                        name,
                        properties: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        SchemaReport {
            collections,
            error: None,
        }
    }

    /// Release the client handle. Safe to call when not connected.
    ///
    /// A later accessor call connects again.
    pub async fn close(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            if let Err(e) = client.close().await {
                warn!("Error closing Weaviate client: {}", e);
            }
            info!("Weaviate client closed");
        }
    }
}

/// A collection bound to a client handle and, optionally, a tenant.
#[derive(Clone)]
pub struct Collection {
    client: Arc<dyn VectorClient>,
    name: String,
    tenant: Option<String>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// The same collection scoped to `tenant`.
    pub fn with_tenant(&self, tenant: &str) -> Self {
        Self {
            client: self.client.clone(),
            name: self.name.clone(),
            tenant: Some(tenant.to_string()),
        }
    }

    pub async fn config(&self) -> Result<CollectionConfig> {
        self.client.collection_config(&self.name).await
    }

    pub async fn tenants(&self) -> Result<Vec<Tenant>> {
        self.client.tenants(&self.name).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        self.client
            .search(&self.name, self.tenant.as_deref(), query)
            .await
    }

    pub async fn near_text(&self, text: &str, limit: u32) -> Result<Vec<SearchHit>> {
        self.search(&SearchQuery::near_text(text, limit)).await
    }

    pub async fn bm25(&self, text: &str, limit: u32) -> Result<Vec<SearchHit>> {
        self.search(&SearchQuery::bm25(text, limit)).await
    }

    pub async fn hybrid(&self, text: &str, alpha: f32, limit: u32) -> Result<Vec<SearchHit>> {
        self.search(&SearchQuery::hybrid(text, alpha, limit)).await
    }

    pub async fn fetch_objects(&self, limit: u32, offset: u32) -> Result<ObjectPage> {
        self.client
            .fetch_objects(&self.name, self.tenant.as_deref(), limit, offset)
            .await
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("tenant", &self.tenant)
            .finish()
    }
}
