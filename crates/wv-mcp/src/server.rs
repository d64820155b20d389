//! MCP tool definitions for Weaviate operations.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wv_client::ClientManager;
use wv_core::{
    ConnectionType, PropertyInfo, SearchHit, SearchMode, SearchQuery, WeaviateConfig,
};

/// Alpha used by the general-purpose `search` tool: mostly keyword, some vector.
const SEARCH_ALPHA: f32 = 0.3;

/// Weaviate MCP server. Clones share one [`ClientManager`].
#[derive(Clone)]
pub struct WeaviateMcpServer {
    manager: Arc<ClientManager>,
    tool_router: ToolRouter<Self>,
}

impl WeaviateMcpServer {
    /// Create a server that connects lazily using `config`.
    pub fn new(config: WeaviateConfig) -> Self {
        Self::with_manager(Arc::new(ClientManager::new(config)))
    }

    /// Create a server around an existing manager.
    pub fn with_manager(manager: Arc<ClientManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
        }
    }

    pub fn manager(&self) -> &Arc<ClientManager> {
        &self.manager
    }

    /// Names of all registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect()
    }

    /// Release the client handle.
    pub async fn shutdown(&self) {
        self.manager.close().await;
    }

    async fn probe(&self) -> wv_core::Result<bool> {
        self.manager.get_client().await?.is_ready().await
    }

    async fn run_search(&self, req: SearchRequest, mode: SearchMode) -> SearchResponse {
        info!(
            "Searching {} for {:?} ({:?}, limit {})",
            req.collection_name, req.query, mode, req.limit
        );

        let query = SearchQuery {
            text: req.query.clone(),
            mode,
            limit: req.limit,
        };
        let alpha = match mode {
            SearchMode::Hybrid { alpha } => Some(alpha),
            _ => None,
        };

        let hits = async {
            let collection = match &req.tenant_id {
                Some(tenant) => {
                    self.manager
                        .get_collection_with_tenant(&req.collection_name, tenant)
                        .await?
                }
                None => self.manager.get_collection(&req.collection_name).await?,
            };
            collection.search(&query).await
        }
        .await;

        let (results, error) = match hits {
            Ok(hits) => (hits, None),
            Err(e) => {
                warn!("Search on {} failed: {}", req.collection_name, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        SearchResponse {
            total: results.len(),
            results,
            query: req.query,
            collection_name: req.collection_name,
            tenant_id: req.tenant_id,
            alpha,
            error,
        }
    }
}

// === Tool request types ===

/// Request for the schema of one or all collections.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GetSchemaRequest {
    /// Collection to describe (all collections when omitted)
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// Request for a vector or keyword search.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Search query text
    pub query: String,
    /// Collection to search
    pub collection_name: String,
    /// Maximum results to return (default: 5)
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    /// Tenant to search in a multi-tenant collection
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Request for a hybrid search.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HybridSearchRequest {
    /// Search query text
    pub query: String,
    /// Collection to search
    pub collection_name: String,
    /// Maximum results to return (default: 5)
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    /// Balance between keyword (0.0) and vector (1.0) search (default: 0.5)
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Tenant to search in a multi-tenant collection
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Request for a page of stored objects.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CollectionObjectsRequest {
    /// Collection to read
    pub collection_name: String,
    /// Maximum objects to return (default: 10)
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    /// Number of objects to skip (default: 0)
    #[serde(default)]
    pub offset: u32,
    /// Tenant to read from in a multi-tenant collection
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Request naming a single collection.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CollectionRequest {
    /// Collection name
    pub collection_name: String,
}

/// Request for a greeting.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GreetRequest {
    /// Who to greet
    pub name: String,
}

fn default_search_limit() -> u32 {
    5
}

fn default_page_limit() -> u32 {
    10
}

fn default_alpha() -> f32 {
    0.5
}

// === Tool response types ===

#[derive(Debug, Serialize)]
struct ConnectionStatus {
    connected: bool,
    connection_type: ConnectionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grpc_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CollectionList {
    collections: Vec<String>,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CollectionSchema {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    properties: Vec<PropertyInfo>,
    multi_tenancy_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
    total: usize,
    query: String,
    collection_name: String,
    tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alpha: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoredObject {
    id: String,
    properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ObjectsResponse {
    results: Vec<StoredObject>,
    total: usize,
    collection_name: String,
    limit: u32,
    offset: u32,
    tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct TenantReport {
    collection_name: String,
    multi_tenancy_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"Serialization failed: {e}\"}}"))
}

fn error_json(error: impl std::fmt::Display) -> String {
    to_json(&serde_json::json!({ "error": error.to_string() }))
}

#[tool_router]
impl WeaviateMcpServer {
    /// Current configuration with every secret masked.
    #[tool(description = "Get the current Weaviate configuration with secrets masked")]
    async fn get_config(&self) -> String {
        to_json(&self.manager.config().redacted())
    }

    /// Probe the Weaviate instance.
    #[tool(description = "Check whether the Weaviate instance is reachable and ready")]
    async fn check_connection(&self) -> String {
        let config = self.manager.config();

        let (connected, error) = match self.probe().await {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("Weaviate is not ready".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        to_json(&ConnectionStatus {
            connected,
            connection_type: config.connection_type(),
            host: config.host().map(str::to_string),
            port: config.port(),
            grpc_port: config.grpc_port(),
            cluster_url: config.cluster_url().map(str::to_string),
            error,
        })
    }

    /// List all collections.
    #[tool(description = "List all collections in the Weaviate instance")]
    async fn list_collections(&self) -> String {
        let response = match self.manager.list_collections().await {
            Ok(collections) => CollectionList {
                total: collections.len(),
                collections,
                error: None,
            },
            Err(e) => CollectionList {
                collections: Vec::new(),
                total: 0,
                error: Some(e.to_string()),
            },
        };
        to_json(&response)
    }

    /// Schema of one collection, or of all collections.
    #[tool(
        description = "Get the schema of a collection, or of every collection when no name is given"
    )]
    async fn get_schema(&self, Parameters(req): Parameters<GetSchemaRequest>) -> String {
        let Some(name) = req.collection_name else {
            return to_json(&self.manager.get_schema().await);
        };

        let config = async { self.manager.get_collection(&name).await?.config().await }.await;
        let response = match config {
            Ok(config) => CollectionSchema {
                multi_tenancy_enabled: config.multi_tenancy_enabled(),
                name: config.name,
                description: config.description,
                properties: config.properties,
                error: None,
            },
            Err(e) => CollectionSchema {
                name,
                description: None,
                properties: Vec::new(),
                multi_tenancy_enabled: false,
                error: Some(e.to_string()),
            },
        };
        to_json(&response)
    }

    /// Vector similarity search.
    #[tool(description = "Semantic (vector) search of a collection using the query text")]
    async fn search_vector(&self, Parameters(req): Parameters<SearchRequest>) -> String {
        to_json(&self.run_search(req, SearchMode::NearText).await)
    }

    /// BM25 keyword search.
    #[tool(description = "Keyword (BM25) search of a collection")]
    async fn keyword_search(&self, Parameters(req): Parameters<SearchRequest>) -> String {
        to_json(&self.run_search(req, SearchMode::Bm25).await)
    }

    /// Hybrid keyword/vector search.
    #[tool(
        description = "Hybrid search blending keyword and vector ranking; alpha 0 is pure keyword, 1 is pure vector"
    )]
    async fn hybrid_search(&self, Parameters(req): Parameters<HybridSearchRequest>) -> String {
        if !(0.0..=1.0).contains(&req.alpha) {
            return error_json(format!("Alpha must be between 0 and 1, got {}", req.alpha));
        }

        let alpha = req.alpha;
        let req = SearchRequest {
            query: req.query,
            collection_name: req.collection_name,
            limit: req.limit,
            tenant_id: req.tenant_id,
        };
        to_json(&self.run_search(req, SearchMode::Hybrid { alpha }).await)
    }

    /// General-purpose search.
    #[tool(description = "Search a collection with a keyword-leaning hybrid query (alpha 0.3)")]
    async fn search(&self, Parameters(req): Parameters<SearchRequest>) -> String {
        to_json(
            &self
                .run_search(req, SearchMode::Hybrid { alpha: SEARCH_ALPHA })
                .await,
        )
    }

    /// Page through stored objects.
    #[tool(description = "Fetch objects from a collection with limit/offset paging")]
    async fn get_collection_objects(
        &self,
        Parameters(req): Parameters<CollectionObjectsRequest>,
    ) -> String {
        let page = async {
            let collection = match &req.tenant_id {
                Some(tenant) => {
                    self.manager
                        .get_collection_with_tenant(&req.collection_name, tenant)
                        .await?
                }
                None => self.manager.get_collection(&req.collection_name).await?,
            };
            collection.fetch_objects(req.limit, req.offset).await
        }
        .await;

        let (results, error) = match page {
            Ok(page) => (
                page.objects
                    .into_iter()
                    .map(|o| StoredObject {
                        id: o.id,
                        properties: o.properties,
                    })
                    .collect::<Vec<_>>(),
                None,
            ),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        to_json(&ObjectsResponse {
            total: results.len(),
            results,
            collection_name: req.collection_name,
            limit: req.limit,
            offset: req.offset,
            tenant_id: req.tenant_id,
            error,
        })
    }

    /// Whether a collection is multi-tenant.
    #[tool(description = "Check whether a collection has multi-tenancy enabled")]
    async fn is_multi_tenancy_enabled(
        &self,
        Parameters(req): Parameters<CollectionRequest>,
    ) -> String {
        let (enabled, error) = match self
            .manager
            .try_multi_tenancy_enabled(&req.collection_name)
            .await
        {
            Ok(enabled) => (enabled, None),
            Err(e) => (false, Some(e.to_string())),
        };

        to_json(&TenantReport {
            collection_name: req.collection_name,
            multi_tenancy_enabled: enabled,
            tenants: None,
            tenant_count: None,
            error,
        })
    }

    /// Tenants of a multi-tenant collection.
    #[tool(description = "List the tenants of a multi-tenant collection")]
    async fn get_tenant_list(&self, Parameters(req): Parameters<CollectionRequest>) -> String {
        let report = match self.manager.try_tenant_status(&req.collection_name).await {
            Ok((enabled, tenants)) => TenantReport {
                collection_name: req.collection_name.clone(),
                multi_tenancy_enabled: enabled,
                tenant_count: Some(tenants.len()),
                tenants: Some(tenants),
                error: None,
            },
            Err(e) => TenantReport {
                collection_name: req.collection_name.clone(),
                multi_tenancy_enabled: false,
                tenants: Some(Vec::new()),
                tenant_count: Some(0),
                error: Some(e.to_string()),
            },
        };
        to_json(&report)
    }

    /// Greet someone by name.
    #[tool(description = "Greet someone by name")]
    async fn greet(&self, Parameters(req): Parameters<GreetRequest>) -> String {
        format!("Hello, {}! Welcome to the Weaviate MCP Server.", req.name)
    }
}

#[tool_handler]
impl ServerHandler for WeaviateMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Weaviate MCP server. Inspect the connection and schema, list collections, \
                 run vector, keyword or hybrid searches, browse objects, and inspect tenants."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
