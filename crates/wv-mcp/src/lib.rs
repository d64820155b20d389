//! wv-mcp - MCP server implementation
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! a Weaviate instance as tools for AI assistants.
//!
//! # Tools
//!
//! - `get_config` - Current configuration with secrets masked
//! - `check_connection` - Probe the instance
//! - `list_collections` - List all collections
//! - `get_schema` - Schema of one or all collections
//! - `search_vector` / `keyword_search` / `hybrid_search` / `search` - Query a collection
//! - `get_collection_objects` - Page through stored objects
//! - `is_multi_tenancy_enabled` / `get_tenant_list` - Tenant introspection
//! - `greet` - Say hello

mod server;

pub use server::{
    CollectionObjectsRequest, CollectionRequest, GetSchemaRequest, GreetRequest,
    HybridSearchRequest, SearchRequest, WeaviateMcpServer,
};
