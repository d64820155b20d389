//! wv-client - Weaviate client and connection manager
//!
//! This crate talks to Weaviate over its REST and GraphQL endpoints and
//! owns the lazily-created client handle the MCP tools share.
//!
//! # Example
//!
//! ```rust,ignore
//! use wv_client::ClientManager;
//! use wv_core::WeaviateConfig;
//!
//! let manager = ClientManager::new(WeaviateConfig::from_env()?);
//! if manager.is_ready().await {
//!     let schema = manager.get_schema().await;
//! }
//! manager.close().await;
//! ```

mod http;
mod manager;

pub use http::WeaviateClient;
pub use manager::{ClientManager, Collection, Connector};

// Re-export the client trait for convenience
pub use wv_core::VectorClient;
