//! wv-core - Core types and traits for the Weaviate MCP server
//!
//! This crate provides the configuration resolver, the shared error type,
//! the schema/search domain types, and the [`VectorClient`] trait that the
//! HTTP client implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, WeaviateError};
pub use traits::*;
pub use types::*;
