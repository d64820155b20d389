//! Error types for the Weaviate MCP server.

use thiserror::Error;

/// Result type alias using WeaviateError.
pub type Result<T> = std::result::Result<T, WeaviateError>;

/// Errors that can occur while resolving configuration or talking to Weaviate.
#[derive(Error, Debug)]
pub enum WeaviateError {
    /// Configuration could not be resolved or failed validation.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A client cannot be built from the configuration it was given.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The server could not be reached.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A GraphQL query came back with errors.
    #[error("Query error: {message}")]
    Query { message: String },

    /// Collection not found.
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WeaviateError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error came from configuration rather than the server.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidConfiguration { .. })
    }

    /// Get the error code for MCP responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Query { .. } => "QUERY_ERROR",
            Self::CollectionNotFound { .. } => "COLLECTION_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
