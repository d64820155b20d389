//! Configuration for the Weaviate MCP server.
//!
//! Settings are gathered as [`ConfigOverrides`] from several sources
//! (settings file, `.env`, process environment, CLI flags), merged by
//! precedence, then validated into an immutable [`WeaviateConfig`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WeaviateError};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GRPC_PORT: u16 = 50051;
pub const DEFAULT_TIMEOUT_INIT: u64 = 30;
pub const DEFAULT_TIMEOUT_QUERY: u64 = 60;
pub const DEFAULT_TIMEOUT_INSERT: u64 = 120;
pub const DEFAULT_STARTUP_PERIOD: u64 = 5;

/// Header carrying the Cohere key to Weaviate's text2vec-cohere module.
pub const COHERE_HEADER: &str = "X-Cohere-Api-Key";

/// Header carrying the OpenAI key to Weaviate's text2vec-openai module.
pub const OPENAI_HEADER: &str = "X-OpenAI-Api-Key";

/// Replacement shown wherever a secret would be displayed.
pub const MASK: &str = "***";

// Environment variable names
pub const ENV_CONNECTION_TYPE: &str = "WEAVIATE_CONNECTION_TYPE";
pub const ENV_HOST: &str = "WEAVIATE_HOST";
pub const ENV_PORT: &str = "WEAVIATE_PORT";
pub const ENV_GRPC_PORT: &str = "WEAVIATE_GRPC_PORT";
pub const ENV_CLUSTER_URL: &str = "WEAVIATE_CLUSTER_URL";
pub const ENV_API_KEY: &str = "WEAVIATE_API_KEY";
pub const ENV_TIMEOUT_INIT: &str = "WEAVIATE_TIMEOUT_INIT";
pub const ENV_TIMEOUT_QUERY: &str = "WEAVIATE_TIMEOUT_QUERY";
pub const ENV_TIMEOUT_INSERT: &str = "WEAVIATE_TIMEOUT_INSERT";
pub const ENV_STARTUP_PERIOD: &str = "WEAVIATE_STARTUP_PERIOD";
pub const ENV_COHERE_API_KEY: &str = "COHERE_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// A credential that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How the server reaches Weaviate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Local,
    Cloud,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl FromStr for ConnectionType {
    type Err = WeaviateError;

    /// Case sensitive: `LOCAL` is rejected.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(WeaviateError::config(format!(
                "connection_type must be 'local' or 'cloud', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters. Only the group matching the connection type exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// Self-hosted instance reached over HTTP and gRPC ports.
    Local {
        host: String,
        port: u16,
        grpc_port: u16,
    },

    /// Weaviate Cloud cluster.
    Cloud {
        cluster_url: String,
        api_key: Secret,
    },
}

impl Connection {
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            Self::Local { .. } => ConnectionType::Local,
            Self::Cloud { .. } => ConnectionType::Cloud,
        }
    }
}

/// Client timeouts in seconds. Zero disables a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub init: u64,
    pub query: u64,
    pub insert: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            init: DEFAULT_TIMEOUT_INIT,
            query: DEFAULT_TIMEOUT_QUERY,
            insert: DEFAULT_TIMEOUT_INSERT,
        }
    }
}

impl Timeouts {
    pub fn init_duration(&self) -> Option<Duration> {
        non_zero_secs(self.init)
    }

    pub fn query_duration(&self) -> Option<Duration> {
        non_zero_secs(self.query)
    }

    pub fn insert_duration(&self) -> Option<Duration> {
        non_zero_secs(self.insert)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Validated, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaviateConfig {
    /// Local or cloud connection parameters.
    pub connection: Connection,

    /// Client timeouts.
    pub timeouts: Timeouts,

    /// Seconds to wait for the instance to report ready at start-up.
    pub startup_period: u64,

    /// Extra headers sent with every request. Third-party keys are folded in here.
    pub additional_headers: BTreeMap<String, Secret>,

    /// Cohere key for vectorizer modules.
    pub cohere_api_key: Option<Secret>,

    /// OpenAI key for vectorizer modules.
    pub openai_api_key: Option<Secret>,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self::local(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_GRPC_PORT)
    }
}

impl WeaviateConfig {
    /// Configuration for a local instance with default timeouts.
    pub fn local(host: impl Into<String>, port: u16, grpc_port: u16) -> Self {
        Self::with_connection(Connection::Local {
            host: host.into(),
            port,
            grpc_port,
        })
    }

    /// Configuration for a Weaviate Cloud cluster with default timeouts.
    pub fn cloud(cluster_url: impl Into<String>, api_key: impl Into<Secret>) -> Self {
        Self::with_connection(Connection::Cloud {
            cluster_url: cluster_url.into(),
            api_key: api_key.into(),
        })
    }

    fn with_connection(connection: Connection) -> Self {
        Self {
            connection,
            timeouts: Timeouts::default(),
            startup_period: DEFAULT_STARTUP_PERIOD,
            additional_headers: BTreeMap::new(),
            cohere_api_key: None,
            openai_api_key: None,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_startup_period(mut self, secs: u64) -> Self {
        self.startup_period = secs;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Secret>) -> Self {
        self.additional_headers.insert(name.into(), value.into());
        self
    }

    /// Set the Cohere key and its request header.
    pub fn with_cohere_api_key(mut self, key: impl Into<Secret>) -> Self {
        let key = key.into();
        self.additional_headers
            .insert(COHERE_HEADER.to_string(), key.clone());
        self.cohere_api_key = Some(key);
        self
    }

    /// Set the OpenAI key and its request header.
    pub fn with_openai_api_key(mut self, key: impl Into<Secret>) -> Self {
        let key = key.into();
        self.additional_headers
            .insert(OPENAI_HEADER.to_string(), key.clone());
        self.openai_api_key = Some(key);
        self
    }

    /// Load from `.env` and the process environment only.
    pub fn from_env() -> Result<Self> {
        ConfigOverrides::from_env()?.resolve()
    }

    /// Resolve from every source: settings file, `.env`, environment, then `cli`.
    ///
    /// When `config_path` is `None` the default settings file locations are tried.
    pub fn load(config_path: Option<&Path>, cli: ConfigOverrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => ConfigOverrides::load(path)?,
            None => ConfigOverrides::load_default()?,
        };
        let env = ConfigOverrides::from_env()?;

        file.merge(env).merge(cli).resolve()
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection.connection_type()
    }

    pub fn host(&self) -> Option<&str> {
        match &self.connection {
            Connection::Local { host, .. } => Some(host),
            Connection::Cloud { .. } => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match &self.connection {
            Connection::Local { port, .. } => Some(*port),
            Connection::Cloud { .. } => None,
        }
    }

    pub fn grpc_port(&self) -> Option<u16> {
        match &self.connection {
            Connection::Local { grpc_port, .. } => Some(*grpc_port),
            Connection::Cloud { .. } => None,
        }
    }

    pub fn cluster_url(&self) -> Option<&str> {
        match &self.connection {
            Connection::Cloud { cluster_url, .. } => Some(cluster_url),
            Connection::Local { .. } => None,
        }
    }

    pub fn api_key(&self) -> Option<&Secret> {
        match &self.connection {
            Connection::Cloud { api_key, .. } => Some(api_key),
            Connection::Local { .. } => None,
        }
    }

    /// A display view with every secret replaced by [`MASK`].
    pub fn redacted(&self) -> RedactedConfig {
        let mask = |s: Option<&Secret>| s.map(|_| MASK.to_string());

        RedactedConfig {
            connection_type: self.connection_type(),
            host: self.host().map(str::to_string),
            port: self.port(),
            grpc_port: self.grpc_port(),
            cluster_url: self.cluster_url().map(str::to_string),
            api_key: mask(self.api_key()),
            timeout_init: self.timeouts.init,
            timeout_query: self.timeouts.query,
            timeout_insert: self.timeouts.insert,
            startup_period: self.startup_period,
            cohere_api_key: mask(self.cohere_api_key.as_ref()),
            openai_api_key: mask(self.openai_api_key.as_ref()),
            additional_headers: self
                .additional_headers
                .keys()
                .map(|k| (k.clone(), MASK.to_string()))
                .collect(),
        }
    }
}

/// Serializable view of a [`WeaviateConfig`] that is safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedConfig {
    pub connection_type: ConnectionType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grpc_port: Option<u16>,
    pub cluster_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_init: u64,
    pub timeout_query: u64,
    pub timeout_insert: u64,
    pub startup_period: u64,
    pub cohere_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub additional_headers: BTreeMap<String, String>,
}

/// Unvalidated settings from a single source. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub connection_type: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grpc_port: Option<u16>,
    pub cluster_url: Option<String>,
    pub api_key: Option<Secret>,
    pub timeout_init: Option<u64>,
    pub timeout_query: Option<u64>,
    pub timeout_insert: Option<u64>,
    pub startup_period: Option<u64>,
    pub cohere_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
    pub additional_headers: BTreeMap<String, Secret>,
}

impl ConfigOverrides {
    /// Load overrides from a TOML settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let overrides: Self = toml::from_str(&content).map_err(|e| {
            WeaviateError::config(format!(
                "Failed to parse config {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded settings from {:?}", path);
        Ok(overrides)
    }

    /// Load overrides from the default settings file locations, if any exist.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("weaviate-mcp").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("weaviate-mcp.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Read overrides from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Ok(Self {
            connection_type: get(ENV_CONNECTION_TYPE),
            host: get(ENV_HOST),
            port: parse_var(ENV_PORT, get(ENV_PORT))?,
            grpc_port: parse_var(ENV_GRPC_PORT, get(ENV_GRPC_PORT))?,
            cluster_url: get(ENV_CLUSTER_URL),
            api_key: get(ENV_API_KEY).map(Secret::from),
            timeout_init: parse_var(ENV_TIMEOUT_INIT, get(ENV_TIMEOUT_INIT))?,
            timeout_query: parse_var(ENV_TIMEOUT_QUERY, get(ENV_TIMEOUT_QUERY))?,
            timeout_insert: parse_var(ENV_TIMEOUT_INSERT, get(ENV_TIMEOUT_INSERT))?,
            startup_period: parse_var(ENV_STARTUP_PERIOD, get(ENV_STARTUP_PERIOD))?,
            cohere_api_key: get(ENV_COHERE_API_KEY).map(Secret::from),
            openai_api_key: get(ENV_OPENAI_API_KEY).map(Secret::from),
            additional_headers: BTreeMap::new(),
        })
    }

    /// Layer `higher` over `self`; every value set in `higher` wins.
    pub fn merge(self, higher: Self) -> Self {
        let mut additional_headers = self.additional_headers;
        additional_headers.extend(higher.additional_headers);

        Self {
            connection_type: higher.connection_type.or(self.connection_type),
            host: higher.host.or(self.host),
            port: higher.port.or(self.port),
            grpc_port: higher.grpc_port.or(self.grpc_port),
            cluster_url: higher.cluster_url.or(self.cluster_url),
            api_key: higher.api_key.or(self.api_key),
            timeout_init: higher.timeout_init.or(self.timeout_init),
            timeout_query: higher.timeout_query.or(self.timeout_query),
            timeout_insert: higher.timeout_insert.or(self.timeout_insert),
            startup_period: higher.startup_period.or(self.startup_period),
            cohere_api_key: higher.cohere_api_key.or(self.cohere_api_key),
            openai_api_key: higher.openai_api_key.or(self.openai_api_key),
            additional_headers,
        }
    }

    /// Validate and normalize into a [`WeaviateConfig`].
    ///
    /// Fills local defaults, requires cloud credentials, and drops the
    /// settings group the connection type does not use.
    pub fn resolve(self) -> Result<WeaviateConfig> {
        let connection_type = match self.connection_type.as_deref() {
            Some(value) => value.parse()?,
            None => ConnectionType::Local,
        };

        let connection = match connection_type {
            ConnectionType::Local => {
                if self.cluster_url.is_some() || self.api_key.is_some() {
                    debug!("Ignoring cloud settings for a local connection");
                }
                Connection::Local {
                    host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                    port: self.port.unwrap_or(DEFAULT_PORT),
                    grpc_port: self.grpc_port.unwrap_or(DEFAULT_GRPC_PORT),
                }
            }
            ConnectionType::Cloud => {
                let cluster_url = self.cluster_url.ok_or_else(|| {
                    WeaviateError::config("cluster_url is required for cloud connections")
                })?;
                let api_key = self.api_key.ok_or_else(|| {
                    WeaviateError::config("api_key is required for cloud connections")
                })?;
                if self.host.is_some() || self.port.is_some() || self.grpc_port.is_some() {
                    debug!("Ignoring local settings for a cloud connection");
                }
                Connection::Cloud {
                    cluster_url,
                    api_key,
                }
            }
        };

        let mut config = WeaviateConfig::with_connection(connection)
            .with_timeouts(Timeouts {
                init: self.timeout_init.unwrap_or(DEFAULT_TIMEOUT_INIT),
                query: self.timeout_query.unwrap_or(DEFAULT_TIMEOUT_QUERY),
                insert: self.timeout_insert.unwrap_or(DEFAULT_TIMEOUT_INSERT),
            })
            .with_startup_period(self.startup_period.unwrap_or(DEFAULT_STARTUP_PERIOD));

        config.additional_headers = self.additional_headers;
        if let Some(key) = self.cohere_api_key {
            config = config.with_cohere_api_key(key);
        }
        if let Some(key) = self.openai_api_key {
            config = config.with_openai_api_key(key);
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| WeaviateError::config(format!("{} must be an integer: {}", name, e)))
        })
        .transpose()
}
