//! weaviate-mcp - Serve a Weaviate instance to MCP clients over stdio.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rmcp::{transport::stdio, ServiceExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wv_client::ClientManager;
use wv_core::{ConfigOverrides, Secret, WeaviateConfig};
use wv_mcp::WeaviateMcpServer;

/// Weaviate MCP server
#[derive(Parser)]
#[command(name = "weaviate-mcp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/weaviate-mcp/config.toml, then ./weaviate-mcp.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that override the settings file and environment.
#[derive(Args)]
struct SettingsArgs {
    /// Connection type: local or cloud
    #[arg(long, global = true)]
    connection_type: Option<String>,

    /// Local Weaviate host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Local Weaviate HTTP port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Local Weaviate gRPC port
    #[arg(long, global = true)]
    grpc_port: Option<u16>,

    /// Weaviate Cloud cluster URL
    #[arg(long, global = true)]
    cluster_url: Option<String>,

    /// Weaviate Cloud API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Connect timeout in seconds (0 disables)
    #[arg(long, global = true)]
    timeout_init: Option<u64>,

    /// Query timeout in seconds (0 disables)
    #[arg(long, global = true)]
    timeout_query: Option<u64>,

    /// Insert timeout in seconds
    #[arg(long, global = true)]
    timeout_insert: Option<u64>,

    /// Seconds to wait for Weaviate to become ready at startup
    #[arg(long, global = true)]
    startup_period: Option<u64>,

    /// Cohere API key forwarded to Weaviate
    #[arg(long, global = true)]
    cohere_api_key: Option<String>,

    /// OpenAI API key forwarded to Weaviate
    #[arg(long, global = true)]
    openai_api_key: Option<String>,

    /// Extra request header (repeatable)
    #[arg(long = "header", value_name = "KEY=VALUE", value_parser = parse_header, global = true)]
    headers: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout (default)
    Serve,

    /// Print the resolved configuration with secrets masked
    Config,

    /// Check that Weaviate is reachable and ready
    Check,
}

impl SettingsArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            connection_type: self.connection_type,
            host: self.host,
            port: self.port,
            grpc_port: self.grpc_port,
            cluster_url: self.cluster_url,
            api_key: self.api_key.map(Secret::from),
            timeout_init: self.timeout_init,
            timeout_query: self.timeout_query,
            timeout_insert: self.timeout_insert,
            startup_period: self.startup_period,
            cohere_api_key: self.cohere_api_key.map(Secret::from),
            openai_api_key: self.openai_api_key.map(Secret::from),
            additional_headers: self
                .headers
                .into_iter()
                .map(|(k, v)| (k, Secret::from(v)))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid header '{}': expected KEY=VALUE", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid header '{}': empty name", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    // stdout carries the MCP stream
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match WeaviateConfig::load(cli.config.as_deref(), cli.settings.into_overrides())
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
        Commands::Check => check(config).await,
    }

    Ok(())
}

async fn serve(config: WeaviateConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Starting Weaviate MCP server ({} connection)",
        config.connection_type()
    );

    let manager = Arc::new(ClientManager::new(config));
    manager.wait_until_ready().await;

    let server = WeaviateMcpServer::with_manager(Arc::clone(&manager));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    manager.close().await;
    info!("Weaviate MCP server stopped");
    Ok(())
}

async fn check(config: WeaviateConfig) {
    let target = match config.cluster_url() {
        Some(url) => url.to_string(),
        None => format!(
            "{}:{}",
            config.host().unwrap_or_default(),
            config.port().unwrap_or_default()
        ),
    };

    let manager = ClientManager::new(config);
    let ready = manager.is_ready().await;
    manager.close().await;

    if ready {
        println!("Weaviate at {} is ready", target);
    } else {
        eprintln!("Weaviate at {} is not ready", target);
        std::process::exit(1);
    }
}
