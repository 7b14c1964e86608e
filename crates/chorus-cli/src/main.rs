use std::path::PathBuf;
use std::sync::Arc;

use chorus_agent::{AgentRuntime, LlmClient, ModelConfig};
use chorus_mcp::{LlmBackend, McpConfig};
use chorus_memory::{FileVectorStore, InMemoryVectorStore, LocalEmbedding, VectorStoreGateway};
use chorus_orchestrator::{Evaluator, TaskSupervisor, WorkflowEngine};
use chorus_security::{AuditLog, Capability, PermissionSet, RateLimiter};
use chorus_skills::SkillRegistry;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chorus", about = "Chorus — multi-agent task orchestrator")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "chorus.toml", env = "CHORUS_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Serve {
        /// Host to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect the registered skill set.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List registered skills and the capabilities they require.
    List,
}

#[derive(Deserialize)]
struct ChorusConfig {
    model: ModelConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    security: SecurityConfig,
    #[serde(default)]
    vector_store: VectorStoreConfig,
    #[serde(default)]
    mcp: McpSettings,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Deserialize)]
struct SecurityConfig {
    #[serde(default = "default_rps")]
    max_requests_per_second: f64,
    #[serde(default = "default_burst")]
    max_burst: f64,
    #[serde(default)]
    api_keys: Vec<String>,
    #[serde(default = "default_audit_capacity")]
    audit_capacity: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_rps(),
            max_burst: default_burst(),
            api_keys: vec![],
            audit_capacity: default_audit_capacity(),
        }
    }
}

/// Where agent memory, task history, and knowledge-base embeddings live.
/// Absent `path` means an in-process, non-persistent store — the
/// "in-memory" sentinel.
#[derive(Deserialize, Default)]
struct VectorStoreConfig {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct McpSettings {
    #[serde(default = "default_max_messages")]
    max_messages: usize,
    #[serde(default = "default_max_tokens")]
    max_tokens: usize,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self { max_messages: default_max_messages(), max_tokens: default_max_tokens() }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4000
}
fn default_rps() -> f64 {
    10.0
}
fn default_burst() -> f64 {
    50.0
}
fn default_audit_capacity() -> usize {
    1000
}
fn default_max_messages() -> usize {
    30
}
fn default_max_tokens() -> usize {
    8000
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("CHORUS_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = load_config(&cli.config).await?;
            serve(config, host, port).await
        }
        Commands::Skill { action } => match action {
            SkillAction::List => {
                list_skills();
                Ok(())
            }
        },
    }
}

async fn load_config(path: &PathBuf) -> anyhow::Result<ChorusConfig> {
    let config_str = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {e}", path.display()))?;
    Ok(toml::from_str(&config_str)?)
}

async fn serve(config: ChorusConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);

    let vector_store: Arc<dyn VectorStoreGateway> = match config.vector_store.path {
        Some(path) => {
            info!(path = %path.display(), "opening file-backed vector store");
            Arc::new(FileVectorStore::new(path).await?)
        }
        None => {
            info!("using in-memory vector store");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    let embedder = Arc::new(LocalEmbedding::default());
    let audit = Arc::new(AuditLog::new(config.security.audit_capacity));

    let mut registry = SkillRegistry::new();
    chorus_builtins::register_builtins(&mut registry);
    info!(count = registry.skill_count(), "built-in skills registered");

    let mut permissions = PermissionSet::new();
    for descriptor in registry.list_descriptors() {
        for cap in &descriptor.required_capabilities {
            permissions.grant(cap.clone());
        }
    }

    let mcp_config = McpConfig { max_messages: config.mcp.max_messages, max_tokens: config.mcp.max_tokens };
    let runtime = Arc::new(
        AgentRuntime::new(Arc::new(registry), permissions, vector_store.clone(), embedder.clone(), audit)
            .with_mcp_config(mcp_config),
    );

    let backend: Arc<dyn LlmBackend> = Arc::new(LlmClient::new(config.model));
    let engine = WorkflowEngine::new(runtime, backend.clone());
    let evaluator = Evaluator::new(backend.clone(), vector_store.clone(), embedder);
    let supervisor = Arc::new(TaskSupervisor::new(engine, backend, evaluator, vector_store));

    let rate_limiter = Arc::new(RateLimiter::new(config.security.max_burst, config.security.max_requests_per_second));
    let auth_config = chorus_gateway::AuthConfig::new(config.security.api_keys.clone());
    if auth_config.is_enabled() {
        info!(keys = config.security.api_keys.len(), "API key auth enabled");
    }

    let app = chorus_gateway::GatewayServer::build_with_middleware(supervisor, Some(rate_limiter), auth_config);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "chorus gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn list_skills() {
    let mut registry = SkillRegistry::new();
    chorus_builtins::register_builtins(&mut registry);

    let skills = registry.list_descriptors();
    if skills.is_empty() {
        println!("No skills registered.");
        return;
    }

    println!("Registered skills:");
    for skill in &skills {
        println!("  {} — {}", skill.name, skill.description);
        if !skill.required_capabilities.is_empty() {
            println!("    capabilities:");
            for cap in &skill.required_capabilities {
                match cap {
                    Capability::FileRead { allowed_paths } => println!("      file_read: {allowed_paths:?}"),
                    Capability::FileWrite { allowed_paths } => println!("      file_write: {allowed_paths:?}"),
                    Capability::NetworkAccess { allowed_hosts } => println!("      network: {allowed_hosts:?}"),
                    Capability::ShellExec { allowed_commands } => println!("      shell: {allowed_commands:?}"),
                    other => println!("      {other:?}"),
                }
            }
        }
    }
    println!("\ntotal: {} skill(s)", skills.len());
}
