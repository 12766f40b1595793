//! CrawlHive - Agent process supervision and messaging for web-crawler fleets
//!
//! One binary, three roles: the long-lived dispatcher (`serve`), the
//! per-agent worker process the supervisor spawns (`agent`), and a one-shot
//! client for poking a running dispatcher (`send`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use crawlhive::{
    agent::{AgentBehavior, AgentKind, AgentRuntime, WebCrawler},
    config::CrawlHiveConfig,
    dispatcher::Dispatcher,
    pool::ConnectionPool,
    store::MemoryStore,
    supervisor::Supervisor,
    wire::Envelope,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crawlhive")]
#[command(author = "CrawlHive Team")]
#[command(version)]
#[command(about = "Agent process supervision and messaging for web-crawler fleets")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CRAWLHIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the backend command dispatcher
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one agent process (spawned by the supervisor)
    #[command(hide = true)]
    Agent {
        /// Agent id; the command port derives from it
        #[arg(long)]
        id: u32,

        /// Agent variant
        #[arg(long, default_value = "web-crawler")]
        kind: String,

        /// Host to bind the command server on
        #[arg(long)]
        host: Option<String>,

        /// Base command port
        #[arg(long)]
        base_port: Option<u16>,

        /// Status hub port
        #[arg(long)]
        status_port: Option<u16>,
    },

    /// Send one command envelope to a running dispatcher
    Send {
        /// Command name
        command: String,

        /// Params as a JSON mapping
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("crawlhive={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = CrawlHiveConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            run_dispatcher(config, host, port).await?;
        }
        Commands::Agent {
            id,
            kind,
            host,
            base_port,
            status_port,
        } => {
            run_agent(config, id, &kind, host, base_port, status_port).await?;
        }
        Commands::Send { command, params } => {
            send_command(&config, &command, &params).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_dispatcher(
    mut config: CrawlHiveConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.dispatcher.host = host;
    }
    if let Some(port) = port {
        config.dispatcher.port = port;
    }

    tracing::info!("Starting CrawlHive dispatcher");

    let supervisor = Arc::new(Supervisor::new(config.agents.clone()));
    let dispatcher = Dispatcher::bind(&config, Arc::new(MemoryStore::new()), supervisor).await?;

    tracing::info!(
        addr = %dispatcher.local_addr(),
        status = %dispatcher.status_addr(),
        "Dispatcher is running. Press Ctrl+C to stop."
    );

    tokio::select! {
        result = dispatcher.run() => {
            result?;
            tracing::info!("Dispatcher stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
    }

    Ok(())
}

async fn run_agent(
    mut config: CrawlHiveConfig,
    id: u32,
    kind: &str,
    host: Option<String>,
    base_port: Option<u16>,
    status_port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.agents.host = host;
    }
    if let Some(base_port) = base_port {
        config.agents.base_command_port = base_port;
    }
    if let Some(status_port) = status_port {
        config.agents.status_port = status_port;
    }

    let kind = AgentKind::from_str(kind).map_err(|e| anyhow::anyhow!(e))?;
    let behavior: Box<dyn AgentBehavior> = match kind {
        AgentKind::WebCrawler => Box::new(WebCrawler::new(config.crawler.clone())),
    };

    let runtime = AgentRuntime::new(id, config.agents.clone(), behavior);
    runtime.run().await?;
    Ok(())
}

async fn send_command(config: &CrawlHiveConfig, command: &str, params: &str) -> Result<()> {
    let params: serde_json::Value = serde_json::from_str(params)
        .map_err(|e| anyhow::anyhow!("params must be a JSON mapping: {}", e))?;

    let pool = ConnectionPool::connect(&config.dispatcher.addr(), &config.pool).await?;
    let reply = pool.request(&Envelope::new(command, params)).await?;
    pool.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&reply.data)?);
    if reply.status_code >= 400 {
        anyhow::bail!("dispatcher replied with status {}", reply.status_code);
    }
    Ok(())
}

fn show_config(config: Option<&CrawlHiveConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
