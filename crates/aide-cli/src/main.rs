use aide_channels::{MessageBus, SlackChannel};
use aide_core::api::ApiClient;
use aide_core::types::{ChannelType, IncomingMessage};
use aide_core::{AgentRegistry, CommandRouter, default_registry};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod daemon;

use config::AideConfig;
use daemon::LoopSettings;

#[derive(Parser)]
#[command(name = "aide")]
#[command(version)]
#[command(about = "aide: a Slack assistant that routes commands to agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the aide daemon
    Start,

    /// Route a single message locally and print the reply
    Ask {
        /// The message to route, e.g. "profile Acme Corp"
        message: String,
    },

    /// List the registered agents
    Agents,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
        Commands::Ask { message } => cmd_ask(&cli.config, &message).await,
        Commands::Agents => cmd_agents().await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("aide initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure your API key and Slack token.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = AideConfig::load(config_path)?;
    println!("{}", cfg.to_display_toml()?);
    Ok(())
}

fn build_client(cfg: &AideConfig) -> ApiClient {
    ApiClient::new(cfg.llm.api_key.clone(), Some(cfg.llm.model.clone()))
        .with_max_tokens(cfg.llm.max_tokens)
        .with_base_url(cfg.llm.base_url.clone())
}

fn build_router(cfg: &AideConfig, registry: AgentRegistry) -> CommandRouter {
    let registry = Arc::new(registry);
    if !registry.contains(&cfg.router.fallback_command) {
        warn!(
            "Fallback command '{}' is not registered; unknown commands get a static reply",
            cfg.router.fallback_command
        );
    }
    CommandRouter::new(registry)
        .with_fallback(cfg.router.fallback_command.clone())
        .with_error_message(cfg.router.error_message.clone())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = AideConfig::load(config_path)?;
    info!("Starting aide daemon...");

    if cfg.llm.api_key.trim().is_empty() {
        warn!("llm.api_key is empty; language model agents will fail until it is set");
    }

    let client = Arc::new(build_client(&cfg));
    let registry = default_registry(client);
    let router = Arc::new(build_router(&cfg, registry));
    info!(
        "Command router ready with {} command names",
        router.registry().len()
    );

    let mut bus = MessageBus::new(cfg.router.bus_buffer);

    if cfg.slack.enabled {
        let slack = SlackChannel::new(
            cfg.slack.bot_token.clone(),
            Duration::from_secs(cfg.slack.poll_interval_secs),
            cfg.slack.allowed_users.clone(),
        )
        .with_watched_channels(cfg.slack.watch_channels.clone());
        bus.register(Arc::new(slack));
        info!("Slack channel registered");
    }

    if bus.channel_count() == 0 {
        bail!("No channels enabled. Set slack.enabled = true in the config file.");
    }

    bus.start_all().await.context("Failed to start channels")?;

    let (incoming_rx, bus_sender) = bus.split();
    let cancel = CancellationToken::new();
    let settings = LoopSettings {
        max_concurrent: cfg.router.max_concurrent,
        acknowledge: cfg.router.acknowledge,
    };
    let main_loop = tokio::spawn(daemon::run_dispatch_loop(
        incoming_rx,
        bus_sender,
        router,
        settings,
        cancel.clone(),
    ));

    signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    cancel.cancel();

    let _ = main_loop.await;

    println!("aide stopped.");
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str) -> Result<()> {
    let cfg = AideConfig::load(config_path)?;
    let client = Arc::new(build_client(&cfg));
    let router = build_router(&cfg, default_registry(client));

    let incoming = local_message(message);
    let reply = router.dispatch(&incoming).await;
    println!("{}", reply.content);
    Ok(())
}

async fn cmd_agents() -> Result<()> {
    // Listing needs no credentials
    let client = Arc::new(ApiClient::new(String::new(), None));
    let registry = default_registry(client);

    for summary in registry.summaries() {
        if summary.aliases.is_empty() {
            println!("{:<10} {}", summary.name, summary.description);
        } else {
            println!(
                "{:<10} {} (aliases: {})",
                summary.name,
                summary.description,
                summary.aliases.join(", ")
            );
        }
    }
    Ok(())
}

fn local_message(text: &str) -> IncomingMessage {
    IncomingMessage {
        id: uuid::Uuid::new_v4().to_string(),
        channel: ChannelType::Internal,
        channel_id: "cli".to_string(),
        thread_ts: None,
        user_id: std::env::var("USER").unwrap_or_else(|_| "local".to_string()),
        text: text.to_string(),
        timestamp: chrono::Utc::now(),
    }
}
