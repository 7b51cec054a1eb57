use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reactmail_channels::{CommandMailer, SlackClient};
use reactmail_core::{ChannelCache, EventPipeline};
use reactmail_gateway::GatewayServer;

mod config;

use config::ReactmailConfig;

#[derive(Parser)]
#[command(name = "reactmail")]
#[command(version)]
#[command(about = "Mail out Slack messages when someone reacts to them")]
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
    /// Start the webhook server
    Start {
        /// Listen port (overrides the config file)
        #[arg(long)]
        port: Option<u16>,

        /// Webhook path (overrides the config file)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Write the default config (to --config when given) and mail template
    Init,

    /// Show current configuration
    Config,

    /// Fetch and print the watched channel ids
    Channels,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Init => cmd_init(&cli.config).await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Channels => cmd_channels(&cli.config).await,
        Commands::Start { port, endpoint } => cmd_start(&cli.config, port, endpoint).await,
    }
}

async fn cmd_init(config_path: &Option<PathBuf>) -> Result<()> {
    let config_path = config::config_path(config_path);
    config::write_default_files(&config_path).await?;

    let dir = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    println!("reactmail initialized at {}", dir.display());
    println!("Edit {} to configure your Slack tokens and mail settings.", config_path.display());
    println!(
        "Put the mail command at {} or point [mail].command elsewhere.",
        dir.join("bin").join("send_feed").display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ReactmailConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.masked())?);
    Ok(())
}

async fn cmd_channels(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ReactmailConfig::load(config_path)?;
    let pipeline = build_pipeline(&cfg)?;
    let count = pipeline.cache().refresh().await?;
    let snapshot = pipeline.cache().snapshot();
    let mut channels: Vec<_> = snapshot.iter().collect();
    channels.sort();
    for (id, name) in channels {
        println!("{}\t#{}", id, name);
    }
    println!("{} watched channel(s)", count);
    Ok(())
}

async fn cmd_start(
    config_path: &Option<PathBuf>,
    port: Option<u16>,
    endpoint: Option<String>,
) -> Result<()> {
    let mut cfg = ReactmailConfig::load(config_path)?;
    cfg.apply_overrides(port, endpoint);
    cfg.validate()?;
    info!("Starting reactmail...");

    let bind = cfg.server.bind_addr()?;
    let pipeline = build_pipeline(&cfg)?;

    // Startup refresh; failures leave the cache empty until a channel event
    if let Err(e) = pipeline.cache().refresh().await {
        warn!("Initial channel refresh failed: {}. Starting with no watched channels", e);
    }

    let cancel = CancellationToken::new();
    let server = GatewayServer::new(bind, cfg.server.endpoint.clone(), pipeline)?;
    let endpoint = server.endpoint().to_string();
    let mut handle = server.spawn(cancel.clone());

    println!("reactmail is listening on http://{}{}", bind, endpoint);
    println!("Press Ctrl+C to stop.");

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Received Ctrl+C, shutting down...");
        }
        res = &mut handle => {
            // Server exited on its own, e.g. the port was taken
            return res?;
        }
    }

    cancel.cancel();
    handle.await??;
    info!("reactmail stopped");
    Ok(())
}

fn build_pipeline(cfg: &ReactmailConfig) -> Result<Arc<EventPipeline>> {
    let forwarder = Arc::new(cfg.forwarder_config());

    let slack = Arc::new(
        SlackClient::new(cfg.slack.access_token.clone())?
            .with_base_url(cfg.slack.api_base_url.clone()),
    );

    let mailer = Arc::new(CommandMailer::new(
        cfg.mail.command.clone(),
        cfg.mail.command_options.clone(),
        Duration::from_secs(cfg.mail.timeout_secs),
    ));
    if !mailer.command().exists() {
        warn!(
            "Mail command {} does not exist; forwards will fail until it does",
            mailer.command().display()
        );
    }

    let cache = Arc::new(ChannelCache::new(
        slack.clone(),
        forwarder.target_channel_names.clone(),
    ));

    Ok(Arc::new(EventPipeline::new(forwarder, slack, mailer, cache)))
}
