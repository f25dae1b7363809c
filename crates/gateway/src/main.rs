use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ops_gateway::{
    config::{Config, LogFormat, LoggingConfig},
    engine::MetricsEngine,
    metrics::{PrometheusReporter, Reporter},
    server::Server,
    tools::ToolRegistry,
};

#[derive(Parser)]
#[command(name = "ops-gateway", about = "Derived metrics and alert tools over Prometheus")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tools over HTTP (default)
    Serve {
        /// Overrides SERVER_ADDR
        #[arg(long)]
        addr: Option<String>,
    },
    /// Call one tool and print its result as JSON
    Call {
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// List the available tools
    Tools,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);
    info!(
        prometheus = %config.prometheus.url,
        prefix = %config.tools.prefix,
        authenticated = config.prometheus.auth_token.is_some(),
        "Loaded configuration"
    );

    let reporter: Arc<dyn Reporter> = Arc::new(PrometheusReporter::new()?);
    let engine = MetricsEngine::new(&config.prometheus, reporter.clone())?;
    let registry = Arc::new(ToolRegistry::with_metrics_tools(
        config.tools.prefix.clone(),
        engine,
        reporter,
    ));

    match cli.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Serve { addr } => {
            let addr: SocketAddr = addr
                .unwrap_or(config.server.addr)
                .parse()
                .context("Invalid listen address")?;
            Server::new(registry).serve(addr).await?;
        }
        Command::Call { tool, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let result = registry.call(&tool, args).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&registry.descriptors())?);
        }
    }

    Ok(())
}
