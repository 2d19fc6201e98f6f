//! coze-proxy - OpenAI-compatible streaming proxy for Coze chat bots
//!
//! Accepts OpenAI chat completion requests, forwards them to the Coze v3
//! chat API and streams the answer back as OpenAI chunks.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coze_proxy::config::Config;
use coze_proxy::proxy::run_server;

#[derive(Parser)]
#[command(name = "coze-proxy")]
#[command(about = "OpenAI-compatible streaming proxy for Coze chat bots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Path to configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file and print the effective settings
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}

fn init_tracing(level: &str) {
    let default_filter = format!("coze_proxy={},tower_http=info", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut config = load_config(config.as_deref())?;
            init_tracing(&config.logging.level);

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config: path } => {
            let config = load_config(Some(&path))?;
            init_tracing(&config.logging.level);
            tracing::info!(config = %path, "Configuration is valid");
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
