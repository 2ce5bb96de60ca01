use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use advisory_feeds::config::Config;
use advisory_feeds::fetch::HttpFetcher;
use advisory_feeds::handler::{handle, Context};
use advisory_feeds::server::run_server;
use advisory_feeds::source::Params;

/// Get the config directory path (~/.config/advisory-feeds/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("advisory-feeds"))
}

#[derive(Parser, Debug)]
#[command(
    name = "advisory-feeds",
    version,
    about = "Re-publishes vendor security advisories as Atom and JSON feeds"
)]
struct Args {
    /// Config file (default: ~/.config/advisory-feeds/config.toml)
    #[arg(long, short, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Listen address, overriding `bind` from the config file
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Render one feed to stdout and exit
    Render {
        /// Source name, e.g. redhat or github
        source: String,

        /// Request parameters as key=value
        #[arg(value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Output format (atom or json), same as format=...
        #[arg(long)]
        format: Option<String>,
    },
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "Loaded configuration");

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            let addr = config.bind.clone();
            let fetcher = HttpFetcher::from_config(&config).context("Failed to build HTTP client")?;
            let ctx = Arc::new(Context::new(fetcher, config));
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            run_server(listener, ctx).await.context("Server error")?;
        }
        Command::Render {
            source,
            params,
            format,
        } => {
            let mut params: Params = params.into_iter().collect();
            if let Some(format) = format {
                params.insert("format".to_string(), format);
            }
            let fetcher = HttpFetcher::from_config(&config).context("Failed to build HTTP client")?;
            let ctx = Context::new(fetcher, config);
            let response = handle(&ctx, &source, &params).await;
            if response.status != 200 {
                anyhow::bail!("{} ({})", response.body.trim_end(), response.status);
            }
            println!("{}", response.body);
        }
    }

    Ok(())
}
