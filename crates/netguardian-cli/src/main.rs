//! netguardian CLI: find the control backend on the local network and talk to it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use netguardian_client::ApiClient;
use netguardian_discovery::{
    setup, Config, DiscoveryController, DiscoveryError, EndpointCache, HttpProbe, Probe,
};
use netguardian_types::{CandidateEndpoint, DiscoveryState, SubnetPrefix};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

#[derive(Parser)]
#[command(
    name = "netguardian",
    about = "Locate and talk to the netguardian control backend",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the backend: cached endpoint first, then a subnet sweep.
    Discover(SweepOverrides),

    /// Show the cached endpoint.
    Show,

    /// Forget the cached endpoint.
    Forget,

    /// Health-check one explicit base URL.
    Probe {
        /// Base URL, e.g. http://192.168.1.75:49152
        url: String,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },

    /// Discover the backend, then run a backend command on it.
    Exec {
        /// Command name, e.g. ping, trace, ports.
        command: String,
        /// Command arguments.
        args: Vec<String>,
        #[command(flatten)]
        overrides: SweepOverrides,
    },
}

#[derive(Args)]
struct SweepOverrides {
    /// Subnet prefix to sweep (repeatable, in priority order), e.g. 192.168.1
    #[arg(long = "prefix")]
    prefixes: Vec<SubnetPrefix>,
    /// Backend control port.
    #[arg(long)]
    port: Option<u16>,
    /// Probes per batch.
    #[arg(long)]
    batch_size: Option<usize>,
}

impl SweepOverrides {
    fn apply(self, config: &mut Config) -> anyhow::Result<()> {
        if !self.prefixes.is_empty() {
            config.discovery.prefixes = self.prefixes;
        }
        if let Some(port) = self.port {
            config.discovery.port = port;
        }
        if let Some(batch_size) = self.batch_size {
            config.discovery.batch_size = batch_size;
        }
        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();

    // Subscriber goes up before the config is read so its logs are kept;
    // the configured level is swapped in once it is known.
    let (filter, filter_handle) =
        reload::Layer::new(EnvFilter::new(filter_directives("info", rust_log.as_deref())));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = setup::load_config(cli.config.as_deref())?;
    filter_handle.reload(EnvFilter::new(filter_directives(
        &config.logging.level,
        rust_log.as_deref(),
    )))?;

    let cache = setup::endpoint_cache(&config);

    match cli.command {
        Commands::Discover(overrides) => {
            overrides.apply(&mut config)?;
            match discover(&config, cache).await {
                Ok(endpoint) => println!("{endpoint}"),
                Err(message) => {
                    eprintln!("{message}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Show => match cache.load()? {
            Some(persisted) => {
                println!("{}", persisted.base_url);
                println!("verified at {} (unix seconds)", persisted.verified_at);
            }
            None => println!("no cached endpoint"),
        },
        Commands::Forget => {
            cache.clear()?;
            tracing::info!(path = %cache.path().display(), "cached endpoint cleared");
        }
        Commands::Probe { url, timeout_ms } => {
            let endpoint = CandidateEndpoint::parse(&url)?;
            let probe = HttpProbe::new(config.discovery.health_path.clone())?;
            let outcome = probe
                .check(&endpoint, Duration::from_millis(timeout_ms))
                .await;
            match outcome.failure {
                None => println!("{endpoint} is alive"),
                Some(failure) => {
                    eprintln!("{endpoint} is unreachable: {failure}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Exec {
            command,
            args,
            overrides,
        } => {
            overrides.apply(&mut config)?;
            let endpoint = match discover(&config, cache).await {
                Ok(endpoint) => endpoint,
                Err(message) => {
                    eprintln!("{message}");
                    std::process::exit(1);
                }
            };

            let client = ApiClient::new(endpoint);
            let response = client
                .execute(&command, &args)
                .await
                .with_context(|| format!("running {command:?} on {}", client.endpoint()))?;

            if let Some(output) = &response.output {
                println!("{output}");
            }
            if let Some(data) = &response.data {
                println!("{}", serde_json::to_string_pretty(data)?);
            }
            if response.is_error() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Run discovery to completion, printing status changes to stderr.
///
/// The error is the user-facing failure message.
async fn discover(
    config: &Config,
    cache: impl EndpointCache,
) -> Result<CandidateEndpoint, String> {
    let probe = HttpProbe::new(config.discovery.health_path.clone()).map_err(|e| e.to_string())?;
    let controller = DiscoveryController::new(
        config.discovery.clone(),
        Arc::new(probe),
        Arc::new(cache),
    );

    let mut states = controller.subscribe();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            match state {
                DiscoveryState::Idle
                | DiscoveryState::Found { .. }
                | DiscoveryState::Failed { .. } => {}
                other => eprintln!("{other}"),
            }
        }
    });

    let result = controller.run().await;
    let final_state = controller.state();
    drop(controller);
    let _ = printer.await;

    match result {
        Ok(endpoint) => {
            eprintln!("{final_state}");
            Ok(endpoint)
        }
        Err(DiscoveryError::Exhausted(_)) => Err(final_state.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// `RUST_LOG` wins over the configured level when it is set.
fn filter_directives(config_level: &str, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim) {
        Some(directives) if !directives.is_empty() => directives.to_owned(),
        _ => config_level.to_owned(),
    }
}
