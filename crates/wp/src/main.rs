mod config;

use clap::{Parser, Subcommand};
use config::{LogFormat, ServeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wp_core::Engine;
use wp_core::collaborators::{InMemoryTripSheets, LocalChannelHost};
use wp_db::SqliteProvider;
use wp_events::EventBus;

#[derive(Parser)]
#[command(name = "wp", about = "Geofence check-ins and dispatcher channels", version)]
struct Cli {
    /// TOML config file; falls back to $WAYPOST_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and live channel.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the OpenAPI document.
    Openapi,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port } => {
            let mut config = match ServeConfig::load(cli.config.as_deref()) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("wp: {err}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(port) = port {
                config.port = port;
            }
            init_logging(&config);
            match serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    tracing::error!(error = %err, "serve failed");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Openapi => {
            println!("{}", wp_serve::openapi::generate_spec());
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(config: &ServeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn serve(config: ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = SqliteProvider::new(&config.db_path)?;
    tracing::info!(
        db_path = %config.db_path.display(),
        trip_sheets = config.trip_sheets.len(),
        "database ready"
    );
    let engine = Engine::new(
        provider,
        EventBus::new(config.engine.event_bus_capacity),
        Arc::new(InMemoryTripSheets::new(config.trip_sheets)),
        Arc::new(LocalChannelHost::new()),
        config.engine.clone(),
    );
    let state = wp_serve::AppState::new(engine);
    if config.engine.auto_create_channels {
        wp_serve::auto_channel::spawn(state.clone());
    }
    let addr = SocketAddr::new(config.bind, config.port);
    wp_serve::serve(state, addr).await?;
    Ok(())
}
