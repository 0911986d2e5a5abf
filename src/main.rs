use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courtside::api::state::AppState;
use courtside::api::{build_router, cors_layer};
use courtside::config::AppConfig;
use courtside::storage::{load_state, save_state, StorageConfig};

#[derive(Parser)]
#[command(name = "courtside")]
#[command(about = "Match results and ratings for recreational doubles")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Report ledger inconsistencies without changing anything
    Audit {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Repair ledgers and stored ratings
    Reconcile {
        /// Show what an audit finds instead of repairing
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load the config file, apply command-line overrides and validate the result.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let config_path = PathBuf::from(&cli.config);
    let mut config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = PathBuf::from(&cli.config);
    let config = resolve_config(&cli)?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_tracing(&level, cli.json_logs);

    if !config_path.exists() {
        tracing::warn!("Config file {:?} not found, using defaults", config_path);
    }
    tracing::info!("Starting courtside v{}", env!("CARGO_PKG_VERSION"));

    let storage = StorageConfig::new(config.data_dir.clone());

    match cli.command {
        Commands::Serve { .. } => {
            let platform = load_state(&storage, config.rules.clone())?;
            let state = AppState::new(storage, platform);
            let app = build_router(state).layer(
                cors_layer(&config.server.cors_origin).context("invalid cors_origin")?,
            );

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Audit { json } => {
            let platform = load_state(&storage, config.rules.clone())?;
            let report = platform.audit_ledgers();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("=== Ledger Audit ===");
                println!("Players checked: {}", report.players_checked);
                println!("Matches checked: {}", report.matches_checked);
                println!("Findings:        {}", report.findings.len());
                for finding in &report.findings {
                    println!("  - {}", serde_json::to_string(finding)?);
                }
            }
        }
        Commands::Reconcile { dry_run } => {
            let mut platform = load_state(&storage, config.rules.clone())?;

            if dry_run {
                let report = platform.audit_ledgers();
                println!("{} finding(s); nothing written (dry run)", report.findings.len());
                for finding in &report.findings {
                    println!("  - {}", serde_json::to_string(finding)?);
                }
                return Ok(());
            }

            let report = platform.repair_ledgers(Utc::now())?;
            save_state(&storage, &platform)?;

            println!("=== Reconciliation ===");
            println!("Duplicates removed:         {}", report.duplicates_removed);
            println!("Stale placeholders removed: {}", report.stale_placeholders_removed);
            println!("Snapshots restored:         {}", report.snapshots_restored);
            println!("Placeholders restored:      {}", report.placeholders_restored);
            println!("Results restored:           {}", report.confirmed_entries_restored);
            println!("Ratings corrected:          {}", report.ratings_corrected.len());
        }
    }

    Ok(())
}
