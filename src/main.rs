// ABOUTME: CLI entry point for finn-bobil-sync
// ABOUTME: Parses commands, sets up logging and routes to the command handlers

use clap::{Args, Parser, Subcommand};
use finn_bobil_sync::commands;
use finn_bobil_sync::config::ConfigSources;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "finn-bobil-sync")]
#[command(about = "Mirror finn.no camper-van listings into MySQL", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

/// Settings layered over SUPERVISOR_OPTIONS. Flags beat the config file.
#[derive(Args, Clone, Default)]
struct ConfigArgs {
    /// Path to a TOML or JSON file with the same keys as SUPERVISOR_OPTIONS
    #[arg(long = "config", env = "FINN_SYNC_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long = "db-host", env = "DB_HOST")]
    db_host: Option<String>,
    #[arg(long = "db-user", env = "DB_USER")]
    db_user: Option<String>,
    #[arg(long = "db-password", env = "DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,
    #[arg(long = "db-name", env = "DB_NAME")]
    db_name: Option<String>,
    #[arg(long = "db-port", env = "DB_PORT")]
    db_port: Option<u16>,
}

impl ConfigArgs {
    fn into_sources(self) -> ConfigSources {
        let mut sources = ConfigSources::from_env().with_file(self.config);
        let texts = [
            ("databasehost", self.db_host),
            ("databaseusername", self.db_user),
            ("databasepassword", self.db_password),
            ("databasename", self.db_name),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                sources.set(key, value);
            }
        }
        if let Some(port) = self.db_port {
            sources.set("databaseport", port);
        }
        sources
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch matching listings and bring the database in line with them
    Sync {
        #[command(flatten)]
        config: ConfigArgs,
        /// Log what would change without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Repeat the sync every N seconds until Ctrl+C
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Print the search URL and parameters the current settings produce
    SearchUrl {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log, which defaults to "info"
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Sync {
            config,
            dry_run,
            interval,
        } => {
            let mut sources = config.into_sources();
            // The flag only ever turns dry-run on; it never overrides a configured `true`.
            if dry_run {
                sources.set("dry_run", true);
            }
            let interval = match interval {
                Some(0) => anyhow::bail!("--interval must be at least 1 second"),
                other => other.map(Duration::from_secs),
            };
            commands::sync(commands::sync::SyncOptions { sources, interval }).await
        }
        Commands::SearchUrl { config } => commands::search_url(&config.into_sources()),
    }
}
