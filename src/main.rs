//! # Back-office API Entry Point

use std::process;

use anyhow::Context;
use backoffice::{auth, config::ConfigLoader, db, server::run_server, telemetry};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "backoffice", about = "Back-office API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations and start the HTTP server (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Print a bearer token for an existing user
    IssueToken(IssueTokenArgs),
}

#[derive(Debug, Args)]
struct IssueTokenArgs {
    #[arg(long)]
    user_id: Uuid,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("{error:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;

    if let Some(Commands::IssueToken(args)) = &cli.command {
        let secret = config
            .jwt_secret
            .as_deref()
            .context("BACKOFFICE_JWT_SECRET is not set")?;
        let token = auth::issue_token(secret, args.user_id, chrono::Duration::hours(args.hours))
            .context("signing token")?;
        println!("{token}");
        return Ok(());
    }

    config.validate().context("validating configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    tracing::info!(profile = %config.profile, "Configuration loaded");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    Migrator::up(&db, None).await.context("applying migrations")?;

    match cli.command {
        Some(Commands::Migrate) => {
            tracing::info!("Migrations applied");
            Ok(())
        }
        _ => run_server(config, db).await,
    }
}
