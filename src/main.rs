mod api;
mod auth;
mod config;
mod db;
mod error;
mod mail;
mod models;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "konekt")]
#[command(about = "TeamKonekt backend - managers, employees, tasks, reports and announcements")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "konekt.toml")]
    config: PathBuf,

    /// SQLite database file (overrides config file)
    #[arg(long, env = "KONEKT_DATABASE")]
    database: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "KONEKT_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the HTTP API server (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("konekt=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(database) = cli.database {
        config.database.path = Some(database);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let db_path = config.database_path();
    let db = Database::open(&db_path)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db_path.display());
        }

        Commands::Serve => {
            db.ensure_initialized()?;
            serve(db, config).await?;
        }
    }

    Ok(())
}

async fn serve(db: Database, config: Config) -> Result<()> {
    let mailer = mail::create_mailer(&config.mail)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    info!(
        database = %db.path().map(|p| p.display().to_string()).unwrap_or_default(),
        mail_transport = ?config.mail.transport,
        "Starting konekt"
    );

    let state = api::AppState::new(db, mailer, config);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
