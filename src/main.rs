// ABOUTME: Entry point for the wikisync binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs the HTTP server or the seed client.

mod seed;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wikisync_server::{AppState, WikisyncConfig, create_router};

#[derive(Parser, Debug)]
#[command(name = "wikisync", about = "Page store with an audit log and incremental sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// SQLite database file (overrides WIKISYNC_DB).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Listen address (overrides WIKISYNC_BIND).
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Drive a running server through a full page lifecycle.
    Seed {
        /// Base URL of the server.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,

        /// Number of pages to create.
        #[arg(long, default_value_t = 25)]
        pages: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wikisync=debug,tower_http=debug")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { db, bind } => serve(db, bind).await,
        Command::Seed { url, pages } => {
            let mutations = seed::Seeder::new(&url).run(pages).await?;
            println!("issued {mutations} mutations against {url}");
            Ok(())
        }
    }
}

async fn serve(db: Option<PathBuf>, bind: Option<SocketAddr>) -> Result<()> {
    let mut config = WikisyncConfig::from_env()?;
    if let Some(db) = db {
        config.db_path = db;
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let state = AppState::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(
        "wikisync listening on {} (db: {})",
        config.bind,
        config.db_path.display()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
