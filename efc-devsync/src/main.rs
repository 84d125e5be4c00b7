//! efc-devsync - local dev sync endpoint
//!
//! Accepts `POST /save-phrases` and rewrites the default dataset file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use efc_devsync::{build_router, AppState};
use tracing::info;

/// Command-line arguments for efc-devsync
#[derive(Parser, Debug)]
#[command(name = "efc-devsync")]
#[command(about = "Development endpoint that rewrites the default phrase dataset")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "EFC_DEVSYNC_PORT")]
    port: u16,

    /// Dataset file to overwrite
    #[arg(
        short,
        long,
        default_value = "efc-common/assets/default_phrases.json",
        env = "EFC_DEVSYNC_TARGET"
    )]
    target: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting EFC dev sync (efc-devsync) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    info!("Target file: {}", args.target.display());

    let app = build_router(AppState::new(args.target));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("JSON sync server running at http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
