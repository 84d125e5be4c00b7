//! efc-board - AAC phrase board service
//!
//! Loads the phrase library (local SQLite mirror, optional remote sync,
//! bundled defaults), then serves the board API until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use efc_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};
use efc_common::defaults::DefaultPhrases;
use efc_common::events::EventBus;
use efc_common::time::millis_to_duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use efc_board::composer::{Composer, ComposerSettings};
use efc_board::images::{HttpImageFetcher, ImageMaterializer};
use efc_board::library::{LibraryDeps, PhraseLibrary};
use efc_board::pictograms::{common_pictograms, ArasaacClient, PictogramSuggestions};
use efc_board::remote::{MemoryRemote, RemoteSync};
use efc_board::storage::SqliteStore;
use efc_board::{build_router, speech, AppState};

/// Command-line arguments for efc-board
#[derive(Parser, Debug)]
#[command(name = "efc-board")]
#[command(about = "AAC phrase board service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "EFC_BOARD_PORT")]
    port: u16,

    /// Root folder holding the phrase database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to <config_dir>/efc/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity whose phrases are synced; omit to run local-only
    #[arg(short, long, env = "EFC_OWNER")]
    owner: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "efc_board={level},efc_common={level},tower_http=info",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting EFC phrase board (efc-board) v{} [{}]",
        env!("CARGO_PKG_VERSION"),
        env!("EFC_BUILD_ID")
    );

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &toml_config).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let storage = Arc::new(
        SqliteStore::connect(&db_path)
            .await
            .context("Failed to open phrase database")?,
    );

    let mut board = toml_config.board.clone();
    board.allowed_origins = board.effective_origins(args.port);

    let materializer = match HttpImageFetcher::new() {
        Ok(fetcher) => ImageMaterializer::new(Arc::new(fetcher)),
        Err(e) => {
            warn!("Image fetching unavailable, pictograms stay as URLs: {}", e);
            ImageMaterializer::offline()
        }
    };

    // In-process document store; vendor adapters plug in behind RemoteSync
    let remote: Arc<dyn RemoteSync> = Arc::new(MemoryRemote::new());

    let library = PhraseLibrary::new(LibraryDeps {
        storage,
        materializer: Arc::new(materializer),
        defaults: DefaultPhrases::from_optional_path(board.defaults_path.clone()),
        events: EventBus::default(),
        remote: Some(remote),
        remote_timeout: millis_to_duration(board.remote_timeout_ms),
    });

    let source = match args.owner.clone() {
        Some(owner) => library.switch_identity(Some(owner)).await,
        None => library.initialize().await,
    };
    info!(?source, "Phrase library loaded");

    let synthesizer = speech::from_config(&board).context("Invalid speech command")?;
    let composer = Composer::new(
        library.clone(),
        synthesizer,
        ComposerSettings::from_config(&board),
    );

    let pictogram_client = Arc::new(
        ArasaacClient::new(&toml_config.pictograms).context("Failed to build pictogram client")?,
    );
    let suggestions = Arc::new(PictogramSuggestions::new(
        pictogram_client.clone(),
        common_pictograms(pictogram_client.base_url()),
        board.pictogram_search_limit,
        millis_to_duration(board.pictogram_debounce_ms),
    ));

    let state = AppState::new(
        library.clone(),
        composer,
        suggestions,
        pictogram_client,
        board,
    )
    .with_export_dir(initializer.export_dir());
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("efc-board listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    library.flush().await;
    info!("Pending writes flushed, shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
