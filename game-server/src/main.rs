use std::sync::Arc;
use tokio::signal;
use tracing::info;

use game_core::WordBank;
use game_server::{
    config::Config, create_routes, orchestrator::Orchestrator, websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Word Derby server...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());

    info!("Loading word cache from: {}", config.words_file);
    let word_bank = match load_word_bank(&config.words_file) {
        Ok(bank) => {
            info!("Loaded {} playable words", bank.word_count());
            bank
        }
        Err(e) => {
            tracing::error!("Failed to load word cache '{}': {:#}", config.words_file, e);
            tracing::error!("The server cannot ask questions without a word cache.");
            tracing::error!(
                "Set WORDS_FILE to a tab-separated file of word/type/definition entries."
            );
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        connection_manager.clone(),
        config.session_config(),
        Box::new(word_bank),
    ));

    let routes = create_routes(
        connection_manager.clone(),
        orchestrator.clone(),
        config.static_dir.clone(),
    );

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().expect("Invalid HOST"),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}

fn load_word_bank(path: &str) -> anyhow::Result<WordBank> {
    let text = std::fs::read_to_string(path)?;
    WordBank::parse(&text)
}
