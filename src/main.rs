use anyhow::Result;

use trilha_sonora::config::{self, LogFormat};
use trilha_sonora::routes;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::info!("🎵 Trilha Sonora starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    let state = routes::AppState::new(config.clone())?;
    tracing::info!("✅ Ollama client initialized ({})", config.ollama_url);

    // Probe Ollama without failing: the server may be started after us
    check_ollama(&state).await;

    let app = routes::build_app(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Initialize tracing with the configured level and format (RUST_LOG wins)
fn init_logging(config: &config::Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .init(),
    }
}

/// Log whether Ollama is up and the configured models are pulled
async fn check_ollama(state: &routes::AppState) {
    if !state.http_client.is_reachable().await {
        tracing::error!("❌ Ollama is not reachable at {}", state.config.ollama_url);
        tracing::error!("🔧 Start it with: ollama serve");
        tracing::warn!("Server will start but analysis requests will fail until Ollama is up");
        return;
    }
    tracing::info!("✅ Ollama is running");

    if let Err(e) = state.catalog.refresh_if_stale(&state.http_client).await {
        tracing::warn!("Could not list Ollama models: {}", e);
        return;
    }

    let mut models = vec![state.config.ollama_model.as_str()];
    if state.config.emotion_model != state.config.ollama_model {
        models.push(state.config.emotion_model.as_str());
    }

    for model in models {
        if state.catalog.contains(model) {
            tracing::info!("✅ Model {} found", model);
        } else {
            tracing::warn!("❌ Model {} not found. Run: ollama pull {}", model, model);
        }
    }
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                  🎵 Trilha Sonora                          ║
║                                                           ║
║  Environment & emotion analysis for reading soundtracks   ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    let integrations = config.integrations.status();

    println!("{}", banner);
    println!("  Version:        {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:         http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Ollama:         {}", config.ollama_url);
    println!("  Model:          {}", config.ollama_model);
    println!("  Emotion model:  {}", config.emotion_model);
    println!("  Min confidence: {}", config.min_confidence);
    println!(
        "  API key:        {}",
        if config.api_key.is_some() {
            "required"
        } else {
            "disabled"
        }
    );
    println!("  Log Level:      {}", config.log_level);
    println!(
        "  Integrations:   database={} cache={} spotify={} storage={} analytics={}",
        integrations.database,
        integrations.cache,
        integrations.spotify,
        integrations.object_storage,
        integrations.analytics
    );
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
