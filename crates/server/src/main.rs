use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidingest_core::transcode::{CapabilityProber, ProcessRunner, TokioProcessRunner};
use vidingest_core::{
    create_processor, load_config, validate_config, CodecProbeCache, LogFormat, LoggingConfig,
};
use vidingest_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("VIDINGEST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config.logging);
    info!("Loaded configuration from {:?}", config_path);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        backend = config.transcoder.backend.as_str(),
        ffmpeg = %config.transcoder.ffmpeg_path.display(),
        max_parallel_jobs = config.jobs.max_parallel_jobs,
        "Configuration loaded successfully"
    );

    for root in [&config.storage.input_root, &config.storage.output_root] {
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create storage root {}", root.display()))?;
    }
    info!(
        input_root = %config.storage.input_root.display(),
        output_root = %config.storage.output_root.display(),
        "Storage roots ready"
    );

    // Create the processor for the configured backend
    let processor = create_processor(&config.transcoder, config.processing.clone());
    info!("Using video processor: {}", processor.name());

    // Shares the process-wide cache with the processor, so either side warms it
    let runner: Arc<dyn ProcessRunner> =
        Arc::new(TokioProcessRunner::new(config.transcoder.timeout_secs));
    let capabilities = CapabilityProber::new(
        runner,
        config.transcoder.ffmpeg_path.clone(),
        CodecProbeCache::global(),
    );
    match capabilities.supported().await {
        Some(codecs) => info!(
            video = codecs.video.len(),
            audio = codecs.audio.len(),
            "Encoder capabilities detected"
        ),
        None => error!(
            "Could not list encoders of {}; codec selection will use defaults",
            config.transcoder.ffmpeg_path.display()
        ),
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), processor, capabilities));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
