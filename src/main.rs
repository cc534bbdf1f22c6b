use std::path::PathBuf;

use passage::config::Configuration;
use passage::{app, initialize_state, telemetry};
use tokio::net::TcpListener;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    // read configuration file, first argument overrides `config.yaml`.
    let mut config = Configuration::default();
    if let Some(path) = std::env::args().nth(1) {
        config = config.path(PathBuf::from(path));
    }
    let config = match config.read() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cannot read configuration: {err}");
            std::process::exit(1);
        },
    };

    let provider = match telemetry::init(config.telemetry.otlp) {
        Ok(provider) => provider,
        Err(err) => {
            eprintln!("cannot initialize telemetry: {err}");
            std::process::exit(1);
        },
    };

    match config.file() {
        Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        None => tracing::warn!("no `config.yaml` file found, using defaults"),
    }

    let address = config.address.clone();
    let state = match initialize_state(config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot start server");
            std::process::exit(1);
        },
    };

    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %address, "cannot bind address");
            std::process::exit(1);
        },
    };
    tracing::info!(%address, "server listening");

    if let Err(err) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server stopped unexpectedly");
    }

    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "failed to flush spans");
        }
    }
}
