use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info};

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use anyhow::anyhow;

use call_bridge::{
    ServerConfig,
    config::PlivoConfig,
    core::telephony::{OutboundCall, PlivoClient},
    routes,
    state::AppState,
};

/// How long in-flight calls get to wind down after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Plivo ⇄ OpenAI Realtime voice bridge
#[derive(Parser, Debug)]
#[command(name = "plivo-realtime-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Place the configured outbound call once the server is listening
    #[arg(long)]
    dial: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let address = config.address();
    let tls_config = config.tls.clone();
    let plivo_config = config.plivo.clone();
    println!("Starting server on {address}");

    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to configure realtime provider: {}", e))?;
    let shutdown = app_state.shutdown.clone();

    let app = routes::create_app_router(app_state.clone());

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    if let Some(tls) = tls_config {
        // Load TLS configuration from certificate and key files
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            let shutdown = shutdown.clone();
            async move {
                shutdown.cancelled().await;
                handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            }
        });

        println!("Server listening on https://{} (TLS enabled)", socket_addr);
        if cli.dial {
            tokio::spawn(dial(plivo_config));
        }

        axum_server::bind_rustls(socket_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        let listener = TcpListener::bind(&socket_addr).await?;
        println!("Server listening on http://{}", socket_addr);
        if cli.dial {
            tokio::spawn(dial(plivo_config));
        }

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    }

    // Upgraded media streams are not tracked by the HTTP server
    app_state.drain_sessions(SHUTDOWN_GRACE).await;

    info!("Server stopped");
    Ok(())
}

/// Cancel every session on Ctrl+C
async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, closing sessions");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

/// Place the configured outbound call
async fn dial(plivo: PlivoConfig) {
    let placed = async {
        let call = OutboundCall::from_config(&plivo)?;
        let client = PlivoClient::new(&plivo)?;
        client.place_call(&call).await
    };

    if let Err(e) = placed.await {
        error!("Outbound call failed: {}", e);
    }
}
