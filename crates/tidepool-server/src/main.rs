//! # tidepool
//!
//! Minimal line-protocol message broker.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (localhost:8080)
//! tidepool
//!
//! # Run with a custom config
//! tidepool --config /path/to/tidepool.toml
//!
//! # Run with environment variables
//! TIDEPOOL_PORT=9000 TIDEPOOL_HOST=0.0.0.0 tidepool
//! ```

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tidepool_server::{metrics, Broker, Config};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tidepool=info,tidepool_server=info,tidepool_core=info,tidepool_transport=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let addr = config.bind_addr();

    if config.metrics.enabled {
        metrics::init_metrics();
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let broker = Arc::new(Broker::new(config));

    // Bind before serving: a bind failure must stop the process.
    let transport = broker
        .bind(&addr)
        .await
        .with_context(|| format!("Failed to start server on {addr}"))?;

    info!("tidepool is listening on {}", addr);

    let server = tokio::spawn(Arc::clone(&broker).serve(transport));

    let signal = wait_for_signal().await?;
    info!("Received {}, shutting down", signal);

    let outcome = broker.shutdown().await;
    server.await.context("Accept loop panicked")?;

    info!(?outcome, "Server is shut down");
    Ok(())
}

/// Load the config from `--config <path>` or the default search paths.
fn load_config() -> Result<Config> {
    let mut args = std::env::args().skip(1);
    match (args.next().as_deref(), args.next()) {
        (None, _) => Config::load(),
        (Some("--config"), Some(path)) => Config::from_file(path),
        (Some("--config"), None) => bail!("--config requires a path"),
        (Some(other), _) => bail!("Unexpected argument: {other} (usage: tidepool [--config <path>])"),
    }
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn wait_for_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                Ok("interrupt")
            }
            _ = terminate.recv() => Ok("terminate"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        Ok("interrupt")
    }
}
