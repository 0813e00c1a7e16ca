//! photobox hub - WebSocket server for the photo station
//!
//! Accepts kiosk clients, runs capture/list/print actions against the
//! camera, image store and printer, and broadcasts every outcome and
//! hardware button press to all connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Serve images from the default directory
//! photoboxd
//!
//! # Serve a specific image directory on another port
//! photoboxd /srv/photos --listen 0.0.0.0:9000
//!
//! # Use an explicit config file
//! photoboxd --config /etc/photobox.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use photoboxd::config::Config;
use photoboxd::device::DeviceOperations;
use photoboxd::server::Hub;

/// photobox hub - camera, printer and buttons over WebSocket
#[derive(Parser, Debug)]
#[command(name = "photoboxd", version, about)]
struct Args {
    /// Image directory (overrides the config file)
    image_dir: Option<PathBuf>,

    /// Config file [default: <config_dir>/photobox/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:6789
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("photoboxd=info".parse()?)
                .add_directive("photobox_core=info".parse()?)
                .add_directive("photobox_protocol=info".parse()?),
        )
        .init();

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(image_dir) = args.image_dir {
        config.image_dir = image_dir;
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        image_dir = %config.image_dir.display(),
        "photobox hub starting"
    );

    std::fs::create_dir_all(&config.image_dir).with_context(|| {
        format!(
            "Failed to create image directory {}",
            config.image_dir.display()
        )
    })?;

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let devices = DeviceOperations::from_config(&config);
    let hub = Hub::bind(config.listen, devices, cancel_token)
        .await
        .context("Failed to start hub")?
        .with_poll_interval(config.poll_interval());

    // Keeps the pin interrupts registered while the hub runs.
    #[cfg(feature = "gpio")]
    let _buttons = match photoboxd::interrupt::GpioButtons::register(&config.gpio, &hub.interrupts())
    {
        Ok(buttons) => Some(buttons),
        Err(e) => {
            error!(error = %e, "GPIO unavailable, running without buttons");
            None
        }
    };

    if let Err(e) = hub.run().await {
        error!(error = %e, "Hub error");
        return Err(e.into());
    }

    info!("photobox hub stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
