//! Daemon command: config store, bridge, and controller wiring

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use designator::{Bridge, CancellationToken, ConfigStore, Controller, SystemClipboard};

use crate::cli::ServeArgs;

pub fn run(port: u16, args: ServeArgs) -> Result<()> {
    let _guard = crate::init_logging(args.log_file.as_deref())?;
    let rt = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    rt.block_on(serve(port))
}

async fn serve(port: u16) -> Result<()> {
    let config = Arc::new(ConfigStore::open_default());
    info!(path = %config.path().display(), "configuration loaded");

    let bridge = Bridge::bind(port).await?;
    let controller = Arc::new(Controller::new(
        Arc::clone(&config),
        bridge.host(),
        Arc::new(SystemClipboard),
    ));

    // Surface config edits in the daemon log as panels apply them.
    let mut changes = config.subscribe();
    tokio::spawn(async move {
        while let Ok(updated) = changes.recv().await {
            info!(
                attribute = %updated.attribute_name,
                tags = ?updated.allowed_tags,
                "configuration updated"
            );
        }
    });

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            trigger.cancel();
        }
    });

    bridge.run(controller, shutdown).await;
    Ok(())
}
