use anyhow::{Context, Result};
use clap::Parser;
use quill_api::logging;
use quill_api::settings::Settings;
use quill_hyper::{Serve, ServeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    logging::init(&settings)?;

    let addr = settings.addr()?;

    let mut lifespan = quill_api::lifespan(&settings);
    let state = lifespan.startup().await?;

    let app = quill_api::app(&settings)?.state(state);

    tracing::info!(
        service = %settings.api_name,
        version = %settings.api_version,
        url = %settings.api_url(),
        "starting"
    );

    let served = match app.bind(addr, ServeConfig::new()) {
        Ok(server) => server
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error"),
        Err(err) => Err(err).context("failed to bind"),
    };

    lifespan.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received");
}
