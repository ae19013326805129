//! Forward one log pipeline chunk, read from stdin, to Mixpanel.
//!
//! Exits with an error when the chunk has to be retried.
use anyhow::{Context, Error};
use mixpanel_forwarder::{client::MixpanelTrackerFactory, config::Config, pipeline::Pipeline};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_tracing();

    let config = Config::load().context("Invalid configuration")?;
    let factory =
        MixpanelTrackerFactory::new(&config).context("failed to construct mixpanel client")?;
    let pipeline = Pipeline::new(&config, factory);

    let mut chunk = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut chunk)
        .await
        .context("failed to read chunk from stdin")?;

    info!("read chunk of {} bytes", chunk.len());

    pipeline.process_chunk(&chunk).await?;

    Ok(())
}
