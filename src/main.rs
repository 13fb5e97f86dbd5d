use anyhow::Result;
use clap::Parser;
use eth_tracker::auth::AuthClient;
use eth_tracker::config::{Cli, Config};
use eth_tracker::cursor::CursorStore;
use eth_tracker::notify::StdoutSink;
use eth_tracker::stream::WsBlockSource;
use eth_tracker::tracker::{RetryPolicy, Tracker};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    info!("Configuration loaded");
    info!("Tracking {} address(es)", config.addresses.len());

    let auth = AuthClient::new(&config.auth_endpoint, &config.api_key, config.skip_tls_verify)?;
    let source = WsBlockSource::new(&config.endpoint, auth, config.skip_tls_verify);
    let cursor_store = CursorStore::new(config.cursor_file.clone());

    let mut tracker = Tracker::new(
        source,
        StdoutSink,
        cursor_store,
        &config.addresses,
        config.start_block,
        config.status_interval,
        RetryPolicy::default(),
    );

    if let Err(e) = tracker.run().await {
        error!("Tracker error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
