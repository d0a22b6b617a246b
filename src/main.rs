//! insights-gateway server: renews the bearer credential in the background and serves the
//! insights query API.

// crates.io
use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;
// self
use insights_gateway::{config::Cli, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let cli = Cli::parse();
	let (gateway, manager) = cli.build()?;
	let renewal = manager.spawn_renewal(cli.renewal_schedule())?;
	let listener = tokio::net::TcpListener::bind(cli.listen).await?;

	tracing::info!(
		addr = %cli.listen,
		exchange_grant = %cli.exchange_grant,
		cache_ttl_secs = cli.cache_ttl_secs,
		rate_limit = cli.rate_limit,
		"insights gateway listening"
	);

	server::serve(listener, gateway, shutdown_signal()).await?;
	renewal.shutdown();
	tracing::info!("insights gateway stopped");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}
}
