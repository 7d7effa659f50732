//! Donation Gateway: entry point.
//!
//! Serves the embedded-form redirect endpoints and receives PayPal IPN
//! notifications, reconciling them against donations stored in SQLite.

mod api;
mod config;
mod db;
mod embed;
mod errors;
mod ipn;
mod reconciler;
mod themes;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use ipn::PayPalVerifier;
use reconciler::{IpnRefundProcessor, Reconciler};
use themes::ThemeRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let themes = ThemeRegistry::load(config.themes_file.as_deref())?;

    // Outbound client for IPN postbacks.
    let client = Client::builder()
        .timeout(Duration::from_secs(config.ipn_timeout_secs))
        .build()?;
    let verifier = Arc::new(PayPalVerifier::new(client, config.paypal_ipn_url.clone()));
    info!("Verifying IPN messages against {}", config.paypal_ipn_url);

    let refunds = Arc::new(IpnRefundProcessor::new(pool.clone()));
    let state = Arc::new(api::ApiState {
        reconciler: Reconciler::new(pool.clone(), refunds),
        pool,
        site: config.site.clone(),
        themes,
        verifier,
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
