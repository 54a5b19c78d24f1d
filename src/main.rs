use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use beckn_bap::config::AppConfig;
use beckn_bap::db;
use beckn_bap::handlers;
use beckn_bap::services::bpp::http::HttpBppClient;
use beckn_bap::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let bpp = HttpBppClient::new(config.bpp_timeout())?;

    tracing::info!(
        bap_id = %config.bap_id,
        flights = %config.bpp_urls.flights,
        hotels = %config.bpp_urls.hotels,
        timeout_secs = config.bpp_timeout_secs,
        "BPP routing configured"
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        bpp: Box::new(bpp),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
