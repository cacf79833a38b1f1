mod accrual;
mod api;
mod auth;
mod bootstrap;
mod config;
mod error;
mod ledger;
mod reconciliation;
mod server;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG from it is honoured
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting loyalty points ledger");

    // Load configuration
    let config = config::Config::load()?;

    let (state, scheduler) = bootstrap::initialize_app_state(&config).await?;
    let reconciliation = scheduler.start();

    // Create HTTP server
    let app = server::create_app(state).await;

    // Run the Server
    let result = server::run_server(app, &config.run_address).await;

    reconciliation.abort();
    info!("⏹️ Reconciliation scheduler stopped");

    result
}
