use std::sync::Arc;

use taximeter::clock::SystemClock;
use taximeter::config::AppConfig;
use taximeter::db::init_pool;
use taximeter::error::AppError;
use taximeter::routes::create_router;
use taximeter::services::{storage::SqliteTripRepository, taximeter::TaximeterService};
use taximeter::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    let repository = SqliteTripRepository::new(db);
    if let Err(err) = repository.migrate().await {
        error!("migration failed: {err:?}");
        return Err(err.into());
    }

    let taximeter = TaximeterService::new(Arc::new(SystemClock), Arc::new(repository))
        .with_default_rates(config.default_rates);

    let state = AppState::new(config.clone(), taximeter);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,taximeter=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
