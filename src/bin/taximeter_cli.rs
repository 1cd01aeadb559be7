use std::sync::Arc;

use taximeter::cli;
use taximeter::clock::SystemClock;
use taximeter::config::AppConfig;
use taximeter::db::init_pool;
use taximeter::error::AppError;
use taximeter::services::{storage::SqliteTripRepository, taximeter::TaximeterService};
use tokio::io::{stdin, stdout, BufReader};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;
    let repository = SqliteTripRepository::new(db);
    repository.migrate().await?;

    let taximeter = TaximeterService::new(Arc::new(SystemClock), Arc::new(repository))
        .with_default_rates(config.default_rates);

    cli::run(&taximeter, &config.users, BufReader::new(stdin()), stdout()).await
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Log to stderr so the prompt on stdout stays readable.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,taximeter=info".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
