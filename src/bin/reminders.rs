use std::{sync::Arc, time::Duration};

use tokio::signal;
use tracing_subscriber::EnvFilter;

use complyhub::{
    auth::jwt::JwtService, config::AppConfig, db, embeddings, notify, s3::build_client,
    state::AppState, storage::S3Storage, sweep,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "reminders",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        sweep_interval_seconds = config.sweep_interval_seconds,
        notifications_enabled = config.notify_endpoint.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let jwt = JwtService::from_config(&config)?;
    let embedder = embeddings::provider_from_config(&config);
    let notifier = notify::notifier_from_config(&config);

    let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));
    let state = AppState::new(pool, config, storage, jwt, embedder, notifier);

    tokio::select! {
        _ = run_loop(state, interval) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("reminder worker received shutdown signal");
        }
    }

    Ok(())
}

async fn run_loop(state: AppState, interval: Duration) {
    tracing::info!("reminder worker started");
    loop {
        if let Err(err) = sweep::run_sweep(&state).await {
            tracing::error!(error = %err, "compliance sweep failed");
        }
        tokio::time::sleep(interval).await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
