pub(crate) mod bot;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let state = AppState::new(settings, db_pool);

    if let Err(err) = core::bootstrap::ensure_staff(&state).await {
        tracing::error!(error = %err, "Failed to provision bootstrap staff");
    }

    tracing::info!(
        environment = %state.settings().runtime().environment.as_str(),
        database = %state.settings().database().database_url,
        "UniHelper bot starting"
    );

    let result = services::telegram_bot::run(state.clone()).await;

    if let Some(snapshot) = core::metrics::render() {
        tracing::info!(metrics = %snapshot, "Final metrics snapshot");
    }
    state.db().close().await;
    tracing::info!("Database pool closed");

    result
}
