use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::config::Settings;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: SqlitePool,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: SqlitePool) -> Self {
        Self { inner: Arc::new(InnerState { settings, db }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.inner.db
    }
}
