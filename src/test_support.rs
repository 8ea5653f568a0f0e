use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Group, Student};
use crate::db::types::StaffRole;
use crate::repositories;

const TEST_DATABASE_URL: &str = "sqlite::memory:";

/// Serialises tests that touch process environment variables.
pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

/// Fresh in-memory database with the schema applied. A single connection that
/// never expires keeps the database alive for the whole test.
pub(crate) async fn test_pool() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(TEST_DATABASE_URL)?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    crate::db::run_migrations(&pool).await?;
    Ok(pool)
}

pub(crate) async fn test_state() -> anyhow::Result<AppState> {
    let pool = test_pool().await?;
    Ok(AppState::new(Settings::for_tests(TEST_DATABASE_URL), pool))
}

pub(crate) async fn seed_admin(pool: &SqlitePool, telegram_id: i64) -> anyhow::Result<()> {
    repositories::admins::upsert(pool, telegram_id, StaffRole::Admin, primitive_now_utc()).await?;
    Ok(())
}

pub(crate) async fn seed_group(pool: &SqlitePool, name: &str) -> anyhow::Result<Group> {
    Ok(repositories::groups::create(pool, name, primitive_now_utc()).await?)
}

pub(crate) async fn seed_student(
    pool: &SqlitePool,
    full_name: &str,
    group_id: i64,
    telegram_id: Option<i64>,
) -> anyhow::Result<Student> {
    let student = repositories::students::create(
        pool,
        full_name,
        Some(group_id),
        telegram_id,
        primitive_now_utc(),
    )
    .await?;
    Ok(student)
}

/// Offers `subject` to the group and returns the `group_subjects` id.
pub(crate) async fn seed_subject(
    pool: &SqlitePool,
    group_id: i64,
    subject: &str,
) -> anyhow::Result<i64> {
    repositories::subjects::attach_to_group(pool, group_id, subject, primitive_now_utc()).await?;
    let offered = repositories::subjects::list_for_group(pool, group_id).await?;
    offered
        .into_iter()
        .find(|item| item.name == subject)
        .map(|item| item.group_subject_id)
        .ok_or_else(|| anyhow::anyhow!("subject {subject} was not attached"))
}
