use sqlx::SqlitePool;

use crate::db::models::Admin;
use crate::db::types::StaffRole;

const COLUMNS: &str = "id, telegram_id, role, created_at";

pub(crate) async fn find_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as::<_, Admin>(&format!("SELECT {COLUMNS} FROM admins WHERE telegram_id = ?1"))
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn upsert(
    pool: &SqlitePool,
    telegram_id: i64,
    role: StaffRole,
    created_at: time::PrimitiveDateTime,
) -> Result<Admin, sqlx::Error> {
    sqlx::query_as::<_, Admin>(&format!(
        "INSERT INTO admins (telegram_id, role, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (telegram_id) DO UPDATE SET role = excluded.role
         RETURNING {COLUMNS}"
    ))
    .bind(telegram_id)
    .bind(role)
    .bind(created_at)
    .fetch_one(pool)
    .await
}
