use sqlx::SqlitePool;
use time::Date;

use crate::db::models::Lesson;

const COLUMNS: &str = "id, group_subject_id, date, topic, created_at";

/// Returns the lesson of `group_subject_id` held on `date`, creating it on
/// first use. Concurrent callers converge on one row through the
/// `(group_subject_id, date)` unique key.
pub(crate) async fn find_or_create(
    pool: &SqlitePool,
    group_subject_id: i64,
    date: Date,
    created_at: time::PrimitiveDateTime,
) -> Result<Lesson, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO lessons (group_subject_id, date, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (group_subject_id, date) DO NOTHING",
    )
    .bind(group_subject_id)
    .bind(date)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {COLUMNS} FROM lessons WHERE group_subject_id = ?1 AND date = ?2"
    ))
    .bind(group_subject_id)
    .bind(date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(lesson)
}

pub(crate) async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(&format!("SELECT {COLUMNS} FROM lessons WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}
