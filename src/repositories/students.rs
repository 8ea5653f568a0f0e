use sqlx::{FromRow, SqlitePool};

use crate::db::models::Student;

const COLUMNS: &str = "id, full_name, group_id, telegram_id, created_at";

/// Row of the roster screen: one student with the name of their group.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct StudentListing {
    pub(crate) id: i64,
    pub(crate) full_name: String,
    pub(crate) group_name: Option<String>,
    pub(crate) telegram_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct StudentProfile {
    pub(crate) id: i64,
    pub(crate) full_name: String,
    pub(crate) group_id: i64,
    pub(crate) group_name: String,
}

pub(crate) async fn list_with_groups(
    pool: &SqlitePool,
) -> Result<Vec<StudentListing>, sqlx::Error> {
    sqlx::query_as::<_, StudentListing>(
        "SELECT s.id, s.full_name, g.name AS group_name, s.telegram_id
         FROM students s
         LEFT JOIN groups g ON s.group_id = g.id
         ORDER BY g.name IS NULL, g.name, s.full_name",
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_group(
    pool: &SqlitePool,
    group_id: i64,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {COLUMNS} FROM students WHERE group_id = ?1 ORDER BY full_name, id"
    ))
    .bind(group_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("SELECT {COLUMNS} FROM students WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("SELECT {COLUMNS} FROM students WHERE telegram_id = ?1"))
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
}

/// Registered student together with their group; `None` for unbound identities
/// and for students that have no group yet.
pub(crate) async fn find_profile_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<StudentProfile>, sqlx::Error> {
    sqlx::query_as::<_, StudentProfile>(
        "SELECT s.id, s.full_name, g.id AS group_id, g.name AS group_name
         FROM students s
         JOIN groups g ON s.group_id = g.id
         WHERE s.telegram_id = ?1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn create(
    pool: &SqlitePool,
    full_name: &str,
    group_id: Option<i64>,
    telegram_id: Option<i64>,
    created_at: time::PrimitiveDateTime,
) -> Result<Student, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "INSERT INTO students (full_name, group_id, telegram_id, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING {COLUMNS}"
    ))
    .bind(full_name)
    .bind(group_id)
    .bind(telegram_id)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

/// Removes the student and their attendance rows. Returns `false` when the id
/// no longer exists.
pub(crate) async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attendance WHERE student_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let removed = sqlx::query("DELETE FROM students WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::repositories::groups;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn telegram_id_is_unique() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = groups::create(&pool, "CS-101", primitive_now_utc()).await?;
        create(&pool, "Alice", Some(group.id), Some(5), primitive_now_utc()).await?;

        let err = create(&pool, "Alice again", Some(group.id), Some(5), primitive_now_utc())
            .await
            .unwrap_err();
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unbound_students_may_share_null_identity() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        create(&pool, "Alice", None, None, primitive_now_utc()).await?;
        create(&pool, "Bob", None, None, primitive_now_utc()).await?;

        let listing = list_with_groups(&pool).await?;
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|row| row.group_name.is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let student = create(&pool, "Alice", None, None, primitive_now_utc()).await?;

        assert!(delete(&pool, student.id).await?);
        assert!(!delete(&pool, student.id).await?);
        Ok(())
    }
}
