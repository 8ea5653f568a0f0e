use sqlx::{FromRow, SqlitePool};

use crate::db::models::Group;

const COLUMNS: &str = "id, name, created_at";

#[derive(Debug, Clone, FromRow)]
pub(crate) struct GroupSummary {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) student_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupDeletion {
    Deleted { students_removed: u64 },
    HasStudents(i64),
    NotFound,
}

pub(crate) async fn list(pool: &SqlitePool) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {COLUMNS} FROM groups ORDER BY name"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_with_student_counts(
    pool: &SqlitePool,
) -> Result<Vec<GroupSummary>, sqlx::Error> {
    sqlx::query_as::<_, GroupSummary>(
        "SELECT g.id, g.name, COUNT(s.id) AS student_count
         FROM groups g
         LEFT JOIN students s ON s.group_id = g.id
         GROUP BY g.id, g.name
         ORDER BY g.name",
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!("SELECT {COLUMNS} FROM groups WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Case-sensitive check; `except_id` lets a group keep its own name on rename.
pub(crate) async fn name_taken(
    pool: &SqlitePool,
    name: &str,
    except_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM groups WHERE name = ?1 AND (?2 IS NULL OR id <> ?2) LIMIT 1",
    )
    .bind(name)
    .bind(except_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

pub(crate) async fn create(
    pool: &SqlitePool,
    name: &str,
    created_at: time::PrimitiveDateTime,
) -> Result<Group, sqlx::Error> {
    sqlx::query_as::<_, Group>(&format!(
        "INSERT INTO groups (name, created_at) VALUES (?1, ?2) RETURNING {COLUMNS}"
    ))
    .bind(name)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE groups SET name = ?1 WHERE id = ?2")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn count_students(pool: &SqlitePool, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE group_id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Deletes the group only when nobody is enrolled; the count is re-read inside
/// the transaction so a stale confirmation cannot remove students.
pub(crate) async fn delete_if_empty(
    pool: &SqlitePool,
    id: i64,
) -> Result<GroupDeletion, sqlx::Error> {
    delete_group(pool, id, false).await
}

pub(crate) async fn delete_with_students(
    pool: &SqlitePool,
    id: i64,
) -> Result<GroupDeletion, sqlx::Error> {
    delete_group(pool, id, true).await
}

async fn delete_group(
    pool: &SqlitePool,
    id: i64,
    include_students: bool,
) -> Result<GroupDeletion, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM groups WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(GroupDeletion::NotFound);
    }

    let students = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE group_id = ?1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if students > 0 && !include_students {
        return Ok(GroupDeletion::HasStudents(students));
    }

    sqlx::query(
        "DELETE FROM attendance
         WHERE lesson_id IN (
             SELECT l.id FROM lessons l
             JOIN group_subjects gs ON l.group_subject_id = gs.id
             WHERE gs.group_id = ?1
         )
         OR student_id IN (SELECT id FROM students WHERE group_id = ?1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM lessons
         WHERE group_subject_id IN (SELECT id FROM group_subjects WHERE group_id = ?1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM group_subjects WHERE group_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let removed = sqlx::query("DELETE FROM students WHERE group_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM groups WHERE id = ?1").bind(id).execute(&mut *tx).await?;

    tx.commit().await?;

    Ok(GroupDeletion::Deleted { students_removed: removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::repositories::students;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn name_taken_ignores_own_row_and_is_case_sensitive() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = create(&pool, "CS-101", primitive_now_utc()).await?;

        assert!(name_taken(&pool, "CS-101", None).await?);
        assert!(!name_taken(&pool, "CS-101", Some(group.id)).await?);
        assert!(!name_taken(&pool, "cs-101", None).await?);
        Ok(())
    }

    #[tokio::test]
    async fn delete_if_empty_refuses_populated_group() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = create(&pool, "CS-101", primitive_now_utc()).await?;
        students::create(&pool, "Alice", Some(group.id), None, primitive_now_utc()).await?;

        assert_eq!(delete_if_empty(&pool, group.id).await?, GroupDeletion::HasStudents(1));
        assert!(find_by_id(&pool, group.id).await?.is_some());

        assert_eq!(
            delete_with_students(&pool, group.id).await?,
            GroupDeletion::Deleted { students_removed: 1 }
        );
        assert!(find_by_id(&pool, group.id).await?.is_none());
        assert_eq!(delete_if_empty(&pool, group.id).await?, GroupDeletion::NotFound);
        Ok(())
    }
}
