use sqlx::{FromRow, SqlitePool};

/// A subject as offered to one group.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct OfferedSubject {
    pub(crate) group_subject_id: i64,
    pub(crate) subject_id: i64,
    pub(crate) name: String,
    pub(crate) lesson_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Offering {
    pub(crate) group_subject_id: i64,
    pub(crate) group_id: i64,
    pub(crate) group_name: String,
    pub(crate) subject_name: String,
    pub(crate) lesson_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttachOutcome {
    Attached { subject_id: i64, reused_subject: bool },
    AlreadyAttached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Detached {
    pub(crate) lessons_removed: u64,
}

#[cfg(test)]
pub(crate) async fn count_named(pool: &SqlitePool, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subjects WHERE name = ?1")
        .bind(name)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_for_group(
    pool: &SqlitePool,
    group_id: i64,
) -> Result<Vec<OfferedSubject>, sqlx::Error> {
    sqlx::query_as::<_, OfferedSubject>(
        "SELECT gs.id AS group_subject_id, sub.id AS subject_id, sub.name,
                COUNT(l.id) AS lesson_count
         FROM group_subjects gs
         JOIN subjects sub ON gs.subject_id = sub.id
         LEFT JOIN lessons l ON l.group_subject_id = gs.id
         WHERE gs.group_id = ?1
         GROUP BY gs.id, sub.id, sub.name
         ORDER BY sub.name",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
}

/// Resolves a `group_subjects` row together with the names shown on screens.
pub(crate) async fn find_offering(
    pool: &SqlitePool,
    group_subject_id: i64,
) -> Result<Option<Offering>, sqlx::Error> {
    sqlx::query_as::<_, Offering>(
        "SELECT gs.id AS group_subject_id, gs.group_id, g.name AS group_name,
                sub.name AS subject_name,
                (SELECT COUNT(*) FROM lessons l WHERE l.group_subject_id = gs.id) AS lesson_count
         FROM group_subjects gs
         JOIN groups g ON gs.group_id = g.id
         JOIN subjects sub ON gs.subject_id = sub.id
         WHERE gs.id = ?1",
    )
    .bind(group_subject_id)
    .fetch_optional(pool)
    .await
}

/// Offers the subject called `name` to the group, reusing an existing subject
/// row with the same name.
pub(crate) async fn attach_to_group(
    pool: &SqlitePool,
    group_id: i64,
    name: &str,
    created_at: time::PrimitiveDateTime,
) -> Result<AttachOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM subjects WHERE name = ?1 ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(&mut *tx)
    .await?;

    let (subject_id, reused_subject) = match existing {
        Some(id) => (id, true),
        None => {
            let id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO subjects (name, created_at) VALUES (?1, ?2) RETURNING id",
            )
            .bind(name)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?;
            (id, false)
        }
    };

    let inserted = sqlx::query(
        "INSERT INTO group_subjects (group_id, subject_id, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (group_id, subject_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(subject_id)
    .bind(created_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(AttachOutcome::AlreadyAttached);
    }

    tx.commit().await?;

    Ok(AttachOutcome::Attached { subject_id, reused_subject })
}

/// Withdraws a subject from a group along with its lessons and their
/// attendance. The subject row itself stays in the catalog.
pub(crate) async fn detach_from_group(
    pool: &SqlitePool,
    group_subject_id: i64,
) -> Result<Option<Detached>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM attendance
         WHERE lesson_id IN (SELECT id FROM lessons WHERE group_subject_id = ?1)",
    )
    .bind(group_subject_id)
    .execute(&mut *tx)
    .await?;

    let lessons_removed = sqlx::query("DELETE FROM lessons WHERE group_subject_id = ?1")
        .bind(group_subject_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let links = sqlx::query("DELETE FROM group_subjects WHERE id = ?1")
        .bind(group_subject_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if links == 0 {
        return Ok(None);
    }

    tx.commit().await?;

    Ok(Some(Detached { lessons_removed }))
}
