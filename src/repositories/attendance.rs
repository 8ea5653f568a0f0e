use std::collections::HashMap;

use sqlx::{FromRow, SqlitePool};
use time::Date;

use crate::db::types::AttendanceStatus;

/// One cell of the report: a student of the group against one lesson in range,
/// with the recorded status if any.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReportRow {
    pub(crate) group_name: String,
    pub(crate) student_id: i64,
    pub(crate) student_name: String,
    pub(crate) subject_name: String,
    pub(crate) lesson_id: i64,
    pub(crate) lesson_date: Date,
    pub(crate) status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct GroupActivity {
    pub(crate) group_id: i64,
    pub(crate) group_name: String,
    pub(crate) lesson_count: i64,
    pub(crate) student_count: i64,
    pub(crate) recorded: i64,
    pub(crate) present: i64,
    pub(crate) late: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecentLesson {
    pub(crate) lesson_date: Date,
    pub(crate) subject_name: String,
    pub(crate) status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StatusCounts {
    pub(crate) present: i64,
    pub(crate) absent: i64,
    pub(crate) late: i64,
}

/// Records `status` for the student at the lesson, replacing any earlier mark.
pub(crate) async fn upsert(
    pool: &SqlitePool,
    student_id: i64,
    lesson_id: i64,
    status: AttendanceStatus,
    marked_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance (student_id, lesson_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (student_id, lesson_id) DO UPDATE
         SET status = excluded.status,
             created_at = excluded.created_at",
    )
    .bind(student_id)
    .bind(lesson_id)
    .bind(status)
    .bind(marked_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn statuses_for_lesson(
    pool: &SqlitePool,
    lesson_id: i64,
) -> Result<HashMap<i64, AttendanceStatus>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, AttendanceStatus)>(
        "SELECT student_id, status FROM attendance WHERE lesson_id = ?1",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Every (lesson in `[start, end]`, student of the group) pair, ordered by
/// student name and then date.
pub(crate) async fn report_rows(
    pool: &SqlitePool,
    group_id: i64,
    start: Date,
    end: Date,
) -> Result<Vec<ReportRow>, sqlx::Error> {
    sqlx::query_as::<_, ReportRow>(
        "SELECT g.name AS group_name,
                s.id AS student_id,
                s.full_name AS student_name,
                sub.name AS subject_name,
                l.id AS lesson_id,
                l.date AS lesson_date,
                a.status AS status
         FROM lessons l
         JOIN group_subjects gs ON l.group_subject_id = gs.id
         JOIN groups g ON gs.group_id = g.id
         JOIN subjects sub ON gs.subject_id = sub.id
         JOIN students s ON s.group_id = g.id
         LEFT JOIN attendance a ON a.lesson_id = l.id AND a.student_id = s.id
         WHERE g.id = ?1 AND l.date BETWEEN ?2 AND ?3
         ORDER BY s.full_name, s.id, l.date, sub.name",
    )
    .bind(group_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Per-group activity between `start` and `end`, one row for every group.
pub(crate) async fn activity_by_group(
    pool: &SqlitePool,
    start: Date,
    end: Date,
) -> Result<Vec<GroupActivity>, sqlx::Error> {
    sqlx::query_as::<_, GroupActivity>(
        "SELECT g.id AS group_id,
                g.name AS group_name,
                COUNT(DISTINCT l.id) AS lesson_count,
                COUNT(DISTINCT s.id) AS student_count,
                COUNT(a.id) AS recorded,
                COALESCE(SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END), 0) AS present,
                COALESCE(SUM(CASE WHEN a.status = 'late' THEN 1 ELSE 0 END), 0) AS late
         FROM groups g
         LEFT JOIN students s ON s.group_id = g.id
         LEFT JOIN group_subjects gs ON gs.group_id = g.id
         LEFT JOIN lessons l ON l.group_subject_id = gs.id AND l.date BETWEEN ?1 AND ?2
         LEFT JOIN attendance a ON a.lesson_id = l.id AND a.student_id = s.id
         GROUP BY g.id, g.name
         ORDER BY g.name",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_group_lessons(
    pool: &SqlitePool,
    group_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM lessons l
         JOIN group_subjects gs ON l.group_subject_id = gs.id
         WHERE gs.group_id = ?1",
    )
    .bind(group_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn status_counts(
    pool: &SqlitePool,
    student_id: i64,
    group_id: i64,
) -> Result<StatusCounts, sqlx::Error> {
    let rows = sqlx::query_as::<_, (AttendanceStatus, i64)>(
        "SELECT a.status, COUNT(*)
         FROM attendance a
         JOIN lessons l ON a.lesson_id = l.id
         JOIN group_subjects gs ON l.group_subject_id = gs.id
         WHERE a.student_id = ?1 AND gs.group_id = ?2
         GROUP BY a.status",
    )
    .bind(student_id)
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match status {
            AttendanceStatus::Present => counts.present = count,
            AttendanceStatus::Absent => counts.absent = count,
            AttendanceStatus::Late => counts.late = count,
        }
    }
    Ok(counts)
}

pub(crate) async fn recent_lessons(
    pool: &SqlitePool,
    student_id: i64,
    group_id: i64,
    limit: i64,
) -> Result<Vec<RecentLesson>, sqlx::Error> {
    sqlx::query_as::<_, RecentLesson>(
        "SELECT l.date AS lesson_date, sub.name AS subject_name, a.status AS status
         FROM lessons l
         JOIN group_subjects gs ON l.group_subject_id = gs.id
         JOIN subjects sub ON gs.subject_id = sub.id
         LEFT JOIN attendance a ON a.lesson_id = l.id AND a.student_id = ?1
         WHERE gs.group_id = ?2
         ORDER BY l.date DESC, l.id DESC
         LIMIT ?3",
    )
    .bind(student_id)
    .bind(group_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::repositories::{groups, lessons, students, subjects};
    use crate::test_support::test_pool;
    use time::macros::date;

    #[tokio::test]
    async fn repeated_taps_keep_one_row_with_latest_status() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let now = primitive_now_utc();
        let group = groups::create(&pool, "CS-101", now).await?;
        let alice = students::create(&pool, "Alice", Some(group.id), None, now).await?;
        subjects::attach_to_group(&pool, group.id, "Algebra", now).await?;
        let link = subjects::list_for_group(&pool, group.id).await?[0].group_subject_id;
        let lesson = lessons::find_or_create(&pool, link, date!(2024 - 01 - 15), now).await?;

        upsert(&pool, alice.id, lesson.id, AttendanceStatus::Present, now).await?;
        upsert(&pool, alice.id, lesson.id, AttendanceStatus::Present, now).await?;
        assert_eq!(statuses_for_lesson(&pool, lesson.id).await?.len(), 1);

        upsert(&pool, alice.id, lesson.id, AttendanceStatus::Absent, now).await?;
        let statuses = statuses_for_lesson(&pool, lesson.id).await?;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses.get(&alice.id), Some(&AttendanceStatus::Absent));
        Ok(())
    }

    #[tokio::test]
    async fn report_rows_include_unmarked_students_within_range() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let now = primitive_now_utc();
        let group = groups::create(&pool, "CS-101", now).await?;
        let alice = students::create(&pool, "Alice", Some(group.id), None, now).await?;
        students::create(&pool, "Bob", Some(group.id), None, now).await?;
        subjects::attach_to_group(&pool, group.id, "Algebra", now).await?;
        let link = subjects::list_for_group(&pool, group.id).await?[0].group_subject_id;
        let inside = lessons::find_or_create(&pool, link, date!(2024 - 01 - 15), now).await?;
        lessons::find_or_create(&pool, link, date!(2024 - 02 - 01), now).await?;
        upsert(&pool, alice.id, inside.id, AttendanceStatus::Late, now).await?;

        let january = (date!(2024 - 01 - 01), date!(2024 - 01 - 31));
        let rows = report_rows(&pool, group.id, january.0, january.1).await?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_name, "Alice");
        assert_eq!(rows[0].status, Some(AttendanceStatus::Late));
        assert_eq!(rows[1].student_name, "Bob");
        assert_eq!(rows[1].status, None);
        Ok(())
    }

    #[tokio::test]
    async fn activity_by_group_lists_idle_groups() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        groups::create(&pool, "Empty", primitive_now_utc()).await?;

        let activity =
            activity_by_group(&pool, date!(2024 - 01 - 01), date!(2024 - 01 - 31)).await?;

        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].lesson_count, 0);
        assert_eq!(activity[0].recorded, 0);
        Ok(())
    }
}
