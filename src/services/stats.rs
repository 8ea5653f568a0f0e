use sqlx::SqlitePool;

use crate::repositories;
use crate::repositories::attendance::{RecentLesson, StatusCounts};

pub(crate) const RECENT_LESSONS_LIMIT: i64 = 10;

/// Share of attendance credit with late counted as half, rounded to one
/// decimal. `None` when there is nothing to divide by.
pub(crate) fn attendance_percent(present: i64, late: i64, total: i64) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    let credit = present as f64 + late as f64 * 0.5;
    Some(round1(credit / total as f64 * 100.0))
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone)]
pub(crate) struct StudentStats {
    pub(crate) full_name: String,
    pub(crate) group_name: String,
    /// Every lesson held for the student's group, marked or not.
    pub(crate) total: i64,
    pub(crate) counts: StatusCounts,
    pub(crate) recent: Vec<RecentLesson>,
}

impl StudentStats {
    pub(crate) fn percent(&self) -> f64 {
        attendance_percent(self.counts.present, self.counts.late, self.total).unwrap_or(0.0)
    }
}

/// Statistics for the student bound to `telegram_id`, or `None` when the
/// identity is not a registered student with a group.
pub(crate) async fn for_telegram_id(
    pool: &SqlitePool,
    telegram_id: i64,
) -> Result<Option<StudentStats>, sqlx::Error> {
    let Some(profile) =
        repositories::students::find_profile_by_telegram_id(pool, telegram_id).await?
    else {
        return Ok(None);
    };

    let total = repositories::attendance::count_group_lessons(pool, profile.group_id).await?;
    let counts =
        repositories::attendance::status_counts(pool, profile.id, profile.group_id).await?;
    let recent = repositories::attendance::recent_lessons(
        pool,
        profile.id,
        profile.group_id,
        RECENT_LESSONS_LIMIT,
    )
    .await?;

    Ok(Some(StudentStats {
        full_name: profile.full_name,
        group_name: profile.group_name,
        total,
        counts,
        recent,
    }))
}
