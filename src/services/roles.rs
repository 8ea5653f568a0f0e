use sqlx::SqlitePool;

use crate::db::types::StaffRole;
use crate::repositories;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Admin,
    Headman,
    Student,
    Guest,
}

impl Role {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Headman => "headman",
            Self::Student => "student",
            Self::Guest => "guest",
        }
    }

    /// Staff see the management menu.
    pub(crate) fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Headman)
    }

    /// Only admins may enter the management workflows.
    pub(crate) fn can_manage(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<StaffRole> for Role {
    fn from(value: StaffRole) -> Self {
        match value {
            StaffRole::Admin => Self::Admin,
            StaffRole::Headman => Self::Headman,
        }
    }
}

/// Maps a chat identity to its role: staff table first, then bound students,
/// otherwise guest. Lookup failures degrade to guest.
pub(crate) async fn resolve(pool: &SqlitePool, telegram_id: i64) -> Role {
    match lookup(pool, telegram_id).await {
        Ok(role) => role,
        Err(error) => {
            tracing::error!(error = %error, telegram_id, "Failed to resolve caller role");
            Role::Guest
        }
    }
}

async fn lookup(pool: &SqlitePool, telegram_id: i64) -> Result<Role, sqlx::Error> {
    if let Some(admin) = repositories::admins::find_by_telegram_id(pool, telegram_id).await? {
        return Ok(admin.role.into());
    }

    if repositories::students::find_by_telegram_id(pool, telegram_id).await?.is_some() {
        return Ok(Role::Student);
    }

    Ok(Role::Guest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::test_support::{seed_group, seed_student, test_pool};

    #[tokio::test]
    async fn resolves_each_role() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        repositories::admins::upsert(&pool, 1, StaffRole::Admin, primitive_now_utc()).await?;
        repositories::admins::upsert(&pool, 2, StaffRole::Headman, primitive_now_utc()).await?;
        let group = seed_group(&pool, "CS-101").await?;
        seed_student(&pool, "Alice", group.id, Some(3)).await?;

        assert_eq!(resolve(&pool, 1).await, Role::Admin);
        assert_eq!(resolve(&pool, 2).await, Role::Headman);
        assert_eq!(resolve(&pool, 3).await, Role::Student);
        assert_eq!(resolve(&pool, 4).await, Role::Guest);
        Ok(())
    }

    #[tokio::test]
    async fn staff_entry_wins_over_student_binding() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = seed_group(&pool, "CS-101").await?;
        seed_student(&pool, "Alice", group.id, Some(9)).await?;
        repositories::admins::upsert(&pool, 9, StaffRole::Headman, primitive_now_utc()).await?;

        assert_eq!(resolve(&pool, 9).await, Role::Headman);
        Ok(())
    }

    #[tokio::test]
    async fn storage_failure_falls_back_to_guest() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        pool.close().await;

        assert_eq!(resolve(&pool, 1).await, Role::Guest);
        Ok(())
    }

    #[test]
    fn only_admin_can_manage() {
        assert!(Role::Admin.can_manage());
        assert!(!Role::Headman.can_manage());
        assert!(Role::Headman.is_staff());
        assert!(!Role::Student.is_staff());
    }
}
