use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::StaffRole;
use crate::repositories;

/// Provisions the identities listed in `BOOTSTRAP_*_IDS` into `admins`.
/// Existing rows keep their id and get the configured role.
pub(crate) async fn ensure_staff(state: &AppState) -> anyhow::Result<()> {
    let bootstrap = state.settings().bootstrap();
    if bootstrap.admin_ids.is_empty() && bootstrap.headman_ids.is_empty() {
        tracing::warn!("BOOTSTRAP_ADMIN_IDS not configured; skipping staff provisioning");
        return Ok(());
    }

    let assignments = bootstrap
        .headman_ids
        .iter()
        .map(|id| (*id, StaffRole::Headman))
        .chain(bootstrap.admin_ids.iter().map(|id| (*id, StaffRole::Admin)));

    for (telegram_id, role) in assignments {
        repositories::admins::upsert(state.db(), telegram_id, role, primitive_now_utc()).await?;
        tracing::info!(telegram_id, role = role.as_str(), "Provisioned staff member");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn admin_list_wins_over_headman_list() -> anyhow::Result<()> {
        let state = test_state().await?;
        let mut settings = state.settings().clone();
        settings.bootstrap_mut().admin_ids = vec![7];
        settings.bootstrap_mut().headman_ids = vec![7, 8];
        let state = AppState::new(settings, state.db().clone());

        ensure_staff(&state).await?;

        let seven = repositories::admins::find_by_telegram_id(state.db(), 7).await?;
        let eight = repositories::admins::find_by_telegram_id(state.db(), 8).await?;
        assert_eq!(seven.map(|admin| admin.role), Some(StaffRole::Admin));
        assert_eq!(eight.map(|admin| admin.role), Some(StaffRole::Headman));
        Ok(())
    }
}
