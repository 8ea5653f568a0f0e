use std::fmt::Write as _;

use crate::bot::action::GroupAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::menus;
use crate::bot::screen::{Button, Screen};
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::groups::GroupDeletion;
use crate::schemas::inputs;

const NAME_TAKEN: &str = "❌ Группа с таким названием уже существует!";
const MOVE_UNAVAILABLE: &str = "🔁 Перемещение студентов в другую группу пока недоступно.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Manage,
    AwaitName,
    EditSelect,
    AwaitRename { group_id: i64 },
    DeleteSelect,
    DeleteConfirm { group_id: i64 },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Groups(step)
    }
}

pub(crate) async fn enter(ctx: &Ctx<'_>) -> BotResult<Transition> {
    if !ctx.role().await.can_manage() {
        return Ok(Transition::done(menus::access_denied()));
    }
    Ok(Transition::to(Step::Manage, manage_screen()))
}

fn manage_screen() -> Screen {
    Screen::new("📚 Управление группами\n\nВыберите действие:")
        .button("📚 Список групп", GroupAction::List)
        .button("➕ Добавить группу", GroupAction::Add)
        .button("✏️ Редактировать группу", GroupAction::Edit)
        .button("🗑️ Удалить группу", GroupAction::Delete)
        .back_to_main()
}

fn finished(text: String) -> Transition {
    Transition::done(
        Screen::new(text)
            .button("🔙 К управлению группами", GroupAction::Open)
            .main_menu_button(),
    )
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: GroupAction,
) -> BotResult<Transition> {
    match (step, action) {
        (Step::Manage, GroupAction::List) => list(ctx).await,
        (Step::Manage, GroupAction::Add) => Ok(Transition::to(
            Step::AwaitName,
            Screen::new("Введите название новой группы:").button("🔙 Отмена", GroupAction::Open),
        )),
        (Step::Manage, GroupAction::Edit) => {
            pick_group(ctx, Step::EditSelect, "✏️ Выберите группу для редактирования:", false).await
        }
        (Step::Manage, GroupAction::Delete) => {
            let title =
                "🗑️ Выберите группу для удаления:\n(в скобках указано количество студентов)";
            pick_group(ctx, Step::DeleteSelect, title, true).await
        }
        (Step::EditSelect, GroupAction::EditSelect(group_id)) => {
            let group = repositories::groups::find_by_id(ctx.pool, group_id)
                .await?
                .ok_or(BotError::NotFound("group"))?;
            Ok(Transition::to(
                Step::AwaitRename { group_id },
                Screen::new(format!(
                    "✏️ Редактирование группы:\n\nТекущее название: {}\n\n\
                     Введите новое название группы:",
                    group.name
                ))
                .button("🔙 Назад", GroupAction::Open),
            ))
        }
        (Step::DeleteSelect, GroupAction::DeleteSelect(group_id)) => {
            confirm_delete(ctx, group_id, None).await
        }
        (Step::DeleteConfirm { group_id }, GroupAction::ConfirmDelete(confirmed))
            if group_id == confirmed =>
        {
            delete_empty(ctx, group_id).await
        }
        (Step::DeleteConfirm { group_id }, GroupAction::ConfirmDeleteWithStudents(confirmed))
            if group_id == confirmed =>
        {
            delete_with_students(ctx, group_id).await
        }
        (Step::DeleteConfirm { group_id }, GroupAction::MoveStudents(confirmed))
            if group_id == confirmed =>
        {
            confirm_delete(ctx, group_id, Some(MOVE_UNAVAILABLE)).await
        }
        (Step::DeleteConfirm { .. }, GroupAction::CancelDelete) => {
            Ok(Transition::to(Step::Manage, manage_screen()))
        }
        (step, _) => Ok(Transition::stale(step)),
    }
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    match step {
        Step::AwaitName => create(ctx, text).await,
        Step::AwaitRename { group_id } => rename(ctx, group_id, text).await,
        step => Ok(Transition::use_buttons(step)),
    }
}

async fn list(ctx: &Ctx<'_>) -> BotResult<Transition> {
    let groups = repositories::groups::list_with_student_counts(ctx.pool).await?;

    let text = if groups.is_empty() {
        "📝 Группы не найдены".to_string()
    } else {
        let mut text = String::from("📚 Список всех групп:\n\n");
        for group in &groups {
            let _ = writeln!(text, "• {} - {} студент(ов)", group.name, group.student_count);
        }
        let _ = write!(text, "\nВсего групп: {}", groups.len());
        text
    };

    Ok(Transition::to(
        Step::Manage,
        Screen::new(text).button("🔙 Назад", GroupAction::Open).main_menu_button(),
    ))
}

async fn pick_group(
    ctx: &Ctx<'_>,
    next: Step,
    title: &str,
    for_deletion: bool,
) -> BotResult<Transition> {
    let groups = repositories::groups::list_with_student_counts(ctx.pool).await?;
    if groups.is_empty() {
        return Ok(Transition::to(
            Step::Manage,
            Screen::new("📝 Группы не найдены").button("🔙 Назад", GroupAction::Open),
        ));
    }

    let screen = groups
        .iter()
        .fold(Screen::new(title), |screen, group| {
            let button = if for_deletion {
                Button::new(
                    format!("{} ({} студентов)", group.name, group.student_count),
                    GroupAction::DeleteSelect(group.id).into(),
                )
            } else {
                Button::new(group.name.clone(), GroupAction::EditSelect(group.id).into())
            };
            screen.row(vec![button])
        })
        .button("🔙 Назад", GroupAction::Open);
    Ok(Transition::to(next, screen))
}

async fn create(ctx: &Ctx<'_>, text: &str) -> BotResult<Transition> {
    let retry = |message: String| {
        Transition::to(
            Step::AwaitName,
            Screen::new(format!("{message}\n\nВведите название новой группы:"))
                .button("🔙 Отмена", GroupAction::Open),
        )
    };

    let name = match inputs::group_name(text) {
        Ok(name) => name,
        Err(err) => return Ok(retry(format!("❌ {err}"))),
    };
    if repositories::groups::name_taken(ctx.pool, &name, None).await? {
        return Ok(retry(NAME_TAKEN.to_string()));
    }

    let group = match repositories::groups::create(ctx.pool, &name, primitive_now_utc()).await {
        Ok(group) => group,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Ok(retry(NAME_TAKEN.to_string()))
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(user_id = ctx.caller.id, group_id = group.id, "Group created");
    Ok(finished(format!("✅ Группа '{}' успешно добавлена!", group.name)))
}

async fn rename(ctx: &Ctx<'_>, group_id: i64, text: &str) -> BotResult<Transition> {
    let retry = |message: String| {
        Transition::to(
            Step::AwaitRename { group_id },
            Screen::new(format!("{message}\n\nВведите новое название группы:"))
                .button("🔙 Назад", GroupAction::Open),
        )
    };

    let name = match inputs::group_name(text) {
        Ok(name) => name,
        Err(err) => return Ok(retry(format!("❌ {err}"))),
    };
    if repositories::groups::name_taken(ctx.pool, &name, Some(group_id)).await? {
        return Ok(retry(NAME_TAKEN.to_string()));
    }

    let renamed = match repositories::groups::rename(ctx.pool, group_id, &name).await {
        Ok(renamed) => renamed,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Ok(retry(NAME_TAKEN.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    if !renamed {
        return Err(BotError::NotFound("group"));
    }

    tracing::info!(user_id = ctx.caller.id, group_id, "Group renamed");
    Ok(finished(format!("✅ Название группы успешно изменено на '{name}'!")))
}

/// Yes/no for an empty group, the three-way disposition otherwise.
async fn confirm_delete(
    ctx: &Ctx<'_>,
    group_id: i64,
    note: Option<&str>,
) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;
    let student_count = repositories::groups::count_students(ctx.pool, group_id).await?;

    let mut screen = if student_count > 0 {
        Screen::new(format!(
            "⚠️ В группе '{}' есть {student_count} студент(ов)!\n\nЧто вы хотите сделать?",
            group.name
        ))
        .button("✅ Удалить вместе со студентами", GroupAction::ConfirmDeleteWithStudents(group_id))
        .button("🔁 Переместить студентов в другую группу", GroupAction::MoveStudents(group_id))
        .button("❌ Отмена", GroupAction::CancelDelete)
    } else {
        Screen::new(format!("⚠️ Вы уверены, что хотите удалить группу '{}'?", group.name))
            .button("✅ Да, удалить", GroupAction::ConfirmDelete(group_id))
            .button("❌ Нет, отмена", GroupAction::CancelDelete)
    };
    if let Some(note) = note {
        screen.text = format!("{}\n\n{note}", screen.text);
    }

    Ok(Transition::to(Step::DeleteConfirm { group_id }, screen))
}

async fn delete_empty(ctx: &Ctx<'_>, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;

    match repositories::groups::delete_if_empty(ctx.pool, group_id).await? {
        GroupDeletion::Deleted { .. } => {
            tracing::info!(user_id = ctx.caller.id, group_id, "Group deleted");
            Ok(finished(format!("✅ Группа '{}' удалена!", group.name)))
        }
        // Someone enrolled a student since the prompt; ask again.
        GroupDeletion::HasStudents(_) => confirm_delete(ctx, group_id, None).await,
        GroupDeletion::NotFound => Err(BotError::NotFound("group")),
    }
}

async fn delete_with_students(ctx: &Ctx<'_>, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;

    match repositories::groups::delete_with_students(ctx.pool, group_id).await? {
        GroupDeletion::Deleted { students_removed } => {
            tracing::info!(
                user_id = ctx.caller.id,
                group_id,
                students_removed,
                "Group deleted with students"
            );
            Ok(finished(format!(
                "✅ Группа '{}' удалена вместе с {students_removed} студент(ами)!",
                group.name
            )))
        }
        GroupDeletion::HasStudents(_) | GroupDeletion::NotFound => Err(BotError::NotFound("group")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{press, screen, type_text, TestBot, ADMIN};
    use crate::test_support::{seed_group, seed_student};

    #[tokio::test]
    async fn duplicate_name_is_rejected_in_place() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        seed_group(&bot.pool, "CS-101").await?;

        press(&bot, ADMIN, GroupAction::Open).await;
        press(&bot, ADMIN, GroupAction::Add).await;
        let replies = type_text(&bot, ADMIN, "CS-101").await;

        assert!(screen(&replies).text.starts_with(NAME_TAKEN));
        assert_eq!(bot.engine.conversation(ADMIN).await, Some(Step::AwaitName.into()));
        assert_eq!(repositories::groups::list(&bot.pool).await?.len(), 1);

        let replies = type_text(&bot, ADMIN, "cs-101").await;
        assert_eq!(screen(&replies).text, "✅ Группа 'cs-101' успешно добавлена!");
        assert_eq!(repositories::groups::list(&bot.pool).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn rename_rejects_other_groups_name_but_allows_own() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let first = seed_group(&bot.pool, "CS-101").await?;
        seed_group(&bot.pool, "CS-102").await?;

        press(&bot, ADMIN, GroupAction::Open).await;
        press(&bot, ADMIN, GroupAction::Edit).await;
        press(&bot, ADMIN, GroupAction::EditSelect(first.id)).await;

        let replies = type_text(&bot, ADMIN, "CS-102").await;
        assert!(screen(&replies).text.starts_with(NAME_TAKEN));
        let unchanged =
            repositories::groups::find_by_id(&bot.pool, first.id).await?.expect("group");
        assert_eq!(unchanged.name, "CS-101");

        let replies = type_text(&bot, ADMIN, "CS-101").await;
        assert!(screen(&replies).text.contains("изменено на 'CS-101'"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_group_needs_plain_confirmation() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "Empty").await?;

        press(&bot, ADMIN, GroupAction::Open).await;
        press(&bot, ADMIN, GroupAction::Delete).await;
        let replies = press(&bot, ADMIN, GroupAction::DeleteSelect(group.id)).await;
        let shown = screen(&replies);
        assert!(shown.has(GroupAction::ConfirmDelete(group.id)));
        assert!(!shown.has(GroupAction::MoveStudents(group.id)));

        let replies = press(&bot, ADMIN, GroupAction::ConfirmDelete(group.id)).await;
        assert_eq!(screen(&replies).text, "✅ Группа 'Empty' удалена!");
        assert!(repositories::groups::find_by_id(&bot.pool, group.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn populated_group_offers_three_way_choice_and_ignores_bare_yes() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "CS-101").await?;
        seed_student(&bot.pool, "Alice", group.id, None).await?;

        press(&bot, ADMIN, GroupAction::Open).await;
        press(&bot, ADMIN, GroupAction::Delete).await;
        let replies = press(&bot, ADMIN, GroupAction::DeleteSelect(group.id)).await;
        let shown = screen(&replies);
        assert!(shown.has(GroupAction::ConfirmDeleteWithStudents(group.id)));
        assert!(shown.has(GroupAction::MoveStudents(group.id)));
        assert!(shown.has(GroupAction::CancelDelete));
        assert!(!shown.has(GroupAction::ConfirmDelete(group.id)));

        let replies = press(&bot, ADMIN, GroupAction::ConfirmDelete(group.id)).await;
        assert!(screen(&replies).has(GroupAction::ConfirmDeleteWithStudents(group.id)));
        assert!(repositories::groups::find_by_id(&bot.pool, group.id).await?.is_some());

        let replies = press(&bot, ADMIN, GroupAction::MoveStudents(group.id)).await;
        assert!(screen(&replies).text.ends_with(MOVE_UNAVAILABLE));
        assert_eq!(
            bot.engine.conversation(ADMIN).await,
            Some(Step::DeleteConfirm { group_id: group.id }.into())
        );

        let replies = press(&bot, ADMIN, GroupAction::ConfirmDeleteWithStudents(group.id)).await;
        assert!(screen(&replies).text.contains("удалена вместе с 1 студент(ами)"));
        assert!(repositories::groups::find_by_id(&bot.pool, group.id).await?.is_none());
        assert!(repositories::students::list_by_group(&bot.pool, group.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn list_shows_counts() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "CS-101").await?;
        seed_student(&bot.pool, "Alice", group.id, None).await?;
        seed_group(&bot.pool, "CS-102").await?;

        press(&bot, ADMIN, GroupAction::Open).await;
        let replies = press(&bot, ADMIN, GroupAction::List).await;

        let text = &screen(&replies).text;
        assert!(text.contains("• CS-101 - 1 студент(ов)\n• CS-102 - 0 студент(ов)"));
        assert!(text.ends_with("Всего групп: 2"));
        Ok(())
    }
}
