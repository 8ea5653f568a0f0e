use std::fmt::Write as _;

use super::group_buttons;
use crate::bot::action::SubjectAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::menus;
use crate::bot::screen::{Button, Screen};
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::subjects::AttachOutcome;
use crate::schemas::inputs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Manage,
    ListSelectGroup,
    AddSelectGroup,
    AwaitName { group_id: i64, group_name: String },
    DeleteSelectGroup,
    DeleteSelectSubject { group_id: i64 },
    DeleteConfirm { group_subject_id: i64 },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Subjects(step)
    }
}

pub(crate) async fn enter(ctx: &Ctx<'_>) -> BotResult<Transition> {
    if !ctx.role().await.can_manage() {
        return Ok(Transition::done(menus::access_denied()));
    }
    Ok(Transition::to(Step::Manage, manage_screen()))
}

fn manage_screen() -> Screen {
    Screen::new("📖 Управление предметами\n\nВыберите действие:")
        .button("📖 Список предметов", SubjectAction::List)
        .button("➕ Добавить предмет", SubjectAction::Add)
        .button("🗑️ Удалить предмет", SubjectAction::Delete)
        .back_to_main()
}

fn finished(text: String) -> Transition {
    Transition::done(
        Screen::new(text)
            .button("🔙 К управлению предметами", SubjectAction::Open)
            .main_menu_button(),
    )
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: SubjectAction,
) -> BotResult<Transition> {
    match (step, action) {
        (Step::Manage, SubjectAction::List) => {
            pick_group(ctx, Step::ListSelectGroup, "📖 Выберите группу:", SubjectAction::ListGroup)
                .await
        }
        (Step::Manage, SubjectAction::Add) => {
            let title = "➕ Выберите группу для добавления предмета:";
            pick_group(ctx, Step::AddSelectGroup, title, SubjectAction::AddToGroup).await
        }
        (Step::Manage, SubjectAction::Delete) => {
            let title = "🗑️ Выберите группу для удаления предмета:";
            pick_group(ctx, Step::DeleteSelectGroup, title, SubjectAction::DeleteFromGroup).await
        }
        (Step::ListSelectGroup, SubjectAction::ListGroup(group_id)) => list(ctx, group_id).await,
        (Step::AddSelectGroup, SubjectAction::AddToGroup(group_id)) => {
            let group = repositories::groups::find_by_id(ctx.pool, group_id)
                .await?
                .ok_or(BotError::NotFound("group"))?;
            Ok(ask_name(group.id, group.name, None))
        }
        (Step::DeleteSelectGroup, SubjectAction::DeleteFromGroup(group_id)) => {
            pick_subject(ctx, group_id).await
        }
        (Step::DeleteSelectSubject { group_id }, SubjectAction::DeleteSelect(group_subject_id)) => {
            confirm_delete(ctx, group_id, group_subject_id).await
        }
        (Step::DeleteConfirm { group_subject_id }, SubjectAction::ConfirmDelete(confirmed))
            if group_subject_id == confirmed =>
        {
            delete(ctx, group_subject_id).await
        }
        (Step::DeleteConfirm { .. }, SubjectAction::CancelDelete) => {
            Ok(Transition::to(Step::Manage, manage_screen()))
        }
        (step, _) => Ok(Transition::stale(step)),
    }
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    let Step::AwaitName { group_id, group_name } = step else {
        return Ok(Transition::use_buttons(step));
    };

    let name = match inputs::subject_name(text) {
        Ok(name) => name,
        Err(err) => return Ok(ask_name(group_id, group_name, Some(format!("❌ {err}")))),
    };

    match repositories::subjects::attach_to_group(ctx.pool, group_id, &name, primitive_now_utc())
        .await?
    {
        AttachOutcome::Attached { subject_id, reused_subject } => {
            tracing::info!(
                user_id = ctx.caller.id,
                group_id,
                subject_id,
                reused_subject,
                "Subject attached to group"
            );
            Ok(finished(format!("✅ Предмет '{name}' добавлен для группы {group_name}!")))
        }
        AttachOutcome::AlreadyAttached => {
            let message = format!("❌ Предмет '{name}' уже есть у группы {group_name}!");
            Ok(ask_name(group_id, group_name, Some(message)))
        }
    }
}

fn ask_name(group_id: i64, group_name: String, error: Option<String>) -> Transition {
    let mut text = String::new();
    if let Some(error) = error {
        let _ = write!(text, "{error}\n\n");
    }
    let _ = write!(text, "Введите название предмета для группы {group_name}:");
    Transition::to(
        Step::AwaitName { group_id, group_name },
        Screen::new(text).button("🔙 Отмена", SubjectAction::Open),
    )
}

async fn pick_group<F>(ctx: &Ctx<'_>, next: Step, title: &str, action: F) -> BotResult<Transition>
where
    F: Fn(i64) -> SubjectAction,
{
    let groups = repositories::groups::list(ctx.pool).await?;
    if groups.is_empty() {
        return Ok(Transition::to(
            Step::Manage,
            Screen::new("❌ В системе нет групп. Сначала добавьте группу.")
                .button("🔙 Назад", SubjectAction::Open),
        ));
    }

    let screen =
        group_buttons(Screen::new(title), &groups, action).button("🔙 Назад", SubjectAction::Open);
    Ok(Transition::to(next, screen))
}

async fn list(ctx: &Ctx<'_>, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;
    let subjects = repositories::subjects::list_for_group(ctx.pool, group_id).await?;

    let text = if subjects.is_empty() {
        format!("📝 У группы {} нет предметов", group.name)
    } else {
        let mut text = format!("📖 Предметы группы {}:\n\n", group.name);
        for subject in &subjects {
            let _ = writeln!(text, "• {} ({} занятий)", subject.name, subject.lesson_count);
        }
        let _ = write!(text, "\nВсего предметов: {}", subjects.len());
        text
    };

    Ok(Transition::to(
        Step::Manage,
        Screen::new(text).button("🔙 Назад", SubjectAction::Open).main_menu_button(),
    ))
}

async fn pick_subject(ctx: &Ctx<'_>, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;
    let subjects = repositories::subjects::list_for_group(ctx.pool, group_id).await?;
    if subjects.is_empty() {
        return Ok(Transition::to(
            Step::Manage,
            Screen::new(format!("📝 У группы {} нет предметов", group.name))
                .button("🔙 Назад", SubjectAction::Open),
        ));
    }

    let screen = subjects
        .iter()
        .fold(
            Screen::new(format!("🗑️ Выберите предмет группы {} для удаления:", group.name)),
            |screen, subject| {
                screen.row(vec![Button::new(
                    subject.name.clone(),
                    SubjectAction::DeleteSelect(subject.group_subject_id).into(),
                )])
            },
        )
        .button("🔙 Назад", SubjectAction::Open);
    Ok(Transition::to(Step::DeleteSelectSubject { group_id }, screen))
}

async fn confirm_delete(
    ctx: &Ctx<'_>,
    group_id: i64,
    group_subject_id: i64,
) -> BotResult<Transition> {
    let offering = repositories::subjects::find_offering(ctx.pool, group_subject_id)
        .await?
        .ok_or(BotError::NotFound("subject"))?;
    if offering.group_id != group_id {
        return Ok(Transition::stale(Step::DeleteSelectSubject { group_id }));
    }

    let mut text = format!(
        "⚠️ Вы уверены, что хотите удалить предмет '{}' у группы {}?",
        offering.subject_name, offering.group_name
    );
    if offering.lesson_count > 0 {
        let _ = write!(
            text,
            "\n\n❗ По этому предмету уже проведено {} занятий. \
             Они будут удалены вместе с отметками посещаемости.",
            offering.lesson_count
        );
    }

    Ok(Transition::to(
        Step::DeleteConfirm { group_subject_id },
        Screen::new(text)
            .button("✅ Да, удалить", SubjectAction::ConfirmDelete(group_subject_id))
            .button("❌ Нет, отмена", SubjectAction::CancelDelete),
    ))
}

async fn delete(ctx: &Ctx<'_>, group_subject_id: i64) -> BotResult<Transition> {
    let offering = repositories::subjects::find_offering(ctx.pool, group_subject_id)
        .await?
        .ok_or(BotError::NotFound("subject"))?;
    let detached = repositories::subjects::detach_from_group(ctx.pool, group_subject_id)
        .await?
        .ok_or(BotError::NotFound("subject"))?;

    tracing::info!(
        user_id = ctx.caller.id,
        group_subject_id,
        lessons_removed = detached.lessons_removed,
        "Subject detached from group"
    );
    Ok(finished(format!(
        "✅ Предмет '{}' удален у группы {}!",
        offering.subject_name, offering.group_name
    )))
}
