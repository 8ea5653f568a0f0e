use std::fmt::Write as _;

use super::group_buttons;
use crate::bot::action::StudentAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::menus;
use crate::bot::screen::{Button, Screen};
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::students::StudentListing;
use crate::schemas::inputs;

const NO_GROUP: &str = "Без группы";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Manage,
    AwaitName,
    AwaitGroup { full_name: String },
    EditSelect,
    DeleteSelect,
    DeleteConfirm { student_id: i64 },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Students(step)
    }
}

pub(crate) async fn enter(ctx: &Ctx<'_>) -> BotResult<Transition> {
    if !ctx.role().await.can_manage() {
        return Ok(Transition::done(menus::access_denied()));
    }
    Ok(Transition::to(Step::Manage, manage_screen()))
}

fn manage_screen() -> Screen {
    Screen::new("👥 Управление студентами\n\nВыберите действие:")
        .button("👥 Список студентов", StudentAction::List)
        .button("➕ Добавить студента", StudentAction::Add)
        .button("✏️ Редактировать студента", StudentAction::Edit)
        .button("🗑️ Удалить студента", StudentAction::Delete)
        .back_to_main()
}

fn finished(text: String) -> Transition {
    Transition::done(
        Screen::new(text)
            .button("🔙 К управлению студентами", StudentAction::Open)
            .main_menu_button(),
    )
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: StudentAction,
) -> BotResult<Transition> {
    match (step, action) {
        (Step::Manage, StudentAction::List) => list(ctx).await,
        (Step::Manage, StudentAction::Add) => Ok(Transition::to(
            Step::AwaitName,
            Screen::new("Введите ФИО нового студента:").button("🔙 Отмена", StudentAction::Open),
        )),
        (Step::Manage, StudentAction::Edit) => {
            let title = "✏️ Выберите студента для редактирования:";
            pick_student(ctx, Step::EditSelect, title, StudentAction::EditSelect).await
        }
        (Step::Manage, StudentAction::Delete) => {
            let title = "🗑️ Выберите студента для удаления:";
            pick_student(ctx, Step::DeleteSelect, title, StudentAction::DeleteSelect).await
        }
        (Step::AwaitGroup { full_name }, StudentAction::AddToGroup(group_id)) => {
            add(ctx, &full_name, group_id).await
        }
        (Step::EditSelect, StudentAction::EditSelect(student_id)) => {
            let student = repositories::students::find_by_id(ctx.pool, student_id)
                .await?
                .ok_or(BotError::NotFound("student"))?;
            Ok(Transition::to(
                Step::Manage,
                Screen::new(format!(
                    "✏️ Редактирование студента ID: {} ({})\n\nФункция в разработке",
                    student.id, student.full_name
                ))
                .button("🔙 К управлению студентами", StudentAction::Open),
            ))
        }
        (Step::DeleteSelect, StudentAction::DeleteSelect(student_id)) => {
            let student = repositories::students::find_by_id(ctx.pool, student_id)
                .await?
                .ok_or(BotError::NotFound("student"))?;
            Ok(Transition::to(
                Step::DeleteConfirm { student_id },
                Screen::new(format!(
                    "⚠️ Вы уверены, что хотите удалить студента {}?",
                    student.full_name
                ))
                .button("✅ Да, удалить", StudentAction::ConfirmDelete(student_id))
                .button("❌ Нет, отмена", StudentAction::CancelDelete),
            ))
        }
        (Step::DeleteConfirm { student_id }, StudentAction::ConfirmDelete(confirmed))
            if student_id == confirmed =>
        {
            delete(ctx, student_id).await
        }
        (Step::DeleteConfirm { .. }, StudentAction::CancelDelete) => {
            Ok(Transition::to(Step::Manage, manage_screen()))
        }
        (step, _) => Ok(Transition::stale(step)),
    }
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    let Step::AwaitName = step else {
        return Ok(Transition::use_buttons(step));
    };

    let full_name = match inputs::full_name(text) {
        Ok(full_name) => full_name,
        Err(err) => {
            return Ok(Transition::to(
                Step::AwaitName,
                Screen::new(format!("❌ {err}. Введите ФИО нового студента:"))
                    .button("🔙 Отмена", StudentAction::Open),
            ))
        }
    };

    let groups = repositories::groups::list(ctx.pool).await?;
    if groups.is_empty() {
        return Ok(Transition::to(
            Step::Manage,
            Screen::new("❌ В системе нет групп. Сначала добавьте группу.")
                .button("🔙 К управлению студентами", StudentAction::Open),
        ));
    }

    let screen = group_buttons(
        Screen::new(format!("Выберите группу для студента {full_name}:")),
        &groups,
        StudentAction::AddToGroup,
    )
    .button("🔙 Отмена", StudentAction::Open);
    Ok(Transition::to(Step::AwaitGroup { full_name }, screen))
}

async fn list(ctx: &Ctx<'_>) -> BotResult<Transition> {
    let students = repositories::students::list_with_groups(ctx.pool).await?;
    let screen = Screen::new(roster_text(&students))
        .button("🔙 Назад", StudentAction::Open)
        .main_menu_button();
    Ok(Transition::to(Step::Manage, screen))
}

fn roster_text(students: &[StudentListing]) -> String {
    if students.is_empty() {
        return "📝 Студенты не найдены".to_string();
    }

    let mut text = String::from("👥 Список всех студентов:\n");
    let mut current_group: Option<&str> = None;
    for student in students {
        let group = student.group_name.as_deref().unwrap_or(NO_GROUP);
        if current_group != Some(group) {
            let _ = write!(text, "\n📚 Группа: {group}\n");
            current_group = Some(group);
        }
        let status = if student.telegram_id.is_some() { "✅ В боте" } else { "❌ Не в боте" };
        let _ = writeln!(text, "• {} ({status})", student.full_name);
    }
    let _ = write!(text, "\nВсего студентов: {}", students.len());
    text
}

async fn pick_student(
    ctx: &Ctx<'_>,
    next: Step,
    title: &str,
    action: fn(i64) -> StudentAction,
) -> BotResult<Transition> {
    let students = repositories::students::list_with_groups(ctx.pool).await?;
    if students.is_empty() {
        return Ok(Transition::to(
            Step::Manage,
            Screen::new("📝 Студенты не найдены").button("🔙 Назад", StudentAction::Open),
        ));
    }

    let screen = students
        .iter()
        .fold(Screen::new(title), |screen, student| {
            let label = format!(
                "{} ({})",
                student.full_name,
                student.group_name.as_deref().unwrap_or(NO_GROUP)
            );
            screen.row(vec![Button::new(label, action(student.id).into())])
        })
        .button("🔙 Назад", StudentAction::Open);
    Ok(Transition::to(next, screen))
}

async fn add(ctx: &Ctx<'_>, full_name: &str, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;
    let student = repositories::students::create(
        ctx.pool,
        full_name,
        Some(group.id),
        None,
        primitive_now_utc(),
    )
    .await?;

    tracing::info!(
        user_id = ctx.caller.id,
        student_id = student.id,
        group_id = group.id,
        "Student added"
    );
    Ok(finished(format!("✅ Студент {} добавлен в группу {}!", student.full_name, group.name)))
}

async fn delete(ctx: &Ctx<'_>, student_id: i64) -> BotResult<Transition> {
    let student = repositories::students::find_by_id(ctx.pool, student_id)
        .await?
        .ok_or(BotError::NotFound("student"))?;
    if !repositories::students::delete(ctx.pool, student_id).await? {
        return Err(BotError::NotFound("student"));
    }

    tracing::info!(user_id = ctx.caller.id, student_id, "Student deleted");
    Ok(finished(format!("✅ Студент {} удален!", student.full_name)))
}
