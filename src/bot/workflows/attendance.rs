use std::collections::HashMap;

use time::Date;

use super::group_buttons;
use crate::bot::action::AttendanceAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::menus;
use crate::bot::screen::{Button, Screen};
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::{format_iso_date, parse_iso_date, primitive_now_utc};
use crate::db::models::Student;
use crate::db::types::{AttendanceStatus, UNMARKED_ICON};
use crate::repositories;
use crate::repositories::subjects::Offering;

const DATE_PROMPT: &str = "Введите дату в формате ГГГГ-ММ-ДД (например, 2024-01-15):";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    SelectGroup,
    SelectSubject { group_id: i64 },
    SelectDate { group_subject_id: i64 },
    Marking { lesson_id: i64, group_subject_id: i64 },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Attendance(step)
    }
}

pub(crate) async fn enter(ctx: &Ctx<'_>) -> BotResult<Transition> {
    if !ctx.role().await.can_manage() {
        return Ok(Transition::done(menus::access_denied()));
    }

    let groups = repositories::groups::list(ctx.pool).await?;
    if groups.is_empty() {
        return Ok(Transition::done(
            Screen::new("❌ В системе нет групп. Сначала добавьте группу.").back_to_main(),
        ));
    }

    let screen = group_buttons(
        Screen::new("📝 Выберите группу для отметки посещаемости:"),
        &groups,
        AttendanceAction::Group,
    )
    .back_to_main();
    Ok(Transition::to(Step::SelectGroup, screen))
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: AttendanceAction,
) -> BotResult<Transition> {
    match (step, action) {
        (Step::SelectGroup, AttendanceAction::Group(group_id)) => pick_subject(ctx, group_id).await,
        (Step::SelectSubject { group_id }, AttendanceAction::Subject(group_subject_id)) => {
            let offering = offering(ctx, group_subject_id).await?;
            if offering.group_id != group_id {
                return Ok(Transition::stale(Step::SelectSubject { group_id }));
            }
            Ok(Transition::to(
                Step::SelectDate { group_subject_id },
                Screen::new(format!(
                    "📅 {} ({})\n\nВыберите дату занятия:",
                    offering.subject_name, offering.group_name
                ))
                .button("📅 Сегодня", AttendanceAction::Today)
                .button("✏️ Ввести дату", AttendanceAction::ManualDate)
                .button("🔙 Назад", AttendanceAction::Start),
            ))
        }
        (Step::SelectDate { group_subject_id }, AttendanceAction::Today) => {
            open_lesson(ctx, group_subject_id, ctx.today).await
        }
        (Step::SelectDate { group_subject_id }, AttendanceAction::ManualDate) => Ok(Transition::to(
            Step::SelectDate { group_subject_id },
            Screen::new(DATE_PROMPT).button("🔙 Назад", AttendanceAction::Start),
        )),
        (
            Step::Marking { lesson_id, group_subject_id },
            AttendanceAction::Mark { student_id, status },
        ) => mark(ctx, lesson_id, group_subject_id, student_id, status).await,
        (Step::Marking { lesson_id, group_subject_id }, AttendanceAction::Refresh) => {
            let screen = marking_screen(ctx, lesson_id, group_subject_id).await?;
            Ok(Transition::to(Step::Marking { lesson_id, group_subject_id }, screen))
        }
        (Step::Marking { group_subject_id, .. }, AttendanceAction::Save) => {
            let offering = offering(ctx, group_subject_id).await?;
            Ok(Transition::done(
                Screen::new(format!(
                    "✅ Посещаемость для группы {} сохранена!",
                    offering.group_name
                ))
                .button("📝 Отметить еще", AttendanceAction::Start)
                .main_menu_button(),
            ))
        }
        (step, _) => Ok(Transition::stale(step)),
    }
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    let Step::SelectDate { group_subject_id } = step else {
        return Ok(Transition::use_buttons(step));
    };

    match parse_iso_date(text) {
        Some(date) => open_lesson(ctx, group_subject_id, date).await,
        None => Ok(Transition::to(
            Step::SelectDate { group_subject_id },
            Screen::new(format!("❌ Неверный формат даты.\n\n{DATE_PROMPT}"))
                .button("🔙 Назад", AttendanceAction::Start),
        )),
    }
}

async fn offering(ctx: &Ctx<'_>, group_subject_id: i64) -> BotResult<Offering> {
    repositories::subjects::find_offering(ctx.pool, group_subject_id)
        .await?
        .ok_or(BotError::NotFound("subject"))
}

async fn pick_subject(ctx: &Ctx<'_>, group_id: i64) -> BotResult<Transition> {
    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;
    let subjects = repositories::subjects::list_for_group(ctx.pool, group_id).await?;
    if subjects.is_empty() {
        return Ok(Transition::to(
            Step::SelectGroup,
            Screen::new(format!("❌ У группы {} нет предметов.", group.name))
                .button("🔙 Назад", AttendanceAction::Start),
        ));
    }

    let screen = subjects
        .iter()
        .fold(
            Screen::new(format!("📖 Группа {}\n\nВыберите предмет:", group.name)),
            |screen, subject| {
                screen.row(vec![Button::new(
                    subject.name.clone(),
                    AttendanceAction::Subject(subject.group_subject_id).into(),
                )])
            },
        )
        .button("🔙 Назад", AttendanceAction::Start);
    Ok(Transition::to(Step::SelectSubject { group_id }, screen))
}

async fn open_lesson(ctx: &Ctx<'_>, group_subject_id: i64, date: Date) -> BotResult<Transition> {
    let lesson =
        repositories::lessons::find_or_create(ctx.pool, group_subject_id, date, primitive_now_utc())
            .await?;
    tracing::debug!(
        user_id = ctx.caller.id,
        lesson_id = lesson.id,
        group_subject_id,
        date = %format_iso_date(date),
        "Attendance marking opened"
    );

    let screen = marking_screen(ctx, lesson.id, group_subject_id).await?;
    Ok(Transition::to(Step::Marking { lesson_id: lesson.id, group_subject_id }, screen))
}

async fn mark(
    ctx: &Ctx<'_>,
    lesson_id: i64,
    group_subject_id: i64,
    student_id: i64,
    status: AttendanceStatus,
) -> BotResult<Transition> {
    let step = Step::Marking { lesson_id, group_subject_id };
    let offering = offering(ctx, group_subject_id).await?;
    let student = repositories::students::find_by_id(ctx.pool, student_id).await?;
    if student.and_then(|student| student.group_id) != Some(offering.group_id) {
        return Ok(Transition::stale(step));
    }

    repositories::attendance::upsert(ctx.pool, student_id, lesson_id, status, primitive_now_utc())
        .await?;
    metrics::counter!(crate::core::metrics::ATTENDANCE_MARKS_TOTAL).increment(1);
    tracing::debug!(
        user_id = ctx.caller.id,
        lesson_id,
        student_id,
        status = status.as_str(),
        "Attendance marked"
    );

    let screen = marking_screen(ctx, lesson_id, group_subject_id).await?;
    Ok(Transition::to(step, screen))
}

/// Always rebuilt from the database so several devices see the same marks.
async fn marking_screen(
    ctx: &Ctx<'_>,
    lesson_id: i64,
    group_subject_id: i64,
) -> BotResult<Screen> {
    let offering = offering(ctx, group_subject_id).await?;
    let lesson = repositories::lessons::find_by_id(ctx.pool, lesson_id)
        .await?
        .ok_or(BotError::NotFound("lesson"))?;
    let students = repositories::students::list_by_group(ctx.pool, offering.group_id).await?;
    let statuses = repositories::attendance::statuses_for_lesson(ctx.pool, lesson_id).await?;

    let header = format!(
        "📝 Отметка посещаемости\nГруппа: {}\nПредмет: {}\nДата: {}",
        offering.group_name,
        offering.subject_name,
        format_iso_date(lesson.date)
    );
    if students.is_empty() {
        return Ok(Screen::new(format!("{header}\n\n❌ В группе нет студентов."))
            .button("🔙 Назад", AttendanceAction::Start)
            .main_menu_button());
    }

    let screen = students
        .iter()
        .fold(Screen::new(format!("{header}\n\nОтметьте студентов:")), |screen, student| {
            student_rows(screen, student, &statuses)
        })
        .button("💾 Сохранить", AttendanceAction::Save)
        .main_menu_button();
    Ok(screen)
}

fn student_rows(
    screen: Screen,
    student: &Student,
    statuses: &HashMap<i64, AttendanceStatus>,
) -> Screen {
    let icon = statuses.get(&student.id).map_or(UNMARKED_ICON, |status| status.icon());
    let buttons = AttendanceStatus::ALL
        .iter()
        .map(|&status| {
            Button::new(
                status.icon(),
                AttendanceAction::Mark { student_id: student.id, status }.into(),
            )
        })
        .collect();

    screen
        .button(format!("{icon} {}", student.full_name), AttendanceAction::Refresh)
        .row(buttons)
}
