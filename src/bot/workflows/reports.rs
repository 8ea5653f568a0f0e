use time::Date;

use super::group_buttons;
use crate::bot::action::ReportAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::menus;
use crate::bot::screen::{Reply, Screen};
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::{format_iso_date, parse_iso_date};
use crate::repositories;
use crate::services::reports::{self, format_percent, DateRange, PeriodPreset};

const START_PROMPT: &str = "Введите начальную дату в формате ГГГГ-ММ-ДД:";
const END_PROMPT: &str = "Введите конечную дату в формате ГГГГ-ММ-ДД:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    SelectGroup,
    SelectRange { group_id: i64 },
    AwaitStart { group_id: i64 },
    AwaitEnd { group_id: i64, start: Date },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Report(step)
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
        Screen::new("📊 Выберите группу для отчета:"),
        &groups,
        ReportAction::Group,
    )
    .back_to_main();
    Ok(Transition::to(Step::SelectGroup, screen))
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: ReportAction,
) -> BotResult<Transition> {
    match (step, action) {
        (Step::SelectGroup, ReportAction::Group(group_id)) => {
            let group = repositories::groups::find_by_id(ctx.pool, group_id)
                .await?
                .ok_or(BotError::NotFound("group"))?;
            Ok(Transition::to(
                Step::SelectRange { group_id },
                Screen::new(format!("📊 Группа {}\n\nВыберите период:", group.name))
                    .button("📅 За неделю", ReportAction::Preset(PeriodPreset::Week))
                    .button("📅 За месяц", ReportAction::Preset(PeriodPreset::Month))
                    .button("📅 За все время", ReportAction::Preset(PeriodPreset::AllTime))
                    .button("✏️ Указать период", ReportAction::Custom)
                    .button("🔙 Назад", ReportAction::Start),
            ))
        }
        (Step::SelectRange { group_id }, ReportAction::Preset(preset)) => {
            deliver(ctx, group_id, preset.range(ctx.today)).await
        }
        (Step::SelectRange { group_id }, ReportAction::Custom) => Ok(Transition::to(
            Step::AwaitStart { group_id },
            Screen::new(START_PROMPT).button("🔙 Назад", ReportAction::Start),
        )),
        (step, _) => Ok(Transition::stale(step)),
    }
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    match step {
        Step::AwaitStart { group_id } => match parse_iso_date(text) {
            Some(start) => Ok(Transition::to(
                Step::AwaitEnd { group_id, start },
                Screen::new(format!("Начальная дата: {}\n\n{END_PROMPT}", format_iso_date(start)))
                    .button("🔙 Назад", ReportAction::Start),
            )),
            None => {
                Ok(retry(Step::AwaitStart { group_id }, "❌ Неверный формат даты.", START_PROMPT))
            }
        },
        Step::AwaitEnd { group_id, start } => {
            let Some(end) = parse_iso_date(text) else {
                return Ok(retry(
                    Step::AwaitEnd { group_id, start },
                    "❌ Неверный формат даты.",
                    END_PROMPT,
                ));
            };
            match DateRange::new(start, end) {
                Some(range) => deliver(ctx, group_id, range).await,
                None => Ok(retry(
                    Step::AwaitEnd { group_id, start },
                    "❌ Конечная дата не может быть раньше начальной.",
                    END_PROMPT,
                )),
            }
        }
        step => Ok(Transition::use_buttons(step)),
    }
}

fn retry(step: Step, error: &str, prompt: &str) -> Transition {
    Transition::to(
        step,
        Screen::new(format!("{error}\n\n{prompt}")).button("🔙 Назад", ReportAction::Start),
    )
}

async fn deliver(ctx: &Ctx<'_>, group_id: i64, range: DateRange) -> BotResult<Transition> {
    let Some(report) = reports::generate(ctx.pool, group_id, range).await? else {
        return Ok(Transition::done(
            Screen::new(format!("📊 Нет данных за выбранный период ({})", range.label()))
                .button("📊 Другой отчет", ReportAction::Start)
                .main_menu_button(),
        ));
    };

    let bytes = report.to_xlsx()?;
    let text = format!(
        "✅ Отчет готов!\n\nГруппа: {}\nПериод: {}\nЗанятий: {}\nСтудентов: {}\n\
         Средняя посещаемость: {}",
        report.group_name,
        range.label(),
        report.summary.lesson_count,
        report.summary.student_count,
        format_percent(report.summary.mean_percent)
    );
    tracing::info!(user_id = ctx.caller.id, group_id, bytes = bytes.len(), "Report delivered");

    Ok(Transition::done(
        Screen::new(text).button("📊 Другой отчет", ReportAction::Start).main_menu_button(),
    )
    .then(Reply::Document { filename: report.filename(), bytes, caption: report.caption() }))
}
