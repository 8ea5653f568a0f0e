//! Screens shared by several entry points: the role menus, help, the
//! student's own statistics and the staff quick summary.

use std::fmt::Write as _;

use super::action::{
    AttendanceAction, GroupAction, Nav, RegisterAction, ReportAction, StudentAction, SubjectAction,
};
use super::error::BotResult;
use super::screen::Screen;
use super::Ctx;
use crate::core::time::format_iso_date;
use crate::repositories;
use crate::services::reports::{self, format_percent, QuickSummaryRow, QUICK_SUMMARY_DAYS};
use crate::services::roles::Role;
use crate::services::stats::{self, StudentStats};

pub(crate) const HELP_TEXT: &str = "🤖 UniHelperBot - Помощник для студентов

Основные команды:
/start - Начать работу с ботом
/help - Показать эту справку
/cancel - Отменить текущую операцию

Используйте кнопки меню для доступа к функциям.";

pub(crate) const ACCESS_DENIED: &str = "❌ Доступно только администраторам";

const RECENT_UNMARKED_ICON: &str = "❓";

pub(crate) fn main_menu(role: Role) -> Screen {
    if role.is_staff() {
        return staff_keyboard(Screen::new("👨‍💼 Главное меню\n\nВыберите действие:"));
    }
    match role {
        Role::Student => student_keyboard(Screen::new("👋 Главное меню\n\nВыберите действие:")),
        _ => guest_keyboard(Screen::new("👋 Главное меню\n\nВы не зарегистрированы в системе:")),
    }
}

/// Greeting for `/start`.
pub(crate) async fn welcome(ctx: &Ctx<'_>) -> BotResult<Screen> {
    let name = &ctx.caller.display_name;
    let role = ctx.role().await;

    let screen = match role {
        Role::Admin | Role::Headman => staff_keyboard(Screen::new(format!(
            "👋 Добро пожаловать, {name}!\nВаша роль: {}\n\nВыберите действие:",
            role.as_str()
        ))),
        Role::Student => {
            match repositories::students::find_by_telegram_id(ctx.pool, ctx.caller.id).await? {
                Some(student) => student_keyboard(Screen::new(format!(
                    "👋 Привет, {}!\nЯ твой учебный помощник.\n\nВыберите действие:",
                    student.full_name
                ))),
                None => guest_welcome(name),
            }
        }
        Role::Guest => guest_welcome(name),
    };

    Ok(screen)
}

pub(crate) fn help() -> Screen {
    Screen::new(HELP_TEXT).main_menu_button()
}

pub(crate) fn access_denied() -> Screen {
    Screen::new(ACCESS_DENIED).main_menu_button()
}

pub(crate) async fn my_attendance(ctx: &Ctx<'_>) -> BotResult<Screen> {
    match stats::for_telegram_id(ctx.pool, ctx.caller.id).await? {
        Some(stats) => Ok(student_stats(&stats)),
        None => Ok(Screen::new("❌ Вы не зарегистрированы как студент").main_menu_button()),
    }
}

pub(crate) fn student_stats(stats: &StudentStats) -> Screen {
    let mut text = format!(
        "📊 Ваша посещаемость\n\n👤 {}\n📚 Группа: {}\n\n📈 Статистика:\n",
        stats.full_name, stats.group_name
    );
    let _ = writeln!(text, "• Всего занятий: {}", stats.total);
    let _ = writeln!(text, "• Присутствовал: {}", stats.counts.present);
    let _ = writeln!(text, "• Отсутствовал: {}", stats.counts.absent);
    let _ = writeln!(text, "• Опоздал: {}", stats.counts.late);
    let _ = writeln!(text, "• Посещаемость: {:.1}%", stats.percent());

    text.push_str("\n📅 Последние занятия:\n");
    if stats.recent.is_empty() {
        text.push_str("• занятий пока не было\n");
    }
    for lesson in &stats.recent {
        let icon = lesson.status.map(|status| status.icon()).unwrap_or(RECENT_UNMARKED_ICON);
        let _ = writeln!(
            text,
            "• {} - {} {icon}",
            format_iso_date(lesson.lesson_date),
            lesson.subject_name
        );
    }

    Screen::new(text).button("🔄 Обновить", Nav::MyAttendance).main_menu_button()
}

pub(crate) async fn quick_summary(ctx: &Ctx<'_>) -> BotResult<Screen> {
    if !ctx.role().await.can_manage() {
        return Ok(access_denied());
    }

    let rows = reports::quick_summary(ctx.pool, ctx.today).await?;
    Ok(quick_summary_screen(&rows))
}

pub(crate) fn quick_summary_screen(rows: &[QuickSummaryRow]) -> Screen {
    if rows.is_empty() {
        return Screen::new("📊 Нет данных для отчета").main_menu_button();
    }

    let mut text = format!("📊 Сводка по посещаемости (последние {QUICK_SUMMARY_DAYS} дней):\n\n");
    for row in rows {
        let _ = writeln!(text, "👥 {}:", row.group_name);
        let _ = writeln!(text, "   • Занятий: {}", row.lesson_count);
        let _ = writeln!(text, "   • Студентов: {}", row.student_count);
        let _ = writeln!(text, "   • Посещаемость: {}\n", format_percent(row.percent));
    }

    Screen::new(text.trim_end())
        .button("📊 Подробный отчет", ReportAction::Start)
        .main_menu_button()
}

fn guest_welcome(name: &str) -> Screen {
    guest_keyboard(Screen::new(format!(
        "👋 Привет, {name}!\n\nВы не зарегистрированы в системе. Хотите зарегистрироваться?"
    )))
}

fn staff_keyboard(screen: Screen) -> Screen {
    screen
        .button("✅ Отметить посещаемость", AttendanceAction::Start)
        .button("📊 Отчет по посещаемости", ReportAction::Start)
        .button("📋 Быстрая сводка", Nav::QuickSummary)
        .button("👥 Управление студентами", StudentAction::Open)
        .button("📚 Управление предметами", SubjectAction::Open)
        .button("🏫 Управление группами", GroupAction::Open)
        .button("❓ Помощь", Nav::Help)
        .main_menu_button()
}

fn student_keyboard(screen: Screen) -> Screen {
    screen
        .button("📊 Моя посещаемость", Nav::MyAttendance)
        .button("❓ Помощь", Nav::Help)
        .main_menu_button()
}

fn guest_keyboard(screen: Screen) -> Screen {
    screen
        .button("📝 Зарегистрироваться", RegisterAction::Start)
        .button("❓ Помощь", Nav::Help)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menus_are_gated_by_role() {
        for role in [Role::Admin, Role::Headman] {
            let menu = main_menu(role);
            assert!(menu.has(AttendanceAction::Start));
            assert!(menu.has(GroupAction::Open));
            assert!(!menu.has(RegisterAction::Start));
        }

        let student = main_menu(Role::Student);
        assert!(student.has(Nav::MyAttendance));
        assert!(!student.has(StudentAction::Open));

        let guest = main_menu(Role::Guest);
        assert!(guest.has(RegisterAction::Start));
        assert!(!guest.has(Nav::MyAttendance));
        assert!(!guest.has(Nav::MainMenu));
    }

    #[test]
    fn quick_summary_marks_groups_without_marks() {
        let screen = quick_summary_screen(&[QuickSummaryRow {
            group_name: "CS-101".to_string(),
            lesson_count: 0,
            student_count: 3,
            percent: None,
        }]);
        assert!(screen.text.contains("👥 CS-101:"));
        assert!(screen.text.contains("Посещаемость: —"));
        assert!(screen.has(ReportAction::Start));
    }
}
