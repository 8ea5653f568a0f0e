use super::action::{AttendanceAction, GroupAction, Nav, RegisterAction, StudentAction};
use super::testing::{notice, press, screen, send, type_text, TestBot, ADMIN};
use super::*;
use crate::db::types::StaffRole;
use crate::test_support::{seed_group, seed_student};

const GUEST: i64 = 42;

#[test]
fn command_parse_handles_bot_suffix_and_arguments() {
    assert_eq!(Command::parse("/start"), Some(Command::Start));
    assert_eq!(Command::parse("/help@UniHelperBot"), Some(Command::Help));
    assert_eq!(Command::parse("  /cancel now"), Some(Command::Cancel));
    assert_eq!(Command::parse("/stats"), Some(Command::Unknown("stats".into())));
    assert_eq!(Command::parse("hello"), None);
    assert_eq!(Command::parse("/"), None);
}

#[tokio::test]
async fn cancel_clears_any_workflow() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, StudentAction::Open).await;
    press(&bot, ADMIN, StudentAction::Add).await;
    assert!(bot.engine.conversation(ADMIN).await.is_some());

    let replies = send(&bot, ADMIN, Event::Command(Command::Cancel)).await;
    assert_eq!(screen(&replies).text, CANCELLED);
    assert_eq!(bot.engine.conversation(ADMIN).await, None);

    let replies = send(&bot, ADMIN, Event::Command(Command::Cancel)).await;
    assert_eq!(screen(&replies).text, CANCELLED);
    Ok(())
}

#[tokio::test]
async fn main_menu_ends_the_active_workflow() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, GroupAction::Open).await;
    press(&bot, ADMIN, GroupAction::Add).await;
    let replies = press(&bot, ADMIN, Nav::MainMenu).await;

    assert!(screen(&replies).has(AttendanceAction::Start));
    assert_eq!(bot.engine.conversation(ADMIN).await, None);

    let replies = type_text(&bot, ADMIN, "CS-101").await;
    assert_eq!(screen(&replies).text, NO_WORKFLOW);
    assert!(no_groups(&bot).await?);
    Ok(())
}

async fn no_groups(bot: &TestBot) -> anyhow::Result<bool> {
    Ok(crate::repositories::groups::list(&bot.pool).await?.is_empty())
}

#[tokio::test]
async fn other_workflow_entry_is_refused_while_busy() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, StudentAction::Open).await;
    press(&bot, ADMIN, StudentAction::Add).await;
    let replies = press(&bot, ADMIN, GroupAction::Open).await;

    assert_eq!(notice(&replies), BUSY);
    assert_eq!(
        bot.engine.conversation(ADMIN).await,
        Some(workflows::students::Step::AwaitName.into())
    );
    Ok(())
}

#[tokio::test]
async fn same_workflow_entry_restarts_it() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, StudentAction::Open).await;
    press(&bot, ADMIN, StudentAction::Add).await;
    press(&bot, ADMIN, StudentAction::Open).await;

    assert_eq!(
        bot.engine.conversation(ADMIN).await,
        Some(workflows::students::Step::Manage.into())
    );
    Ok(())
}

#[tokio::test]
async fn button_without_workflow_is_stale() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    let replies = press(&bot, ADMIN, StudentAction::ConfirmDelete(7)).await;

    assert_eq!(notice(&replies), STALE);
    assert_eq!(bot.engine.conversation(ADMIN).await, None);
    Ok(())
}

#[tokio::test]
async fn button_for_another_step_keeps_state() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, StudentAction::Open).await;
    let replies = press(&bot, ADMIN, StudentAction::ConfirmDelete(7)).await;

    assert_eq!(notice(&replies), STALE);
    assert_eq!(
        bot.engine.conversation(ADMIN).await,
        Some(workflows::students::Step::Manage.into())
    );
    Ok(())
}

#[tokio::test]
async fn text_at_button_step_asks_for_buttons() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    press(&bot, ADMIN, GroupAction::Open).await;
    let replies = type_text(&bot, ADMIN, "hello").await;

    assert_eq!(notice(&replies), USE_BUTTONS);
    assert_eq!(bot.engine.conversation(ADMIN).await, Some(workflows::groups::Step::Manage.into()));
    Ok(())
}

#[tokio::test]
async fn unknown_command_gets_a_hint() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    let replies = send(&bot, ADMIN, Event::Command(Command::Unknown("stats".into()))).await;

    assert_eq!(screen(&replies).text, UNKNOWN_COMMAND);
    Ok(())
}

#[tokio::test]
async fn start_greets_each_role() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;
    let group = seed_group(&bot.pool, "CS-101").await?;
    seed_student(&bot.pool, "Alice Smith", group.id, Some(7)).await?;
    crate::repositories::admins::upsert(
        &bot.pool,
        8,
        StaffRole::Headman,
        crate::core::time::primitive_now_utc(),
    )
    .await?;

    let admin = send(&bot, ADMIN, Event::Command(Command::Start)).await;
    assert!(screen(&admin).text.contains("Ваша роль: admin"));
    assert!(screen(&admin).has(StudentAction::Open));

    let headman = send(&bot, 8, Event::Command(Command::Start)).await;
    assert!(screen(&headman).text.contains("Ваша роль: headman"));

    let student = send(&bot, 7, Event::Command(Command::Start)).await;
    assert!(screen(&student).text.starts_with("👋 Привет, Alice Smith!"));
    assert!(screen(&student).has(Nav::MyAttendance));

    let guest = send(&bot, GUEST, Event::Command(Command::Start)).await;
    assert!(screen(&guest).has(RegisterAction::Start));
    assert!(!screen(&guest).has(StudentAction::Open));
    Ok(())
}

#[tokio::test]
async fn headman_is_denied_admin_entry_points() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;
    crate::repositories::admins::upsert(
        &bot.pool,
        8,
        StaffRole::Headman,
        crate::core::time::primitive_now_utc(),
    )
    .await?;

    let replies = press(&bot, 8, AttendanceAction::Start).await;

    assert_eq!(screen(&replies).text, menus::ACCESS_DENIED);
    assert_eq!(bot.engine.conversation(8).await, None);
    Ok(())
}

#[tokio::test]
async fn help_is_available_to_everyone() -> anyhow::Result<()> {
    let bot = TestBot::new().await?;

    let replies = send(&bot, GUEST, Event::Command(Command::Help)).await;
    assert_eq!(screen(&replies).text, menus::HELP_TEXT);

    let replies = press(&bot, GUEST, Nav::Help).await;
    assert_eq!(screen(&replies).text, menus::HELP_TEXT);
    Ok(())
}
