use super::group_buttons;
use crate::bot::action::RegisterAction;
use crate::bot::error::{BotError, BotResult};
use crate::bot::screen::Screen;
use crate::bot::{Conversation, Ctx, Transition};
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::inputs;

const ALREADY_REGISTERED: &str = "✅ Вы уже зарегистрированы в системе!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    AwaitName,
    AwaitGroup { full_name: String },
}

impl From<Step> for Conversation {
    fn from(step: Step) -> Self {
        Self::Registration(step)
    }
}

pub(crate) async fn enter(ctx: &Ctx<'_>) -> BotResult<Transition> {
    if repositories::students::find_by_telegram_id(ctx.pool, ctx.caller.id).await?.is_some() {
        return Ok(Transition::done(Screen::new(ALREADY_REGISTERED).main_menu_button()));
    }

    Ok(Transition::to(
        Step::AwaitName,
        Screen::new("👋 Давайте зарегистрируем вас в системе!\n\nВведите ваше ФИО:")
            .button("🔙 Отмена", RegisterAction::Cancel),
    ))
}

pub(crate) async fn on_text(ctx: &Ctx<'_>, step: Step, text: &str) -> BotResult<Transition> {
    let Step::AwaitName = step else {
        return Ok(Transition::use_buttons(step));
    };

    let full_name = match inputs::full_name(text) {
        Ok(full_name) => full_name,
        Err(err) => {
            let retry = Screen::new(format!("❌ {err}. Введите ваше ФИО:"));
            return Ok(Transition::to(Step::AwaitName, retry));
        }
    };

    let groups = repositories::groups::list(ctx.pool).await?;
    if groups.is_empty() {
        return Ok(Transition::done(Screen::new(
            "❌ В системе нет групп. Обратитесь к администратору.",
        )));
    }

    let screen = group_buttons(Screen::new("Выберите вашу группу:"), &groups, RegisterAction::Group)
        .button("🔙 Отмена", RegisterAction::Cancel)
        .main_menu_button();
    Ok(Transition::to(Step::AwaitGroup { full_name }, screen))
}

pub(crate) async fn on_action(
    ctx: &Ctx<'_>,
    step: Step,
    action: RegisterAction,
) -> BotResult<Transition> {
    match (step, action) {
        (_, RegisterAction::Cancel) => {
            Ok(Transition::done(Screen::new("❌ Регистрация отменена").main_menu_button()))
        }
        (Step::AwaitGroup { full_name }, RegisterAction::Group(group_id)) => {
            register(ctx, &full_name, group_id).await
        }
        (step, _) => Ok(Transition::stale(step)),
    }
}

async fn register(ctx: &Ctx<'_>, full_name: &str, group_id: i64) -> BotResult<Transition> {
    let already = || Transition::done(Screen::new(ALREADY_REGISTERED).main_menu_button());

    if repositories::students::find_by_telegram_id(ctx.pool, ctx.caller.id).await?.is_some() {
        return Ok(already());
    }

    let group = repositories::groups::find_by_id(ctx.pool, group_id)
        .await?
        .ok_or(BotError::NotFound("group"))?;

    let created = repositories::students::create(
        ctx.pool,
        full_name,
        Some(group.id),
        Some(ctx.caller.id),
        primitive_now_utc(),
    )
    .await;

    let student = match created {
        Ok(student) => student,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            tracing::warn!(user_id = ctx.caller.id, "Concurrent self-registration rejected");
            return Ok(already());
        }
        Err(err) => return Err(err.into()),
    };

    metrics::counter!(crate::core::metrics::REGISTRATIONS_TOTAL).increment(1);
    tracing::info!(
        user_id = ctx.caller.id,
        student_id = student.id,
        group_id = group.id,
        "Student self-registered"
    );

    Ok(Transition::done(
        Screen::new(format!(
            "✅ Регистрация завершена!\n\nФИО: {}\nГруппа: {}\n\n\
             Теперь вам доступны все функции бота!",
            student.full_name, group.name
        ))
        .main_menu_button(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{press, screen, type_text, TestBot};
    use crate::test_support::{seed_group, seed_student};

    const GUEST: i64 = 77;

    #[tokio::test]
    async fn registers_guest_into_chosen_group() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "CS-101").await?;

        press(&bot, GUEST, RegisterAction::Start).await;
        let replies = type_text(&bot, GUEST, "  Иванов   Иван ").await;
        assert!(screen(&replies).has(RegisterAction::Group(group.id)));

        let replies = press(&bot, GUEST, RegisterAction::Group(group.id)).await;
        assert!(screen(&replies).text.contains("Регистрация завершена"));
        assert!(bot.engine.conversation(GUEST).await.is_none());

        let student = repositories::students::find_by_telegram_id(&bot.pool, GUEST)
            .await?
            .expect("registered");
        assert_eq!(student.full_name, "Иванов Иван");
        assert_eq!(student.group_id, Some(group.id));
        Ok(())
    }

    #[tokio::test]
    async fn bound_identity_short_circuits_before_any_prompt() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "CS-101").await?;
        let existing = seed_student(&bot.pool, "Alice", group.id, Some(GUEST)).await?;

        let replies = press(&bot, GUEST, RegisterAction::Start).await;

        let shown = screen(&replies);
        assert_eq!(shown.text, ALREADY_REGISTERED);
        assert!(!shown.has(RegisterAction::Group(group.id)));
        assert!(bot.engine.conversation(GUEST).await.is_none());
        let unchanged = repositories::students::find_by_id(&bot.pool, existing.id)
            .await?
            .expect("still there");
        assert_eq!(unchanged.full_name, "Alice");
        Ok(())
    }

    #[tokio::test]
    async fn binding_raced_during_group_choice_is_not_duplicated() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        let group = seed_group(&bot.pool, "CS-101").await?;

        press(&bot, GUEST, RegisterAction::Start).await;
        type_text(&bot, GUEST, "Bob Builder").await;
        seed_student(&bot.pool, "Bob", group.id, Some(GUEST)).await?;

        let replies = press(&bot, GUEST, RegisterAction::Group(group.id)).await;

        assert!(screen(&replies).text.contains("уже зарегистрированы"));
        assert_eq!(repositories::students::list_by_group(&bot.pool, group.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_name_keeps_waiting_for_name() -> anyhow::Result<()> {
        let bot = TestBot::new().await?;
        seed_group(&bot.pool, "CS-101").await?;

        press(&bot, GUEST, RegisterAction::Start).await;
        let replies = type_text(&bot, GUEST, "x").await;

        assert!(screen(&replies).text.starts_with("❌"));
        assert_eq!(
            bot.engine.conversation(GUEST).await,
            Some(Conversation::Registration(Step::AwaitName))
        );
        Ok(())
    }
}
