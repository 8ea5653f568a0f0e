//! Conversation engine: routes commands, button presses and free text to the
//! workflow that owns the caller's current step.

pub(crate) mod action;
pub(crate) mod error;
pub(crate) mod menus;
pub(crate) mod screen;
mod workflows;

use std::collections::HashMap;

use sqlx::SqlitePool;
use time::Date;
use tokio::sync::Mutex;

use crate::core::time::today_utc;
use crate::services::roles::{self, Role};
use action::{Action, Nav, Workflow};
use error::BotResult;
use screen::{Reply, Screen};
use workflows::{attendance, groups, registration, reports, students, subjects};

pub(crate) const GENERIC_FAILURE: &str = "⚠️ Произошла ошибка. Попробуйте позже.";
pub(crate) const CANCELLED: &str = "Операция отменена.";
const BUSY: &str = "⏳ Сначала завершите текущую операцию или отправьте /cancel.";
const STALE: &str = "⌛ Это меню устарело. Откройте его заново через /start.";
const USE_BUTTONS: &str = "👆 Пожалуйста, воспользуйтесь кнопками выше или отправьте /cancel.";
const NO_WORKFLOW: &str = "Используйте /start, чтобы открыть меню.";
const UNKNOWN_COMMAND: &str = "Неизвестная команда. Доступны /start, /help и /cancel.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Caller {
    pub(crate) id: i64,
    pub(crate) display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Help,
    Cancel,
    Unknown(String),
}

impl Command {
    /// Parses `/name` or `/name@bot args`; `None` when the text is not a command.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        Some(match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "cancel" => Self::Cancel,
            other => Self::Unknown(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Command(Command),
    Button(Action),
    Text(String),
}

/// Working state of the one workflow a caller may have open.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Conversation {
    Registration(registration::Step),
    Students(students::Step),
    Groups(groups::Step),
    Subjects(subjects::Step),
    Attendance(attendance::Step),
    Report(reports::Step),
}

impl Conversation {
    pub(crate) fn workflow(&self) -> Workflow {
        match self {
            Self::Registration(_) => Workflow::Registration,
            Self::Students(_) => Workflow::Students,
            Self::Groups(_) => Workflow::Groups,
            Self::Subjects(_) => Workflow::Subjects,
            Self::Attendance(_) => Workflow::Attendance,
            Self::Report(_) => Workflow::Report,
        }
    }
}

/// Outcome of one handled event: what to show and where the caller is now.
/// `next == None` is the terminal state.
#[derive(Debug)]
pub(crate) struct Transition {
    pub(crate) replies: Vec<Reply>,
    pub(crate) next: Option<Conversation>,
}

impl Transition {
    pub(crate) fn to(next: impl Into<Conversation>, screen: Screen) -> Self {
        Self { replies: vec![screen.into()], next: Some(next.into()) }
    }

    pub(crate) fn done(screen: Screen) -> Self {
        Self { replies: vec![screen.into()], next: None }
    }

    /// Keeps the caller at `step` and only acknowledges the input.
    pub(crate) fn stay(step: impl Into<Conversation>, notice: &str) -> Self {
        Self { replies: vec![Reply::Notice(notice.to_string())], next: Some(step.into()) }
    }

    pub(crate) fn stale(step: impl Into<Conversation>) -> Self {
        Self::stay(step, STALE)
    }

    pub(crate) fn use_buttons(step: impl Into<Conversation>) -> Self {
        Self::stay(step, USE_BUTTONS)
    }

    pub(crate) fn then(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }
}

/// Borrowed per-event context handed to workflow transitions.
pub(crate) struct Ctx<'a> {
    pub(crate) pool: &'a SqlitePool,
    pub(crate) caller: &'a Caller,
    pub(crate) today: Date,
}

impl Ctx<'_> {
    pub(crate) async fn role(&self) -> Role {
        roles::resolve(self.pool, self.caller.id).await
    }
}

pub(crate) struct Engine {
    pool: SqlitePool,
    conversations: Mutex<HashMap<i64, Conversation>>,
    today: fn() -> Date,
}

impl Engine {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool, conversations: Mutex::new(HashMap::new()), today: today_utc }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(pool: SqlitePool, today: fn() -> Date) -> Self {
        Self { pool, conversations: Mutex::new(HashMap::new()), today }
    }

    #[cfg(test)]
    pub(crate) async fn conversation(&self, caller_id: i64) -> Option<Conversation> {
        self.conversations.lock().await.get(&caller_id).cloned()
    }

    pub(crate) async fn handle(&self, caller: &Caller, event: Event) -> Vec<Reply> {
        let ctx = Ctx { pool: &self.pool, caller, today: (self.today)() };
        match event {
            Event::Command(command) => self.on_command(&ctx, command).await,
            Event::Button(action) => self.on_button(&ctx, action).await,
            Event::Text(text) => self.on_text(&ctx, &text).await,
        }
    }

    async fn on_command(&self, ctx: &Ctx<'_>, command: Command) -> Vec<Reply> {
        match command {
            Command::Start => {
                let result = menus::welcome(ctx).await;
                self.respond(ctx.caller.id, result).await
            }
            Command::Help => vec![Screen::new(menus::HELP_TEXT).into()],
            Command::Cancel => {
                if let Some(conversation) = self.take(ctx.caller.id).await {
                    tracing::debug!(
                        user_id = ctx.caller.id,
                        workflow = ?conversation.workflow(),
                        "Workflow cancelled"
                    );
                }
                vec![Screen::new(CANCELLED).into()]
            }
            Command::Unknown(name) => {
                tracing::debug!(user_id = ctx.caller.id, command = %name, "Unknown command");
                vec![Screen::new(UNKNOWN_COMMAND).into()]
            }
        }
    }

    async fn on_text(&self, ctx: &Ctx<'_>, text: &str) -> Vec<Reply> {
        let Some(conversation) = self.take(ctx.caller.id).await else {
            return vec![Screen::new(NO_WORKFLOW).into()];
        };

        let result = match conversation {
            Conversation::Registration(step) => registration::on_text(ctx, step, text).await,
            Conversation::Students(step) => students::on_text(ctx, step, text).await,
            Conversation::Groups(step) => groups::on_text(ctx, step, text).await,
            Conversation::Subjects(step) => subjects::on_text(ctx, step, text).await,
            Conversation::Attendance(step) => attendance::on_text(ctx, step, text).await,
            Conversation::Report(step) => reports::on_text(ctx, step, text).await,
        };
        self.finish(ctx.caller.id, result).await
    }

    async fn on_button(&self, ctx: &Ctx<'_>, action: Action) -> Vec<Reply> {
        let action = match action {
            Action::Nav(nav) => return self.on_nav(ctx, nav).await,
            other => other,
        };

        let current = self.take(ctx.caller.id).await;
        let result = match (current, action) {
            (Some(conversation), action) if Some(conversation.workflow()) != action.workflow() => {
                self.store(ctx.caller.id, Some(conversation)).await;
                return vec![Reply::Notice(BUSY.to_string())];
            }
            (_, action) if action.is_entry() => enter(ctx, action).await,
            (None, _) => return vec![Reply::Notice(STALE.to_string())],
            (Some(Conversation::Registration(step)), Action::Register(action)) => {
                registration::on_action(ctx, step, action).await
            }
            (Some(Conversation::Students(step)), Action::Students(action)) => {
                students::on_action(ctx, step, action).await
            }
            (Some(Conversation::Groups(step)), Action::Groups(action)) => {
                groups::on_action(ctx, step, action).await
            }
            (Some(Conversation::Subjects(step)), Action::Subjects(action)) => {
                subjects::on_action(ctx, step, action).await
            }
            (Some(Conversation::Attendance(step)), Action::Attendance(action)) => {
                attendance::on_action(ctx, step, action).await
            }
            (Some(Conversation::Report(step)), Action::Report(action)) => {
                reports::on_action(ctx, step, action).await
            }
            (Some(conversation), _) => Ok(Transition::stale(conversation)),
        };
        self.finish(ctx.caller.id, result).await
    }

    async fn on_nav(&self, ctx: &Ctx<'_>, nav: Nav) -> Vec<Reply> {
        let result = match nav {
            Nav::MainMenu => {
                self.take(ctx.caller.id).await;
                Ok(menus::main_menu(ctx.role().await))
            }
            Nav::Help => Ok(menus::help()),
            Nav::MyAttendance => menus::my_attendance(ctx).await,
            Nav::QuickSummary => menus::quick_summary(ctx).await,
        };
        self.respond(ctx.caller.id, result).await
    }

    /// Renders a screen that does not touch the caller's working state.
    async fn respond(&self, caller_id: i64, result: BotResult<Screen>) -> Vec<Reply> {
        match result {
            Ok(screen) => vec![screen.into()],
            Err(error) => self.fail(caller_id, error).await,
        }
    }

    async fn finish(&self, caller_id: i64, result: BotResult<Transition>) -> Vec<Reply> {
        match result {
            Ok(transition) => {
                self.store(caller_id, transition.next).await;
                transition.replies
            }
            Err(error) => self.fail(caller_id, error).await,
        }
    }

    async fn fail(&self, caller_id: i64, error: error::BotError) -> Vec<Reply> {
        metrics::counter!(crate::core::metrics::HANDLER_ERRORS_TOTAL).increment(1);
        tracing::error!(error = %error, user_id = caller_id, "Workflow step failed");
        self.take(caller_id).await;
        vec![Screen::new(GENERIC_FAILURE).into()]
    }

    async fn take(&self, caller_id: i64) -> Option<Conversation> {
        self.conversations.lock().await.remove(&caller_id)
    }

    async fn store(&self, caller_id: i64, conversation: Option<Conversation>) {
        let mut conversations = self.conversations.lock().await;
        match conversation {
            Some(conversation) => {
                conversations.insert(caller_id, conversation);
            }
            None => {
                conversations.remove(&caller_id);
            }
        }
    }
}

async fn enter(ctx: &Ctx<'_>, action: Action) -> BotResult<Transition> {
    match action.workflow() {
        Some(Workflow::Registration) => registration::enter(ctx).await,
        Some(Workflow::Students) => students::enter(ctx).await,
        Some(Workflow::Groups) => groups::enter(ctx).await,
        Some(Workflow::Subjects) => subjects::enter(ctx).await,
        Some(Workflow::Attendance) => attendance::enter(ctx).await,
        Some(Workflow::Report) => reports::enter(ctx).await,
        None => Ok(Transition::done(menus::main_menu(ctx.role().await))),
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
