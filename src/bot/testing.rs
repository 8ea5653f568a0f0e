//! Drives the engine the way the transport does, for workflow tests.

use sqlx::SqlitePool;
use time::macros::date;
use time::Date;

use super::action::Action;
use super::screen::{Reply, Screen};
use super::{Caller, Engine, Event};
use crate::test_support::{seed_admin, test_pool};

pub(crate) const ADMIN: i64 = 1000;
pub(crate) const TODAY: Date = date!(2024 - 01 - 15);

pub(crate) struct TestBot {
    pub(crate) engine: Engine,
    pub(crate) pool: SqlitePool,
}

impl TestBot {
    /// Fresh database with one admin and a clock pinned to [`TODAY`].
    pub(crate) async fn new() -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        seed_admin(&pool, ADMIN).await?;
        Ok(Self { engine: Engine::with_clock(pool.clone(), || TODAY), pool })
    }
}

pub(crate) fn caller(id: i64) -> Caller {
    Caller { id, display_name: format!("user{id}") }
}

pub(crate) async fn press(bot: &TestBot, caller_id: i64, action: impl Into<Action>) -> Vec<Reply> {
    bot.engine.handle(&caller(caller_id), Event::Button(action.into())).await
}

pub(crate) async fn type_text(bot: &TestBot, caller_id: i64, text: &str) -> Vec<Reply> {
    bot.engine.handle(&caller(caller_id), Event::Text(text.to_string())).await
}

pub(crate) async fn send(bot: &TestBot, caller_id: i64, event: Event) -> Vec<Reply> {
    bot.engine.handle(&caller(caller_id), event).await
}

/// First screen among the replies.
pub(crate) fn screen(replies: &[Reply]) -> &Screen {
    replies
        .iter()
        .find_map(|reply| match reply {
            Reply::Screen(screen) => Some(screen),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no screen in {replies:?}"))
}

pub(crate) fn notice(replies: &[Reply]) -> &str {
    replies
        .iter()
        .find_map(|reply| match reply {
            Reply::Notice(text) => Some(text.as_str()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no notice in {replies:?}"))
}
