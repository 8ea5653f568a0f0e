//! Long-polling runtime: pulls updates, turns them into engine events and
//! delivers the replies back through the chat API.

pub(crate) mod api;

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::bot::action::Action;
use crate::bot::screen::{Reply, Screen};
use crate::bot::{Caller, Command, Engine, Event};
use crate::core::shutdown;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use api::{ChatTransport, TelegramClient, TgCallbackQuery, TgMessage, TgUpdate};

const BOT_NAME: &str = "unihelper";
const RETRY_DELAY: Duration = Duration::from_secs(3);
const PRIVATE_CHAT_HINT: &str =
    "👋 Я работаю только в личных сообщениях. Напишите мне в личный чат и отправьте /start.";

/// One decoded update, ready for the engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Inbound {
    pub(crate) caller: Caller,
    pub(crate) chat_id: i64,
    /// Message carrying the pressed button; screens for button events replace it.
    pub(crate) origin_message_id: Option<i64>,
    pub(crate) callback_id: Option<String>,
    pub(crate) event: Event,
}

#[derive(Debug, PartialEq)]
enum Decoded {
    Inbound(Inbound),
    GroupChat { chat_id: i64 },
    /// Button pressed under a message in a group chat.
    GroupCallback { callback_id: String },
    /// Callback data this build does not understand, e.g. a button from an
    /// older release.
    Undecodable { callback_id: String, data: String },
    Ignored,
}

fn decode_update(update: TgUpdate) -> Decoded {
    if let Some(callback) = update.callback_query {
        return decode_callback(callback);
    }
    match update.message {
        Some(message) => decode_message(message),
        None => Decoded::Ignored,
    }
}

fn decode_message(message: TgMessage) -> Decoded {
    let (Some(from), Some(text)) = (message.from, message.text) else {
        return Decoded::Ignored;
    };
    if !message.chat.is_private() {
        return if text.starts_with('/') {
            Decoded::GroupChat { chat_id: message.chat.id }
        } else {
            Decoded::Ignored
        };
    }

    let event = match Command::parse(&text) {
        Some(command) => Event::Command(command),
        None => Event::Text(text),
    };
    Decoded::Inbound(Inbound {
        caller: Caller { id: from.id, display_name: from.display_name() },
        chat_id: message.chat.id,
        origin_message_id: None,
        callback_id: None,
        event,
    })
}

fn decode_callback(callback: TgCallbackQuery) -> Decoded {
    let data = callback.data.unwrap_or_default();
    let Some(message) = callback.message else {
        return Decoded::Undecodable { callback_id: callback.id, data };
    };
    if !message.chat.is_private() {
        return Decoded::GroupCallback { callback_id: callback.id };
    }

    match Action::decode(&data) {
        Ok(action) => Decoded::Inbound(Inbound {
            caller: Caller { id: callback.from.id, display_name: callback.from.display_name() },
            chat_id: message.chat.id,
            origin_message_id: Some(message.message_id),
            callback_id: Some(callback.id),
            event: Event::Button(action),
        }),
        Err(error) => {
            tracing::warn!(error = %error, user_id = callback.from.id, "Ignoring callback data");
            Decoded::Undecodable { callback_id: callback.id, data }
        }
    }
}

pub(crate) struct TelegramBotRuntime<T> {
    engine: Engine,
    pool: SqlitePool,
    transport: T,
    hinted_chats: HashSet<i64>,
}

impl<T: ChatTransport> TelegramBotRuntime<T> {
    pub(crate) fn new(pool: SqlitePool, transport: T) -> Self {
        Self { engine: Engine::new(pool.clone()), pool, transport, hinted_chats: HashSet::new() }
    }

    #[cfg(test)]
    fn with_engine(pool: SqlitePool, engine: Engine, transport: T) -> Self {
        Self { engine, pool, transport, hinted_chats: HashSet::new() }
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        tracing::info!("Bot runtime started");

        let mut offset = repositories::bot_offsets::get_update_offset(&self.pool, BOT_NAME)
            .await
            .context("Failed to load persisted updates offset")?
            .unwrap_or(0);

        loop {
            let updates = match self.transport.get_updates(offset).await {
                Ok(updates) => updates,
                Err(error) => {
                    tracing::error!(error = %error, "Failed to fetch updates");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = update.update_id + 1;
                let update_id = update.update_id;
                if let Err(error) = self.process(update).await {
                    tracing::error!(error = %error, update_id, "Failed to handle update");
                }
                if let Err(error) = repositories::bot_offsets::upsert_update_offset(
                    &self.pool,
                    BOT_NAME,
                    offset,
                    primitive_now_utc(),
                )
                .await
                {
                    tracing::error!(error = %error, offset, "Failed to persist updates offset");
                }
            }
        }
    }

    async fn process(&mut self, update: TgUpdate) -> Result<()> {
        metrics::counter!(crate::core::metrics::UPDATES_TOTAL).increment(1);

        match decode_update(update) {
            Decoded::Inbound(inbound) => {
                let replies = self.engine.handle(&inbound.caller, inbound.event.clone()).await;
                self.deliver(&inbound, replies).await
            }
            Decoded::GroupChat { chat_id } => {
                if self.hinted_chats.insert(chat_id) {
                    self.transport.send_message(chat_id, &Screen::new(PRIVATE_CHAT_HINT)).await?;
                }
                Ok(())
            }
            Decoded::GroupCallback { callback_id } => {
                self.transport.answer_callback(&callback_id, None).await
            }
            Decoded::Undecodable { callback_id, data } => {
                tracing::debug!(data = %data, "Acknowledging undecodable callback");
                self.transport.answer_callback(&callback_id, None).await
            }
            Decoded::Ignored => Ok(()),
        }
    }

    async fn deliver(&self, inbound: &Inbound, replies: Vec<Reply>) -> Result<()> {
        // Stop the client spinner first; a notice becomes the toast.
        if let Some(callback_id) = &inbound.callback_id {
            let toast = replies.iter().find_map(|reply| match reply {
                Reply::Notice(text) => Some(text.as_str()),
                _ => None,
            });
            // The engine has already committed; a lost toast must not drop the screens.
            if let Err(error) = self.transport.answer_callback(callback_id, toast).await {
                metrics::counter!(crate::core::metrics::TRANSPORT_ERRORS_TOTAL).increment(1);
                tracing::warn!(
                    error = %error,
                    user_id = inbound.caller.id,
                    "Failed to answer callback query"
                );
            }
        }

        let mut origin = inbound.origin_message_id;
        for reply in replies {
            match reply {
                Reply::Screen(screen) => match origin.take() {
                    Some(message_id) => {
                        self.transport.edit_message(inbound.chat_id, message_id, &screen).await?
                    }
                    None => self.transport.send_message(inbound.chat_id, &screen).await?,
                },
                Reply::Notice(text) if inbound.callback_id.is_none() => {
                    self.transport.send_message(inbound.chat_id, &Screen::new(text)).await?
                }
                Reply::Notice(_) => {}
                Reply::Document { filename, bytes, caption } => {
                    self.transport
                        .send_document(inbound.chat_id, &filename, bytes, &caption)
                        .await?
                }
            }
        }
        Ok(())
    }
}

/// Polls until SIGINT/SIGTERM.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let client = TelegramClient::new(state.settings().telegram())?;
    let runtime = TelegramBotRuntime::new(state.db().clone(), client);

    tokio::select! {
        result = runtime.run() => result,
        reason = shutdown::wait_for_signal() => {
            tracing::info!(signal = reason.as_str(), "Bot runtime stopping");
            Ok(())
        }
    }
}
