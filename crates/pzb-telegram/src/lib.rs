//! Telegram side of the bot.
//!
//! `TelegramMessenger` is the teloxide implementation of the core
//! `MessagingPort`; `router` and `handlers` turn updates into bot flows.

use std::future::IntoFuture;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

pub mod handlers;
pub mod router;

use pzb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard},
    },
    Result,
};

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

fn tg_message(msg: MessageRef) -> (teloxide::types::ChatId, teloxide::types::MessageId) {
    (tg_chat(msg.chat_id), teloxide::types::MessageId(msg.message_id.0))
}

fn keyboard_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn into_core_error(what: &str, e: RequestError) -> Error {
    match e {
        RequestError::Network(e) => Error::Connection(format!("telegram {what}: {e}")),
        other => Error::External(format!("telegram {what}: {other}")),
    }
}

/// Bot API client for the messaging port.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    /// How many flood-control waits a single request may sit out.
    flood_retries: usize,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            flood_retries: 1,
        }
    }

    async fn request<T, Req>(
        &self,
        what: &str,
        mut make: impl FnMut() -> Req,
    ) -> std::result::Result<T, RequestError>
    where
        Req: IntoFuture<Output = std::result::Result<T, RequestError>>,
        Req::IntoFuture: Send,
    {
        let mut waited = 0;
        loop {
            match make().await {
                Err(RequestError::RetryAfter(wait)) if waited < self.flood_retries => {
                    waited += 1;
                    tracing::warn!(request = what, retry_after = ?wait, "telegram flood control");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.as_ref().map(keyboard_markup);
        let sent = self
            .request("sendMessage", || {
                let req = self
                    .bot
                    .send_message(tg_chat(chat_id), html)
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                match &markup {
                    Some(m) => req.reply_markup(m.clone()),
                    None => req,
                }
            })
            .await
            .map_err(|e| into_core_error("sendMessage", e))?;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        let (chat, id) = tg_message(msg);
        let markup = keyboard.as_ref().map(keyboard_markup);
        let res = self
            .request("editMessageText", || {
                let req = self
                    .bot
                    .edit_message_text(chat, id, html)
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                match &markup {
                    Some(m) => req.reply_markup(m.clone()),
                    None => req,
                }
            })
            .await;

        match res {
            // Same text again (a repeated progress line) is not a failure.
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(into_core_error("editMessageText", e)),
        }
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let (chat, id) = tg_message(msg);
        self.request("deleteMessage", || self.bot.delete_message(chat, id))
            .await
            .map_err(|e| into_core_error("deleteMessage", e))?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadDocument => teloxide::types::ChatAction::UploadDocument,
        };
        self.request("sendChatAction", || {
            self.bot.send_chat_action(tg_chat(chat_id), action)
        })
        .await
        .map_err(|e| into_core_error("sendChatAction", e))?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.request("answerCallbackQuery", || {
            let req = self.bot.answer_callback_query(callback_id);
            match text {
                Some(t) => req.text(t),
                None => req,
            }
        })
        .await
        .map_err(|e| into_core_error("answerCallbackQuery", e))?;
        Ok(())
    }
}
