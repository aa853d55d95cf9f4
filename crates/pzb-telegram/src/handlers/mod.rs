//! Telegram update handlers.
//!
//! The teloxide entry points here only extract who sent what, check the
//! allow-list, and take the chat lock. Flow logic lives in the submodules and
//! talks to Telegram through the `MessagingPort` only.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use pzb_core::{
    audit::AuditEvent,
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::types::InlineKeyboard,
    render, Result,
};

use crate::router::AppState;

mod actions;
mod callback;
mod commands;
mod document;
mod setup;
mod text;
mod upload;

#[cfg(test)]
mod test_support;

/// The user behind an update.
#[derive(Clone, Debug)]
pub struct Sender {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

impl Sender {
    fn from_user(chat_id: ChatId, user: &User) -> Self {
        Self {
            chat_id,
            user_id: UserId(user.id.0 as i64),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

/// Where a response goes: a fresh message, or an edit of the menu message
/// whose button was pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    Send(ChatId),
    Edit(MessageRef),
}

pub(crate) async fn present(
    state: &AppState,
    surface: Surface,
    html: &str,
    keyboard: Option<InlineKeyboard>,
) -> Result<MessageRef> {
    match surface {
        Surface::Send(chat_id) => state.messenger.send_html(chat_id, html, keyboard).await,
        Surface::Edit(msg) => match state.messenger.edit_html(msg, html, keyboard.clone()).await {
            Ok(()) => Ok(msg),
            Err(e) => {
                // Old or unchanged messages cannot be edited; answer below instead.
                tracing::debug!(error = %e, "edit failed; sending a new message");
                state.messenger.send_html(msg.chat_id, html, keyboard).await
            }
        },
    }
}

/// Log, audit and tell the user about a failure that escaped a flow.
pub(crate) async fn report_failure(state: &AppState, sender: &Sender, context: &str, err: &Error) {
    tracing::error!(user = %sender.user_id, context, error = %err, "handler failed");
    state.audit.record(AuditEvent::error(
        sender.user_id,
        sender.username.as_deref(),
        &err.to_string(),
        context,
    ));
    let _ = state
        .messenger
        .send_html(
            sender.chat_id,
            &render::generic_error(err),
            Some(pzb_core::menu::back_to_menu()),
        )
        .await;
}

fn check_access(state: &AppState, sender: &Sender) -> bool {
    if state.cfg.is_allowed(sender.user_id.0) {
        return true;
    }
    tracing::warn!(user = %sender.user_id, "unauthorized access attempt");
    state.audit.record(AuditEvent::auth(
        sender.user_id,
        sender.username.as_deref(),
        false,
    ));
    false
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();
    let Some(msg) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let chat_id = ChatId(msg.chat.id.0);
    let sender = Sender::from_user(chat_id, &q.from);
    let origin = MessageRef {
        chat_id,
        message_id: MessageId(msg.id.0),
    };

    if !check_access(&state, &sender) {
        let _ = state
            .messenger
            .answer_callback_query(&q.id, Some("Unauthorized"))
            .await;
        return Ok(());
    }

    let _ = state.messenger.answer_callback_query(&q.id, None).await;

    let _guard = state.chat_locks.lock(chat_id).await;
    if let Err(e) = callback::handle_callback(&state, &sender, &data, origin).await {
        report_failure(&state, &sender, "callback", &e).await;
    }
    Ok(())
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);
    let sender = Sender::from_user(chat_id, user);

    if !check_access(&state, &sender) {
        let _ = state
            .messenger
            .send_html(chat_id, render::unauthorized(), None)
            .await;
        return Ok(());
    }

    let _guard = state.chat_locks.lock(chat_id).await;
    let this_msg = MessageRef {
        chat_id,
        message_id: MessageId(msg.id.0),
    };

    let res = if let Some(doc) = msg.document() {
        document::handle_document(&bot, &state, &sender, doc).await
    } else if let Some(txt) = msg.text() {
        if txt.starts_with('/') {
            commands::handle_command(&state, &sender, txt).await
        } else {
            text::handle_text(&state, &sender, txt, this_msg).await
        }
    } else {
        text::handle_other(&state, &sender).await
    };

    if let Err(e) = res {
        report_failure(&state, &sender, "message", &e).await;
    }
    Ok(())
}
