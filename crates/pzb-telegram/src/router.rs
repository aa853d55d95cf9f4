use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use pzb_core::{
    audit::AuditLogger, config::Config, domain::ChatId, messaging::port::MessagingPort,
    publish::Publisher, store::CredentialStore, wizard::ConversationBook,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<dyn CredentialStore>,
    pub publisher: Arc<Publisher>,
    pub messenger: Arc<dyn MessagingPort>,
    pub conversations: Arc<ConversationBook>,
    pub chat_locks: Arc<ChatLocks>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn CredentialStore>,
        publisher: Arc<Publisher>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        Self {
            cfg,
            store,
            publisher,
            messenger,
            conversations: Arc::new(ConversationBook::default()),
            chat_locks: Arc::new(ChatLocks::default()),
            audit,
        }
    }
}

/// Serializes updates per chat so one user's flow never runs twice at once.
#[derive(Default)]
pub struct ChatLocks {
    chats: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock(&self, chat: ChatId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut chats = self.chats.lock().await;
            // Forget chats nobody holds or waits on.
            chats.retain(|_, m| Arc::strong_count(m) > 1);
            chats.entry(chat).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.chats.lock().await.len()
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn CredentialStore>,
    publisher: Arc<Publisher>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(bot = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    if cfg.telegram_allowed_users.is_empty() {
        tracing::warn!("TELEGRAM_ALLOWED_USERS is empty; every Telegram user may use this bot");
    } else {
        tracing::info!(
            allowed = cfg.telegram_allowed_users.len(),
            "access restricted to allow-list"
        );
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState::new(cfg, store, publisher, messenger));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    tracing::info!("listening for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn chat_locks_serialize_same_chat_only() {
        let locks = ChatLocks::default();
        let first = locks.lock(ChatId(1)).await;

        let other = tokio::time::timeout(Duration::from_millis(100), locks.lock(ChatId(2))).await;
        assert!(other.is_ok());

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock(ChatId(1))).await;
        assert!(blocked.is_err());
        drop(first);
        let again = tokio::time::timeout(Duration::from_millis(100), locks.lock(ChatId(1))).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn idle_chats_are_forgotten() {
        let locks = ChatLocks::default();
        for id in 0..10 {
            drop(locks.lock(ChatId(id)).await);
        }
        let _held = locks.lock(ChatId(99)).await;
        assert_eq!(locks.tracked().await, 1);
    }
}
