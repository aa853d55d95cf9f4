use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{ChatAction, InlineKeyboard},
    Result,
};

/// Outbound messenger port.
///
/// Handlers talk to the chat only through this trait so flows can be exercised
/// against a recording fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    /// Replace the text (and keyboard) of an existing message.
    ///
    /// Passing `None` removes any keyboard the message had.
    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
