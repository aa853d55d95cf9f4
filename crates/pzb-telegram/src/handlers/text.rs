use pzb_core::{domain::MessageRef, menu, render, wizard::Conversation, Result};

use crate::router::AppState;

use super::{actions, setup, Sender, Surface};

/// Plain text: a wizard answer, a misplaced upload, or a nudge to the menu.
pub(crate) async fn handle_text(
    state: &AppState,
    sender: &Sender,
    text: &str,
    this_msg: MessageRef,
) -> Result<()> {
    match state.conversations.get(sender.user_id).await {
        Conversation::Setup(wizard) => {
            setup::handle_setup_text(state, sender, wizard, text, this_msg).await
        }
        Conversation::AwaitingUpload => send_as_document(state, sender).await,
        Conversation::Idle => {
            actions::show_main_menu(state, sender, Surface::Send(sender.chat_id), false).await
        }
    }
}

/// Stickers, photos and anything else without text or a document.
pub(crate) async fn handle_other(state: &AppState, sender: &Sender) -> Result<()> {
    match state.conversations.get(sender.user_id).await {
        Conversation::AwaitingUpload => send_as_document(state, sender).await,
        _ => actions::show_main_menu(state, sender, Surface::Send(sender.chat_id), false).await,
    }
}

async fn send_as_document(state: &AppState, sender: &Sender) -> Result<()> {
    state
        .messenger
        .send_html(sender.chat_id, render::send_as_document(), Some(menu::cancel()))
        .await?;
    Ok(())
}
