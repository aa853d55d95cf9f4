use pzb_core::{domain::MessageRef, menu::MenuAction, Result};

use crate::router::AppState;

use super::{actions, Sender, Surface};

/// Dispatch a menu button. Responses replace the menu message in place.
pub(crate) async fn handle_callback(
    state: &AppState,
    sender: &Sender,
    data: &str,
    origin: MessageRef,
) -> Result<()> {
    let Some(action) = MenuAction::parse(data) else {
        tracing::debug!(user = %sender.user_id, data, "unknown callback data");
        return Ok(());
    };
    tracing::debug!(user = %sender.user_id, %action, "menu action");

    let surface = Surface::Edit(origin);
    match action {
        MenuAction::Main => actions::show_main_menu(state, sender, surface, false).await,
        MenuAction::Setup => actions::start_setup(state, sender, surface).await,
        MenuAction::Upload => actions::start_upload(state, sender, surface).await,
        MenuAction::Status => actions::test_connection(state, sender, surface).await,
        MenuAction::Help => actions::show_help(state, surface).await,
        MenuAction::ViewConfig => actions::view_config(state, sender, surface).await,
        MenuAction::DeleteConfig => actions::ask_delete(state, surface).await,
        MenuAction::ConfirmDelete => actions::confirm_delete(state, sender, surface).await,
        MenuAction::CancelSetup => actions::cancel(state, sender, surface).await,
    }
}
