//! Menu-level operations shared by commands and buttons.

use pzb_core::{
    audit::AuditEvent,
    menu,
    messaging::types::ChatAction,
    render::{self, Operation},
    store::DeleteOutcome,
    wizard::{Conversation, SetupState, SetupStep},
    Result,
};

use crate::router::AppState;

use super::{present, Sender, Surface};

pub(crate) async fn show_main_menu(
    state: &AppState,
    sender: &Sender,
    surface: Surface,
    greet: bool,
) -> Result<()> {
    let has_config = state.store.load(sender.user_id)?.is_some();
    let html = if greet {
        render::welcome(&sender.first_name, has_config)
    } else {
        render::main_menu(has_config)
    };
    present(state, surface, &html, Some(menu::main_menu(has_config))).await?;
    Ok(())
}

pub(crate) async fn show_help(state: &AppState, surface: Surface) -> Result<()> {
    present(state, surface, &render::help(), Some(menu::back_to_menu())).await?;
    Ok(())
}

/// Open (or restart) the setup wizard.
pub(crate) async fn start_setup(state: &AppState, sender: &Sender, surface: Surface) -> Result<()> {
    let (setup, _) = SetupState::start();
    let step = setup.step().unwrap_or(SetupStep::Host);
    tracing::debug!(user = %sender.user_id, "setup started");
    state
        .conversations
        .set(sender.user_id, Conversation::Setup(setup))
        .await;
    let html = render::setup_prompt(step);
    present(state, surface, &html, Some(menu::cancel())).await?;
    Ok(())
}

pub(crate) async fn start_upload(state: &AppState, sender: &Sender, surface: Surface) -> Result<()> {
    let Some(rec) = state.store.load(sender.user_id)? else {
        present(
            state,
            surface,
            render::not_configured(),
            Some(menu::back_to_menu()),
        )
        .await?;
        return Ok(());
    };

    state
        .conversations
        .set(sender.user_id, Conversation::AwaitingUpload)
        .await;
    present(
        state,
        surface,
        &render::upload_instructions(&rec.remote_path),
        Some(menu::cancel()),
    )
    .await?;
    Ok(())
}

pub(crate) async fn test_connection(
    state: &AppState,
    sender: &Sender,
    surface: Surface,
) -> Result<()> {
    let Some(rec) = state.store.load(sender.user_id)? else {
        present(
            state,
            surface,
            render::not_configured(),
            Some(menu::back_to_menu()),
        )
        .await?;
        return Ok(());
    };

    let status = present(state, surface, render::testing_connection(), None).await?;
    let _ = state
        .messenger
        .send_chat_action(sender.chat_id, ChatAction::Typing)
        .await;
    let res = state.publisher.test_connection(&rec).await;

    let html = match &res {
        Ok(report) => render::connection_ok(&rec, report),
        Err(e) => {
            tracing::error!(user = %sender.user_id, host = %rec.host, error = %e, "connection test failed");
            render::operation_error(e, Operation::ConnectionTest, Some(&rec))
        }
    };
    state.audit.record(AuditEvent::connection_test(
        sender.user_id,
        sender.username.as_deref(),
        &rec.host,
        res.as_ref().err(),
    ));

    present(state, Surface::Edit(status), &html, Some(menu::back_to_menu())).await?;
    Ok(())
}

pub(crate) async fn view_config(state: &AppState, sender: &Sender, surface: Surface) -> Result<()> {
    match state.store.load(sender.user_id)? {
        Some(rec) => {
            let html = render::config_view(&rec, &state.cfg.credentials_file);
            present(state, surface, &html, Some(menu::config_view())).await?;
        }
        None => {
            present(
                state,
                surface,
                render::not_configured(),
                Some(menu::back_to_menu()),
            )
            .await?;
        }
    }
    Ok(())
}

pub(crate) async fn ask_delete(state: &AppState, surface: Surface) -> Result<()> {
    present(
        state,
        surface,
        render::delete_confirm(),
        Some(menu::delete_confirmation()),
    )
    .await?;
    Ok(())
}

pub(crate) async fn confirm_delete(
    state: &AppState,
    sender: &Sender,
    surface: Surface,
) -> Result<()> {
    let html = match state.store.delete(sender.user_id) {
        Ok(DeleteOutcome::Deleted) => {
            state.audit.record(AuditEvent::delete_config(
                sender.user_id,
                sender.username.as_deref(),
                true,
            ));
            render::config_deleted().to_string()
        }
        Ok(DeleteOutcome::NothingToDelete) => render::nothing_to_delete().to_string(),
        Err(e) => {
            tracing::error!(user = %sender.user_id, error = %e, "deleting credentials failed");
            state.audit.record(AuditEvent::delete_config(
                sender.user_id,
                sender.username.as_deref(),
                false,
            ));
            render::delete_failed(&e)
        }
    };
    present(state, surface, &html, Some(menu::back_to_menu())).await?;
    Ok(())
}

/// Leave whatever flow is open.
pub(crate) async fn cancel(state: &AppState, sender: &Sender, surface: Surface) -> Result<()> {
    let html = match state.conversations.clear(sender.user_id).await {
        Conversation::Setup(_) => render::setup_cancelled(),
        Conversation::AwaitingUpload => render::upload_cancelled(),
        Conversation::Idle => render::nothing_to_cancel(),
    };
    present(state, surface, html, Some(menu::back_to_menu())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pzb_core::{domain::ChatId, publish::TARGET_NAME};

    use super::*;
    use crate::handlers::test_support::{record, sender, Harness};

    #[tokio::test]
    async fn main_menu_reflects_saved_config() {
        let h = Harness::new();
        let s = sender();
        show_main_menu(&h.state, &s, Surface::Send(ChatId(1)), true)
            .await
            .unwrap();
        let first = h.messenger.last();
        assert!(first.html.contains("Not configured"));
        assert!(!first.callback_ids().contains(&"menu_view_config".to_string()));

        h.state.store.save(s.user_id, &record()).unwrap();
        show_main_menu(&h.state, &s, Surface::Send(ChatId(1)), false)
            .await
            .unwrap();
        let second = h.messenger.last();
        assert!(second.html.contains("Configured"));
        assert!(second.callback_ids().contains(&"menu_view_config".to_string()));
    }

    #[tokio::test]
    async fn upload_without_config_does_not_wait_for_file() {
        let h = Harness::new();
        let s = sender();
        start_upload(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();
        assert!(h.messenger.last().html.contains("No FTP Configuration Found"));
        assert_eq!(
            h.state.conversations.get(s.user_id).await,
            Conversation::Idle
        );
    }

    #[tokio::test]
    async fn connection_test_edits_status_message() {
        let h = Harness::new();
        h.fs_insert(TARGET_NAME, b"old\n");
        let s = sender();
        h.state.store.save(s.user_id, &record()).unwrap();

        test_connection(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();

        let out = h.messenger.outputs();
        assert_eq!(out.len(), 2);
        assert!(out[0].html.contains("Testing FTP Connection"));
        assert!(out[1].edited);
        assert!(out[1].html.contains("Connection Successful"));
        assert!(out[1].html.contains("✅ Found"));
    }

    #[tokio::test]
    async fn delete_flow_reports_outcome() {
        let h = Harness::new();
        let s = sender();
        h.state.store.save(s.user_id, &record()).unwrap();

        confirm_delete(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();
        assert!(h.messenger.last().html.contains("Configuration Deleted"));
        assert!(h.state.store.load(s.user_id).unwrap().is_none());

        confirm_delete(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();
        assert!(h.messenger.last().html.contains("No configuration found"));
    }

    #[tokio::test]
    async fn view_config_masks_password() {
        let h = Harness::new();
        let s = sender();
        h.state.store.save(s.user_id, &record()).unwrap();
        view_config(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();
        let out = h.messenger.last();
        assert!(!out.html.contains(&record().password));
        assert_eq!(
            out.callback_ids(),
            vec!["menu_setup", "delete_config", "menu_main"]
        );
    }

    #[tokio::test]
    async fn cancel_names_the_flow_it_left() {
        let h = Harness::new();
        let s = sender();
        h.state
            .conversations
            .set(s.user_id, Conversation::AwaitingUpload)
            .await;
        cancel(&h.state, &s, Surface::Send(s.chat_id)).await.unwrap();
        assert!(h.messenger.last().html.contains("Upload cancelled"));

        cancel(&h.state, &s, Surface::Send(s.chat_id)).await.unwrap();
        assert!(h.messenger.last().html.contains("Nothing to cancel"));
    }
}
