//! Setup wizard turns.

use pzb_core::{
    audit::AuditEvent,
    domain::MessageRef,
    menu, render,
    wizard::{Conversation, SetupState, WizardEffect, WizardInput},
    Result,
};

use crate::router::AppState;

use super::Sender;

/// Feed one text message into an open wizard.
pub(crate) async fn handle_setup_text(
    state: &AppState,
    sender: &Sender,
    setup: SetupState,
    text: &str,
    this_msg: MessageRef,
) -> Result<()> {
    let t = setup.advance(WizardInput::Text(text.to_string()));

    if t.delete_input {
        if let Err(e) = state.messenger.delete_message(this_msg).await {
            tracing::warn!(user = %sender.user_id, error = %e, "could not delete password message");
        }
    }
    state
        .conversations
        .set(sender.user_id, Conversation::Setup(t.state))
        .await;

    let chat = sender.chat_id;
    match t.effect {
        WizardEffect::Prompt(step) => {
            state
                .messenger
                .send_html(chat, &render::setup_prompt(step), Some(menu::cancel()))
                .await?;
        }
        WizardEffect::Reprompt { step, reason } => {
            tracing::debug!(user = %sender.user_id, ?step, %reason, "setup input rejected");
            state
                .messenger
                .send_html(chat, &render::setup_reprompt(&reason), Some(menu::cancel()))
                .await?;
        }
        WizardEffect::Completed(rec) => {
            state
                .messenger
                .send_html(chat, render::saving_config(), None)
                .await?;

            let saved = rec.validate().and_then(|()| state.store.save(sender.user_id, &rec));
            match saved {
                Ok(()) => {
                    tracing::info!(user = %sender.user_id, host = %rec.host, "ftp configuration saved");
                    state.audit.record(AuditEvent::setup(
                        sender.user_id,
                        sender.username.as_deref(),
                        &rec.host,
                        &rec.remote_path,
                    ));
                    let html = render::config_saved(&rec, &state.cfg.credentials_file);
                    state
                        .messenger
                        .send_html(chat, &html, Some(menu::back_to_menu()))
                        .await?;
                }
                Err(e) => {
                    tracing::error!(user = %sender.user_id, error = %e, "saving ftp configuration failed");
                    state
                        .messenger
                        .send_html(chat, &render::save_failed(&e), Some(menu::back_to_menu()))
                        .await?;
                }
            }
        }
        WizardEffect::Cancelled => {
            state
                .messenger
                .send_html(chat, render::setup_cancelled(), Some(menu::back_to_menu()))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pzb_core::{domain::MessageId, wizard::SetupStep};

    use super::*;
    use crate::handlers::{
        actions::start_setup,
        test_support::{sender, Harness, REMOTE_DIR},
        text::handle_text,
        Surface,
    };

    fn msg(id: i32) -> MessageRef {
        MessageRef {
            chat_id: sender().chat_id,
            message_id: MessageId(id),
        }
    }

    #[tokio::test]
    async fn wizard_saves_record_and_deletes_password_message() {
        let h = Harness::new();
        let s = sender();
        start_setup(&h.state, &s, Surface::Send(s.chat_id))
            .await
            .unwrap();

        for (i, input) in ["ftp.example.com", "21", "alice", "hunter2", REMOTE_DIR]
            .into_iter()
            .enumerate()
        {
            handle_text(&h.state, &s, input, msg(i as i32 + 1))
                .await
                .unwrap();
        }

        assert_eq!(h.messenger.deleted(), vec![msg(4)]);
        let saved = h.state.store.load(s.user_id).unwrap().unwrap();
        assert_eq!(saved.host, "ftp.example.com");
        assert_eq!(saved.password, "hunter2");
        assert_eq!(saved.remote_path, REMOTE_DIR);

        let out = h.messenger.outputs();
        assert!(out.iter().all(|o| !o.html.contains("hunter2")));
        assert!(h.messenger.last().html.contains("Saved Permanently"));
        assert_eq!(h.state.conversations.get(s.user_id).await, Conversation::Idle);
        assert!(h.audit_log().contains("setup"));
    }

    #[tokio::test]
    async fn rejected_port_keeps_wizard_on_port() {
        let h = Harness::new();
        let s = sender();
        let state = SetupState::AwaitingPort {
            host: "ftp.example.com".to_string(),
        };
        handle_setup_text(&h.state, &s, state, "70000", msg(1))
            .await
            .unwrap();

        assert!(h.messenger.last().html.contains("Please try again"));
        let Conversation::Setup(open) = h.state.conversations.get(s.user_id).await else {
            panic!("wizard should still be open");
        };
        assert_eq!(open.step(), Some(SetupStep::Port));
        assert!(h.messenger.deleted().is_empty());
    }
}
