//! Receiving a hostname file and publishing it.

use std::future::Future;

use async_trait::async_trait;

use pzb_core::{
    audit::AuditEvent,
    domain::MessageRef,
    menu,
    messaging::types::ChatAction,
    publish::{PublishProgress, PublishStep, MAX_UPLOAD_BYTES},
    render::{self, Operation},
    wizard::Conversation,
    Result,
};

use crate::router::AppState;

use super::Sender;

/// What Telegram told us about a document before downloading it.
#[derive(Clone, Debug)]
pub(crate) struct DocumentInfo {
    pub file_name: Option<String>,
    pub size: u64,
}

/// Edits one status message as the publish moves along.
struct StatusProgress<'a> {
    state: &'a AppState,
    status: MessageRef,
}

#[async_trait]
impl PublishProgress for StatusProgress<'_> {
    async fn on_step(&self, step: &PublishStep, done: &[PublishStep]) {
        let html = render::progress(step, done);
        if let Err(e) = self.state.messenger.edit_html(self.status, &html, None).await {
            tracing::debug!(error = %e, "progress edit failed");
        }
    }
}

/// Handle a document sent to the bot. `fetch` downloads its bytes.
pub(crate) async fn receive_document<F, Fut>(
    state: &AppState,
    sender: &Sender,
    info: DocumentInfo,
    fetch: F,
) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let chat = sender.chat_id;

    if state.conversations.get(sender.user_id).await != Conversation::AwaitingUpload {
        state
            .messenger
            .send_html(chat, render::upload_not_started(), Some(menu::back_to_menu()))
            .await?;
        return Ok(());
    }

    let Some(rec) = state.store.load(sender.user_id)? else {
        state.conversations.clear(sender.user_id).await;
        state
            .messenger
            .send_html(chat, render::not_configured(), Some(menu::back_to_menu()))
            .await?;
        return Ok(());
    };

    if info.size > MAX_UPLOAD_BYTES {
        tracing::info!(user = %sender.user_id, size = info.size, "upload rejected: too large");
        state
            .messenger
            .send_html(chat, &render::file_too_large(info.size), Some(menu::cancel()))
            .await?;
        return Ok(());
    }

    let status = state
        .messenger
        .send_html(chat, render::downloading(), None)
        .await?;

    let raw = match fetch().await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(user = %sender.user_id, error = %e, "document download failed");
            state
                .messenger
                .edit_html(status, &render::download_failed(&e), Some(menu::cancel()))
                .await?;
            return Ok(());
        }
    };

    // Whatever happens from here, the upload attempt is over.
    state.conversations.clear(sender.user_id).await;
    let _ = state
        .messenger
        .send_chat_action(chat, ChatAction::UploadDocument)
        .await;

    tracing::info!(
        user = %sender.user_id,
        file = info.file_name.as_deref().unwrap_or("-"),
        bytes = raw.len(),
        "publishing upload"
    );
    let progress = StatusProgress { state, status };
    let res = state
        .publisher
        .publish_payload(
            &rec,
            &raw,
            info.file_name.as_deref(),
            &state.cfg.temp_dir,
            &progress,
        )
        .await;

    state.audit.record(AuditEvent::upload(
        sender.user_id,
        sender.username.as_deref(),
        &rec.host,
        res.as_ref().map(|r| &r.published),
    ));

    let html = match &res {
        Ok(report) => render::upload_success(report, &rec.remote_path),
        Err(e) => {
            if !e.is_remote() {
                tracing::error!(user = %sender.user_id, error = %e, "upload failed before publishing");
            }
            render::operation_error(e, Operation::Upload, Some(&rec))
        }
    };
    if let Err(e) = state
        .messenger
        .edit_html(status, &html, Some(menu::back_to_menu()))
        .await
    {
        tracing::debug!(error = %e, "final status edit failed; sending instead");
        state
            .messenger
            .send_html(chat, &html, Some(menu::back_to_menu()))
            .await?;
    }
    Ok(())
}
