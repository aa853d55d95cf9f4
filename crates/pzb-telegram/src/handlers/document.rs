use teloxide::{net::Download, prelude::*, types::Document};

use pzb_core::{errors::Error, Result};

use crate::router::AppState;

use super::{
    upload::{receive_document, DocumentInfo},
    Sender,
};

/// Teloxide glue for an incoming document; the flow lives in `upload`.
pub(crate) async fn handle_document(
    bot: &Bot,
    state: &AppState,
    sender: &Sender,
    doc: &Document,
) -> Result<()> {
    let info = DocumentInfo {
        file_name: doc.file_name.clone(),
        size: doc.file.size as u64,
    };
    receive_document(state, sender, info, || download(bot, doc)).await
}

async fn download(bot: &Bot, doc: &Document) -> Result<Vec<u8>> {
    let file = bot
        .get_file(doc.file.id.clone())
        .await
        .map_err(|e| Error::External(format!("telegram error: {e}")))?;

    let mut buf = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| Error::External(format!("download failed: {e}")))?;
    Ok(buf)
}
