use pzb_core::Result;

use crate::router::AppState;

use super::{actions, Sender, Surface};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(crate) async fn handle_command(state: &AppState, sender: &Sender, text: &str) -> Result<()> {
    let (cmd, _args) = parse_command(text);
    tracing::debug!(user = %sender.user_id, cmd = %cmd, "command");

    let surface = Surface::Send(sender.chat_id);
    match cmd.as_str() {
        "start" => actions::show_main_menu(state, sender, surface, true).await,
        "setup" => actions::start_setup(state, sender, surface).await,
        "upload" => actions::start_upload(state, sender, surface).await,
        "status" => actions::test_connection(state, sender, surface).await,
        "cancel" => actions::cancel(state, sender, surface).await,
        _ => actions::show_help(state, surface).await,
    }
}
