//! Telegram HTML for every message the bot sends.
//!
//! Anything that came from a user or a remote server goes through
//! [`escape_html`] before it is interpolated.

use std::path::Path;

use crate::{
    credentials::CredentialRecord,
    errors::Error,
    publish::{ConnectionReport, PublishStep, UploadReport, MAX_UPLOAD_BYTES, TARGET_NAME},
    wizard::SetupStep,
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Which flow an error message is for; the hints differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Upload,
    ConnectionTest,
}

fn status_lines(has_config: bool) -> (&'static str, &'static str) {
    if has_config {
        (
            "✅ <b>Configured &amp; Saved</b> (Permanent)",
            "Your FTP credentials are saved and ready to use!",
        )
    } else {
        (
            "❌ Not configured",
            "Setup your FTP credentials once - they'll be saved permanently!",
        )
    }
}

/// `/start` greeting.
pub fn welcome(first_name: &str, has_config: bool) -> String {
    format!(
        "👋 Hello <b>{}</b>!\n\n{}",
        escape_html(first_name),
        main_menu(has_config)
    )
}

pub fn main_menu(has_config: bool) -> String {
    let (status, info) = status_lines(has_config);
    format!(
        "🤖 <b>FTP Pullzone Bot</b>\n\n\
         FTP Status: {status}\n\
         {info}\n\n\
         Select an option below:"
    )
}

pub fn help() -> String {
    format!(
        "📖 <b>How to use FTP Pullzone Bot:</b>\n\n\
         <b>1️⃣ Setup FTP:</b>\n\
         Configure your FTP server credentials (host, port, username, password, and path)\n\n\
         <b>2️⃣ Upload File:</b>\n\
         Send any text file and the bot will:\n\
         \u{20}  • Clean each line down to a bare hostname\n\
         \u{20}  • Upload it to your FTP directory\n\
         \u{20}  • Replace the old {TARGET_NAME}\n\n\
         <b>3️⃣ Test Connection:</b>\n\
         Verify your FTP credentials are working\n\n\
         <b>Commands:</b> /start /setup /upload /status /cancel /help\n\n\
         <b>🔒 Security:</b>\n\
         All connections use TLS encryption for security."
    )
}

pub fn unauthorized() -> &'static str {
    "⛔ Unauthorized. Contact the bot owner for access."
}

// ============== Setup wizard ==============

/// Ask for `step`, acknowledging the field collected before it.
pub fn setup_prompt(step: SetupStep) -> String {
    match step {
        SetupStep::Host => "🔧 <b>FTP Configuration Setup</b>\n\n\
             Please enter the <b>FTP Host</b>\n\
             Example: 103.194.228.117"
            .to_string(),
        SetupStep::Port => "✅ FTP Host saved\n\n\
             Now enter the <b>FTP Port</b>\n\
             Usually: 21"
            .to_string(),
        SetupStep::User => "✅ FTP Port saved\n\n\
             Now enter your <b>FTP Username</b>:"
            .to_string(),
        SetupStep::Password => "✅ FTP Username saved\n\n\
             Now enter your <b>FTP Password</b>:"
            .to_string(),
        SetupStep::Path => "✅ FTP Password saved (message deleted for security)\n\n\
             Now enter the <b>FTP Path</b>\n\
             Example: /public_html/v1/pullzoneurls"
            .to_string(),
    }
}

pub fn setup_reprompt(reason: &str) -> String {
    format!("❌ {}\n\nPlease try again:", escape_html(reason))
}

pub fn saving_config() -> &'static str {
    "💾 Saving configuration..."
}

pub fn config_saved(rec: &CredentialRecord, store_path: &Path) -> String {
    format!(
        "✅ <b>FTP Configuration Saved Permanently!</b>\n\n\
         📡 Host: <code>{}</code>\n\
         👤 User: <code>{}</code>\n\
         📂 Path: <code>{}</code>\n\n\
         💾 <b>Your credentials are saved in: {}</b>\n\
         ✨ You won't need to setup again - use /start to upload anytime!",
        escape_html(&rec.address()),
        escape_html(&rec.user),
        escape_html(&rec.remote_path),
        escape_html(&file_label(store_path)),
    )
}

pub fn save_failed(err: &Error) -> String {
    format!(
        "❌ Failed to save configuration: <code>{}</code>\n\n\
         Please try setup again with /setup",
        escape_html(&err.detail())
    )
}

pub fn setup_cancelled() -> &'static str {
    "❌ FTP setup cancelled."
}

pub fn upload_cancelled() -> &'static str {
    "❌ Upload cancelled."
}

pub fn nothing_to_cancel() -> &'static str {
    "ℹ️ Nothing to cancel."
}

// ============== Saved configuration ==============

pub fn not_configured() -> &'static str {
    "❌ <b>No FTP Configuration Found</b>\n\n\
     Please setup your FTP credentials first."
}

pub fn config_view(rec: &CredentialRecord, store_path: &Path) -> String {
    format!(
        "💾 <b>Saved FTP Configuration</b>\n\n\
         📡 <b>Host:</b> <code>{}</code>\n\
         🔌 <b>Port:</b> <code>{}</code>\n\
         👤 <b>Username:</b> <code>{}</code>\n\
         🔒 <b>Password:</b> <code>{}</code>\n\
         📂 <b>Path:</b> <code>{}</code>\n\n\
         💡 <b>Config file:</b> {}\n\
         ✅ This configuration is <b>permanent</b> - saved locally!",
        escape_html(&rec.host),
        rec.port,
        escape_html(&rec.user),
        escape_html(&rec.masked_password()),
        escape_html(&rec.remote_path),
        escape_html(&file_label(store_path)),
    )
}

pub fn delete_confirm() -> &'static str {
    "⚠️ <b>Delete FTP Configuration?</b>\n\n\
     Are you sure you want to delete your saved FTP credentials?\n\n\
     You'll need to setup again to upload files."
}

pub fn config_deleted() -> &'static str {
    "✅ <b>Configuration Deleted</b>\n\n\
     Your FTP credentials have been removed.\n\
     Use Setup to configure again."
}

pub fn nothing_to_delete() -> &'static str {
    "ℹ️ No configuration found to delete."
}

pub fn delete_failed(err: &Error) -> String {
    format!(
        "❌ Error deleting configuration: <code>{}</code>",
        escape_html(&err.detail())
    )
}

// ============== Upload ==============

pub fn upload_instructions(remote_path: &str) -> String {
    format!(
        "📤 <b>Upload File to FTP</b>\n\n\
         Send any text file (any filename is OK!)\n\n\
         📝 <b>What happens:</b>\n\
         \u{20}  1️⃣ Clean URLs (remove http/https)\n\
         \u{20}  2️⃣ Upload with original name\n\
         \u{20}  3️⃣ Delete old <code>{TARGET_NAME}</code>\n\
         \u{20}  4️⃣ Rename to <code>{TARGET_NAME}</code>\n\
         \u{20}  5️⃣ Clean up temp files\n\n\
         ✨ <b>Auto-cleanup:</b> URLs are cleaned automatically!\n\
         📂 <b>Location:</b> <code>{}</code>\n\n\
         Send /cancel to abort.",
        escape_html(remote_path)
    )
}

pub fn send_as_document() -> &'static str {
    "❌ Please send a file as a document, not as text.\n\n\
     Tap the 📎 attachment icon and select your file."
}

pub fn upload_not_started() -> &'static str {
    "ℹ️ To publish a file, start an upload first with /upload or the 📤 button."
}

pub fn file_too_large(bytes: u64) -> String {
    format!(
        "❌ File too large ({})\n\nMaximum file size is {}.",
        megabytes(bytes),
        megabytes(MAX_UPLOAD_BYTES)
    )
}

pub fn downloading() -> &'static str {
    "⬇️ <b>Downloading file...</b>"
}

pub fn download_failed(err: &Error) -> String {
    format!(
        "❌ <b>Download Failed</b>\n\nError: <code>{}</code>\n\nPlease send the file again.",
        escape_html(&err.detail())
    )
}

fn done_line(step: &PublishStep) -> String {
    match step {
        PublishStep::Connecting => "✅ <b>Connected to FTP</b>".to_string(),
        PublishStep::ChangingDirectory { .. } => "📂 <b>In directory</b>".to_string(),
        PublishStep::Uploading { .. } => "✅ <b>File uploaded</b>".to_string(),
        PublishStep::Listing => "📋 <b>Directory listed</b>".to_string(),
        PublishStep::DeletingStale => "🗑️ <b>Old file deleted</b>".to_string(),
        PublishStep::Renaming { to, .. } => format!("✅ <b>Renamed to {}</b>", escape_html(to)),
        PublishStep::CleaningSidecars => "🧹 <b>Cleaned up</b>".to_string(),
    }
}

fn current_line(step: &PublishStep) -> String {
    match step {
        PublishStep::Connecting => "🔄 Connecting to FTP...".to_string(),
        PublishStep::ChangingDirectory { path } => {
            format!("📂 Navigating to {}...", escape_html(path))
        }
        PublishStep::Uploading { name } => {
            format!("📤 Uploading as <code>{}</code>...", escape_html(name))
        }
        PublishStep::Listing => "📋 Listing directory...".to_string(),
        PublishStep::DeletingStale => format!("🗑️ Deleting old {TARGET_NAME}..."),
        PublishStep::Renaming { to, .. } => format!("🔄 Renaming to {}...", escape_html(to)),
        PublishStep::CleaningSidecars => "🧹 Cleaning up...".to_string(),
    }
}

/// Status message while a publish is running.
pub fn progress(current: &PublishStep, done: &[PublishStep]) -> String {
    let mut lines = vec!["📦 <b>File downloaded</b>".to_string()];
    lines.extend(done.iter().map(done_line));
    lines.push(current_line(current));
    lines.join("\n")
}

pub fn upload_success(report: &UploadReport, remote_path: &str) -> String {
    let r = &report.published;
    let mut out = format!(
        "✅ <b>Upload Successful!</b>\n\n\
         📥 Original: <code>{}</code>\n\
         📄 Saved as: <code>{}</code>\n\
         📂 Location: <code>{}/</code>\n\
         💾 Size: {} bytes ({})\n",
        escape_html(&r.original_name),
        escape_html(&r.final_name),
        escape_html(remote_path.trim_end_matches('/')),
        group_thousands(r.uploaded_bytes),
        megabytes(r.uploaded_bytes),
    );
    if report.changed_lines > 0 {
        out.push_str(&format!(
            "🧹 Cleaned {}/{} URLs\n",
            report.changed_lines, report.total_lines
        ));
    }
    out.push('\n');
    out.push_str(if r.replaced_existing {
        "🗑️ Old file replaced"
    } else {
        "🆕 New file created"
    });
    if !r.sidecar_files_removed.is_empty() {
        let names: Vec<&str> = r.sidecar_files_removed.iter().map(String::as_str).collect();
        out.push_str(&format!("\n🧹 Cleaned: {}", escape_html(&names.join(", "))));
    }
    out
}

// ============== Connection test ==============

pub fn testing_connection() -> &'static str {
    "🔄 <b>Testing FTP Connection...</b>"
}

pub fn connection_ok(rec: &CredentialRecord, report: &ConnectionReport) -> String {
    format!(
        "✅ <b>Connection Successful!</b>\n\n\
         📡 Host: <code>{}</code>\n\
         📂 Path: <code>{}</code>\n\
         📄 Files in directory: {}\n\
         🎯 {TARGET_NAME}: {}",
        escape_html(&rec.address()),
        escape_html(&rec.remote_path),
        report.entries,
        if report.target_present {
            "✅ Found"
        } else {
            "❌ Not found"
        }
    )
}

// ============== Errors ==============

/// User-facing rendering of a failed upload or connection test.
pub fn operation_error(err: &Error, op: Operation, rec: Option<&CredentialRecord>) -> String {
    let detail = escape_html(&err.detail());
    match err {
        Error::Permission(raw) => {
            let code = raw.split_whitespace().next().unwrap_or("Unknown");
            let hint = match op {
                Operation::Upload => "Check if you have write permissions.",
                Operation::ConnectionTest => "Please check your credentials and permissions.",
            };
            format!(
                "❌ <b>FTP Permission Error</b>\n\n\
                 Code: {}\n\
                 Details: <code>{detail}</code>\n\n\
                 {hint}",
                escape_html(code)
            )
        }
        Error::Timeout(_) => {
            let target = rec
                .map(|r| format!("Could not reach {}\n\n", escape_html(&r.address())))
                .unwrap_or_default();
            format!(
                "❌ <b>Connection Timeout</b>\n\n\
                 {target}The FTP server is not responding.\n\
                 Please check:\n\
                 • Host is correct\n\
                 • Port is correct\n\
                 • Server is online"
            )
        }
        Error::Connection(_) => format!(
            "❌ <b>Connection Failed</b>\n\n\
             Error: <code>{detail}</code>\n\n\
             Please verify your FTP credentials."
        ),
        Error::Validation(_) => format!("❌ {detail}"),
        Error::Persistence(_) => format!(
            "❌ <b>Could not read saved configuration</b>\n\n\
             Error: <code>{detail}</code>"
        ),
        _ => {
            let title = match op {
                Operation::Upload => "Upload Failed",
                Operation::ConnectionTest => "Connection Test Failed",
            };
            format!(
                "❌ <b>{title}</b>\n\n\
                 Error: <code>{detail}</code>\n\n\
                 Please try again or check your FTP settings."
            )
        }
    }
}

pub fn generic_error(err: &Error) -> String {
    format!(
        "❌ An error occurred: <code>{}</code>\n\nPlease try again.",
        escape_html(&err.detail())
    )
}

// ============== Helpers ==============

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
