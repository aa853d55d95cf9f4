use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::UserId, errors::Error, publish::PublishResult, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// One line (or block) in the audit log.
///
/// Passwords never enter an event; only host, user and path are recorded.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_existing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user: UserId, username: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            user_id: user.0,
            username: username.map(|s| s.to_string()),
            authorized: None,
            host: None,
            remote_path: None,
            file_name: None,
            bytes: None,
            replaced_existing: None,
            success: None,
            error: None,
            context: None,
        }
    }

    pub fn auth(user: UserId, username: Option<&str>, authorized: bool) -> Self {
        Self {
            authorized: Some(authorized),
            ..Self::base("auth", user, username)
        }
    }

    pub fn setup(user: UserId, username: Option<&str>, host: &str, remote_path: &str) -> Self {
        Self {
            host: Some(host.to_string()),
            remote_path: Some(remote_path.to_string()),
            success: Some(true),
            ..Self::base("setup", user, username)
        }
    }

    pub fn upload(
        user: UserId,
        username: Option<&str>,
        host: &str,
        outcome: std::result::Result<&PublishResult, &Error>,
    ) -> Self {
        let mut ev = Self {
            host: Some(host.to_string()),
            ..Self::base("upload", user, username)
        };
        match outcome {
            Ok(r) => {
                ev.success = Some(true);
                ev.file_name = Some(r.original_name.clone());
                ev.bytes = Some(r.uploaded_bytes);
                ev.replaced_existing = Some(r.replaced_existing);
            }
            Err(e) => {
                ev.success = Some(false);
                ev.error = Some(e.to_string());
            }
        }
        ev
    }

    pub fn connection_test(
        user: UserId,
        username: Option<&str>,
        host: &str,
        error: Option<&Error>,
    ) -> Self {
        Self {
            host: Some(host.to_string()),
            success: Some(error.is_none()),
            error: error.map(|e| e.to_string()),
            ..Self::base("connection_test", user, username)
        }
    }

    pub fn delete_config(user: UserId, username: Option<&str>, deleted: bool) -> Self {
        Self {
            success: Some(deleted),
            ..Self::base("delete_config", user, username)
        }
    }

    pub fn error(user: UserId, username: Option<&str>, error: &str, context: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            context: Some(context.to_string()),
            ..Self::base("error", user, username)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write, logging instead of failing. Audit problems never break a user flow.
    pub fn record(&self, event: AuditEvent) {
        let kind = event.event.clone();
        if let Err(e) = self.write(event) {
            tracing::warn!(event = %kind, error = %e, "audit write failed");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
