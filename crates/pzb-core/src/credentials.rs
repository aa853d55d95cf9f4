use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Saved FTP credentials for one user.
///
/// Field names on disk (`pass`, `path`) match the credential file written by
/// earlier deployments so existing files keep loading.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(rename = "pass")]
    pub password: String,
    #[serde(rename = "path")]
    pub remote_path: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

impl CredentialRecord {
    /// `host:port` as used for the control connection.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Password rendered for display: `ab****yz`, or `****` when short.
    pub fn masked_password(&self) -> String {
        let chars: Vec<char> = self.password.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
    }

    /// Re-check every field; used before a record is persisted.
    pub fn validate(&self) -> Result<()> {
        validate_host(&self.host)?;
        if self.port == 0 {
            return Err(Error::Validation(
                "Port must be between 1 and 65535".to_string(),
            ));
        }
        validate_user(&self.user)?;
        validate_password(&self.password)?;
        validate_remote_path(&self.remote_path)?;
        Ok(())
    }
}

pub fn validate_host(raw: &str) -> Result<String> {
    let host = raw.trim();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(Error::Validation(
            "Invalid host. Please enter a valid hostname or IP address".to_string(),
        ));
    }
    Ok(host.to_string())
}

pub fn parse_port(raw: &str) -> Result<u16> {
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::Validation("Invalid port number".to_string()))?;
    if !(1..=65535).contains(&n) {
        return Err(Error::Validation(
            "Port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(n as u16)
}

pub fn validate_user(raw: &str) -> Result<String> {
    let user = raw.trim();
    if user.is_empty() {
        return Err(Error::Validation("Username cannot be empty".to_string()));
    }
    Ok(user.to_string())
}

/// Passwords are kept verbatim; surrounding whitespace may be significant.
pub fn validate_password(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::Validation("Password cannot be empty".to_string()));
    }
    Ok(raw.to_string())
}

pub fn validate_remote_path(raw: &str) -> Result<String> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(Error::Validation("Path cannot be empty".to_string()));
    }
    Ok(path.to_string())
}
