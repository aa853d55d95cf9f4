use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, publish::DEFAULT_TIMEOUT, Result};

/// Typed runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Empty means every user may talk to the bot.
    pub telegram_allowed_users: Vec<i64>,

    // Storage
    pub credentials_file: PathBuf,
    pub temp_dir: PathBuf,

    // Remote store
    pub ftp_timeout: Duration,
    /// Skip certificate verification on the TLS control channel.
    pub ftp_tls_insecure: bool,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    /// Read `.env` (without overriding the real environment), then the environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_source(|key| env::var(key).ok())?;

        // Uploads are staged here before they go out.
        fs::create_dir_all(&cfg.temp_dir)?;
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_allowed_users = parse_csv_i64(get("TELEGRAM_ALLOWED_USERS"));

        let credentials_file = PathBuf::from(
            get("CREDENTIALS_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| "ftp_config.json".to_string()),
        );
        let temp_dir = PathBuf::from(
            get("TEMP_DIR")
                .and_then(non_empty)
                .unwrap_or_else(|| "/tmp/pzb".to_string()),
        );

        let ftp_timeout = match get("FTP_TIMEOUT_SECS").and_then(non_empty) {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(Error::Config(format!(
                        "FTP_TIMEOUT_SECS must be a positive number of seconds, got {raw:?}"
                    )))
                }
            },
        };
        let ftp_tls_insecure = parse_bool(get("FTP_TLS_INSECURE")).unwrap_or(false);

        let audit_log_path = PathBuf::from(
            get("AUDIT_LOG_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "/tmp/pzb-audit.log".to_string()),
        );
        let audit_log_json = parse_bool(get("AUDIT_LOG_JSON")).unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            credentials_file,
            temp_dir,
            ftp_timeout,
            ftp_tls_insecure,
            audit_log_path,
            audit_log_json,
        })
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.telegram_allowed_users.is_empty() || self.telegram_allowed_users.contains(&user_id)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // real env wins
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    let quoted = val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')));
    if quoted {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn cfg(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|k| map.get(k).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(cfg(&[]), Err(Error::Config(_))));
        assert!(matches!(
            cfg(&[("TELEGRAM_BOT_TOKEN", "  ")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn defaults() {
        let c = cfg(&[("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        assert!(c.telegram_allowed_users.is_empty());
        assert_eq!(c.credentials_file, PathBuf::from("ftp_config.json"));
        assert_eq!(c.temp_dir, PathBuf::from("/tmp/pzb"));
        assert_eq!(c.ftp_timeout, Duration::from_secs(30));
        assert!(!c.ftp_tls_insecure);
        assert_eq!(c.audit_log_path, PathBuf::from("/tmp/pzb-audit.log"));
        assert!(!c.audit_log_json);
    }

    #[test]
    fn empty_allow_list_admits_everyone() {
        let open = cfg(&[("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        assert!(open.is_allowed(12345));

        let closed = cfg(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_ALLOWED_USERS", "1, 2,junk,,3"),
        ])
        .unwrap();
        assert_eq!(closed.telegram_allowed_users, vec![1, 2, 3]);
        assert!(closed.is_allowed(2));
        assert!(!closed.is_allowed(4));
    }

    #[test]
    fn timeout_and_flags() {
        let c = cfg(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("FTP_TIMEOUT_SECS", "5"),
            ("FTP_TLS_INSECURE", "yes"),
            ("AUDIT_LOG_JSON", "1"),
        ])
        .unwrap();
        assert_eq!(c.ftp_timeout, Duration::from_secs(5));
        assert!(c.ftp_tls_insecure);
        assert!(c.audit_log_json);

        assert!(cfg(&[("TELEGRAM_BOT_TOKEN", "t"), ("FTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(cfg(&[("TELEGRAM_BOT_TOKEN", "t"), ("FTP_TIMEOUT_SECS", "abc")]).is_err());
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("\""), "\"");
    }
}
