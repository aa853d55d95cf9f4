/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so handlers can
/// render failures consistently (re-prompt vs. report-and-abort).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed user input. Recoverable: the same step is asked again.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The remote server refused an operation with a permanent (5xx) reply.
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// The credential store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// True for failures raised by the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Permission(_) | Error::Timeout(_) | Error::Connection(_)
        )
    }

    /// Raw diagnostic text without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Error::Config(s)
            | Error::Validation(s)
            | Error::Permission(s)
            | Error::Timeout(s)
            | Error::Connection(s)
            | Error::Persistence(s)
            | Error::External(s) => s.clone(),
            Error::Io(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_classified() {
        assert!(Error::Permission("550".into()).is_remote());
        assert!(Error::Timeout("connect".into()).is_remote());
        assert!(Error::Connection("reset".into()).is_remote());
        assert!(!Error::Persistence("disk full".into()).is_remote());
        assert!(!Error::Validation("port".into()).is_remote());
    }

    #[test]
    fn detail_strips_category_prefix() {
        let e = Error::Permission("550 Permission denied.".to_string());
        assert_eq!(e.detail(), "550 Permission denied.");
        assert_eq!(e.to_string(), "permission denied: 550 Permission denied.");
    }
}
