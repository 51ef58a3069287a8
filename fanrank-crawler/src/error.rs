use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`UserSource`](crate::source::UserSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("remote directory unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("rate limited by remote directory{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl SourceError {
    /// Whether retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::NotFound(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }

    pub(crate) fn timed_out(after: Duration) -> Self {
        SourceError::RemoteUnavailable(format!("request timed out after {}ms", after.as_millis()))
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(" (retry after {}s)", wait.as_secs()),
        None => String::new(),
    }
}

/// Failure that aborts a whole crawl.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("root user not found: {0}")]
    NotFound(String),

    #[error("could not resolve root user {login}: {source}")]
    Root { login: String, source: SourceError },

    #[error("invalid max depth {0}: must be at least 1")]
    InvalidDepth(u32),

    #[error("crawl cancelled")]
    Cancelled,
}

impl CrawlError {
    pub(crate) fn from_root(login: &str, error: SourceError) -> Self {
        match error {
            SourceError::NotFound(_) => CrawlError::NotFound(login.to_string()),
            other => CrawlError::Root {
                login: login.to_string(),
                source: other,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
