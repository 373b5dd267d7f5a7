//! Model client errors and retry policy.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Coarse classification used to decide whether a request is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 from the provider.
    RateLimited,
    /// 5xx from the provider.
    ServerError,
    /// Other 4xx: bad request, auth, unknown model. Not retryable.
    ClientError,
    /// Connection failure or timeout before a response arrived.
    NetworkError,
    /// The response body could not be decoded.
    ParseError,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::ServerError => "server error",
            LlmErrorKind::ClientError => "client error",
            LlmErrorKind::NetworkError => "network error",
            LlmErrorKind::ParseError => "parse error",
        };
        f.write_str(s)
    }
}

pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        _ => LlmErrorKind::ClientError,
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            status: None,
            retry_after: None,
        }
    }

    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            status: Some(429),
            retry_after,
            ..Self::new(LlmErrorKind::RateLimited, message)
        }
    }

    pub fn server_error(status: u16, message: String) -> Self {
        Self {
            status: Some(status),
            ..Self::new(LlmErrorKind::ServerError, message)
        }
    }

    pub fn client_error(status: u16, message: String) -> Self {
        Self {
            status: Some(status),
            ..Self::new(LlmErrorKind::ClientError, message)
        }
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, message)
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }

    /// Delay before retry `attempt` (0-based): the provider's Retry-After if
    /// given, else exponential backoff with up to 25% jitter, capped at 30s.
    pub fn suggested_delay(&self, attempt: u32, base: Duration) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }
        let backoff = base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Duration::from_secs(30));
        let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
        backoff + Duration::from_millis(jitter_ms)
    }
}

/// Bounded retry for transient model failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub max_retry_duration: Duration,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn should_retry(&self, error: &LlmError) -> bool {
        self.max_retries > 0 && error.is_transient()
    }
}
