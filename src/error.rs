//! Top-level error type for a session run.
//!
//! Each layer has its own error enum (`SandboxError`, `LlmError`, `ConfigError`);
//! `AgentError` is what the session loop propagates to callers.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::sandbox::SandboxError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("sandbox failure: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("model client failure: {0}")]
    Model(#[from] LlmError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("session cancelled")]
    Cancelled,

    #[error("safety checks rejected for call {call_id}: {reason}")]
    SafetyRejected { call_id: String, reason: String },

    #[error("no completion after {0} model calls")]
    TurnLimit(u32),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to archive screenshot: {0}")]
    Archive(#[source] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Await `fut`, failing with [`AgentError::Timeout`] once `timeout` elapses.
pub(crate) async fn within<T, E, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> AgentResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AgentError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(AgentError::Timeout { operation, timeout }),
    }
}
