//! Model client module: the boundary to a computer-use capable LLM.
//!
//! Clients are stateless. The session loop owns the whole conversation as a
//! [`ModelContext`] and resends it on every call; the client turns it into the
//! provider's wire format and classifies the reply as a completion, a set of
//! requested actions, or something unrecognized.

mod error;
mod openai;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use openai::OpenAiResponsesClient;

use async_trait::async_trait;

use crate::action::Action;
use crate::observation::Observation;
use crate::safety::SafetyCheck;

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone)]
pub enum ContextItem {
    /// The task instruction with the initial observation.
    Task {
        text: String,
        observation: Observation,
    },
    /// A provider output item echoed back verbatim (reasoning, calls, messages).
    Provider(serde_json::Value),
    /// Observation produced by executing a requested call.
    CallOutput {
        call_id: String,
        observation: Observation,
        acknowledged_safety_checks: Vec<SafetyCheck>,
    },
}

/// Everything the model sees on a call.
#[derive(Debug, Clone, Default)]
pub struct ModelContext {
    pub items: Vec<ContextItem>,
}

impl ModelContext {
    pub fn push(&mut self, item: ContextItem) {
        self.items.push(item);
    }

    /// The most recent observation in the context, if any.
    pub fn latest_observation(&self) -> Option<&Observation> {
        self.items.iter().rev().find_map(|item| match item {
            ContextItem::Task { observation, .. } | ContextItem::CallOutput { observation, .. } => {
                Some(observation)
            }
            ContextItem::Provider(_) => None,
        })
    }
}

/// An action the model asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputerCall {
    /// Opaque identifier the tool output must be keyed by.
    pub call_id: String,
    pub action: Action,
    pub pending_safety_checks: Vec<SafetyCheck>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No further action requested.
    Completion { text: Option<String> },
    /// One or more actions to run, in order.
    Actions(Vec<ComputerCall>),
    /// Neither a completion nor an action request.
    Unrecognized { detail: String },
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub reply: Reply,
    /// Provider items to append to the context before the next call.
    pub echo: Vec<serde_json::Value>,
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    pub fn completion(text: Option<String>) -> Self {
        Self {
            reply: Reply::Completion { text },
            echo: Vec::new(),
            usage: None,
        }
    }

    pub fn actions(calls: Vec<ComputerCall>) -> Self {
        Self {
            reply: Reply::Actions(calls),
            echo: Vec::new(),
            usage: None,
        }
    }

    pub fn unrecognized(detail: impl Into<String>) -> Self {
        Self {
            reply: Reply::Unrecognized {
                detail: detail.into(),
            },
            echo: Vec::new(),
            usage: None,
        }
    }
}

/// Trait for computer-use model clients.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, context: &ModelContext) -> Result<ModelResponse, LlmError>;
}
