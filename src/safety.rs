//! Safety gates for pending confirmation checks attached to model calls.
//!
//! Providers may flag a requested action (e.g. suspected prompt injection on
//! screen). The session asks a [`SafetyGate`] what to do before running it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::Action;

/// A pending check as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDecision {
    /// Run the action and acknowledge every pending check.
    Acknowledge,
    Reject { reason: String },
}

#[async_trait]
pub trait SafetyGate: Send + Sync {
    async fn review(&self, call_id: &str, action: &Action, checks: &[SafetyCheck])
        -> SafetyDecision;
}

/// Acknowledge everything without asking anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl SafetyGate for AutoApprove {
    async fn review(&self, call_id: &str, _action: &Action, checks: &[SafetyCheck]) -> SafetyDecision {
        let ids: Vec<&str> = checks.iter().map(|c| c.id.as_str()).collect();
        tracing::warn!(call_id = %call_id, checks = ?ids, "Auto-acknowledging pending safety checks");
        SafetyDecision::Acknowledge
    }
}

/// Refuse any call that carries pending checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

#[async_trait]
impl SafetyGate for DenyAll {
    async fn review(&self, _call_id: &str, _action: &Action, checks: &[SafetyCheck]) -> SafetyDecision {
        let codes: Vec<&str> = checks
            .iter()
            .map(|c| c.code.as_deref().unwrap_or(c.id.as_str()))
            .collect();
        SafetyDecision::Reject {
            reason: format!("pending checks not allowed: {}", codes.join(", ")),
        }
    }
}

/// Delegate the decision to an external confirmation callback.
pub struct CallbackGate<F> {
    confirm: F,
}

impl<F> CallbackGate<F>
where
    F: Fn(&str, &Action, &[SafetyCheck]) -> bool + Send + Sync,
{
    pub fn new(confirm: F) -> Self {
        Self { confirm }
    }
}

#[async_trait]
impl<F> SafetyGate for CallbackGate<F>
where
    F: Fn(&str, &Action, &[SafetyCheck]) -> bool + Send + Sync,
{
    async fn review(&self, call_id: &str, action: &Action, checks: &[SafetyCheck]) -> SafetyDecision {
        if (self.confirm)(call_id, action, checks) {
            SafetyDecision::Acknowledge
        } else {
            SafetyDecision::Reject {
                reason: "declined by confirmation callback".to_string(),
            }
        }
    }
}

/// Serializable choice between the built-in gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyPolicy {
    #[default]
    AutoApprove,
    DenyAll,
}

impl SafetyPolicy {
    pub fn build(self) -> std::sync::Arc<dyn SafetyGate> {
        match self {
            SafetyPolicy::AutoApprove => std::sync::Arc::new(AutoApprove),
            SafetyPolicy::DenyAll => std::sync::Arc::new(DenyAll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, code: Option<&str>) -> SafetyCheck {
        SafetyCheck {
            id: id.to_string(),
            code: code.map(str::to_string),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_builtin_gates() {
        let checks = vec![check("sc_1", Some("sensitive_domain"))];
        assert_eq!(
            AutoApprove.review("c1", &Action::Screenshot, &checks).await,
            SafetyDecision::Acknowledge
        );
        match DenyAll.review("c1", &Action::Screenshot, &checks).await {
            SafetyDecision::Reject { reason } => assert!(reason.contains("sensitive_domain")),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_callback_gate_sees_the_call() {
        let gate = CallbackGate::new(|call_id: &str, action: &Action, checks: &[SafetyCheck]| {
            call_id == "ok" && matches!(action, Action::Type { .. }) && checks.len() == 1
        });
        let action = Action::Type {
            text: "hi".to_string(),
        };
        let checks = vec![check("sc_1", None)];
        assert_eq!(
            gate.review("ok", &action, &checks).await,
            SafetyDecision::Acknowledge
        );
        assert!(matches!(
            gate.review("nope", &action, &checks).await,
            SafetyDecision::Reject { .. }
        ));
    }

    #[test]
    fn test_check_deserializes_without_optional_fields() {
        let parsed: SafetyCheck = serde_json::from_str(r#"{"id":"sc_9"}"#).unwrap();
        assert_eq!(parsed, check("sc_9", None));
    }
}
