//! Session loop: model call → action → observation → model call, until done.
//!
//! ```text
//!  Init ──► AwaitingModel ──► Executing ──┐
//!                 ▲                       │
//!                 └───────────────────────┘
//!                 │
//!                 ├──► Done    (completion or unrecognized reply)
//!                 └──► Failed  (sandbox/model error, timeout, limit, cancel)
//! ```
//!
//! Exactly one model request is in flight at a time. The sandbox is released
//! once, on every exit path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::action::Action;
use crate::config::{Config, MultiActionPolicy};
use crate::error::{within, AgentError, AgentResult};
use crate::executor::TurnExecutor;
use crate::llm::{ComputerCall, ContextItem, ModelClient, ModelContext, ModelResponse, Reply};
use crate::observation::{Observation, ScreenshotArchive};
use crate::safety::{SafetyCheck, SafetyDecision, SafetyGate};
use crate::sandbox::Sandbox;
use crate::settle::SettleStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    AwaitingModel,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Init => "init",
            SessionState::AwaitingModel => "awaiting_model",
            SessionState::Executing => "executing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One executed call: the action and the observations on either side of it.
#[derive(Debug, Clone)]
pub struct Turn {
    /// 1-based index of the model call that requested this action.
    pub model_call: u32,
    pub call_id: String,
    pub action: Action,
    pub before: Observation,
    pub after: Observation,
    pub acknowledged_safety_checks: Vec<SafetyCheck>,
}

/// Why a run reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed { text: Option<String> },
    UnrecognizedReply { detail: String },
}

#[derive(Debug)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub state: SessionState,
    pub outcome: AgentResult<Termination>,
    pub turns: Vec<Turn>,
    pub model_calls: u32,
}

impl SessionReport {
    pub fn into_result(self) -> AgentResult<Termination> {
        self.outcome
    }
}

pub struct Session {
    id: Uuid,
    task: String,
    sandbox: Box<dyn Sandbox>,
    model: Arc<dyn ModelClient>,
    gate: Arc<dyn SafetyGate>,
    executor: TurnExecutor,
    multi_action: MultiActionPolicy,
    max_turns: u32,
    model_timeout: Duration,
    sandbox_timeout: Duration,
    state: SessionState,
    context: ModelContext,
    turns: Vec<Turn>,
    model_calls: u32,
}

impl Session {
    pub fn new(
        config: &Config,
        task: impl Into<String>,
        sandbox: Box<dyn Sandbox>,
        model: Arc<dyn ModelClient>,
    ) -> AgentResult<Self> {
        config.validate()?;

        let mut executor = TurnExecutor::new(config.settle.build(), config.sandbox_timeout());
        if let Some(dir) = &config.screenshot_dir {
            executor = executor.with_archive(ScreenshotArchive::new(dir));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            task: task.into(),
            sandbox,
            model,
            gate: config.safety.build(),
            executor,
            multi_action: config.multi_action,
            max_turns: config.max_turns,
            model_timeout: config.model_timeout(),
            sandbox_timeout: config.sandbox_timeout(),
            state: SessionState::Init,
            context: ModelContext::default(),
            turns: Vec::new(),
            model_calls: 0,
        })
    }

    pub fn with_safety_gate(mut self, gate: Arc<dyn SafetyGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_settle_strategy(mut self, settle: Box<dyn SettleStrategy>) -> Self {
        let mut executor = TurnExecutor::new(settle, self.sandbox_timeout);
        if let Some(archive) = self.executor.archive().cloned() {
            executor = executor.with_archive(archive);
        }
        self.executor = executor;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn run(self) -> SessionReport {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Drive the loop to a terminal state. Cancelling `cancel` stops the run
    /// at its current suspension point; the sandbox is still released.
    pub async fn run_until_cancelled(mut self, cancel: CancellationToken) -> SessionReport {
        tracing::info!(session_id = %self.id, task = %self.task, "Starting session");

        let mut outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.drive() => result,
        };

        match within(self.sandbox_timeout, "sandbox release", self.sandbox.disconnect()).await {
            Ok(()) => tracing::debug!(session_id = %self.id, "Sandbox released"),
            Err(e) => {
                tracing::warn!(session_id = %self.id, "Failed to release sandbox: {}", e);
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        self.state = match &outcome {
            Ok(_) => SessionState::Done,
            Err(_) => SessionState::Failed,
        };
        match &outcome {
            Ok(termination) => tracing::info!(
                session_id = %self.id,
                model_calls = self.model_calls,
                turns = self.turns.len(),
                "Session done: {:?}",
                termination
            ),
            Err(e) => tracing::error!(
                session_id = %self.id,
                model_calls = self.model_calls,
                turns = self.turns.len(),
                "Session failed: {}",
                e
            ),
        }

        SessionReport {
            session_id: self.id,
            state: self.state,
            outcome,
            turns: self.turns,
            model_calls: self.model_calls,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(session_id = %self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    async fn drive(&mut self) -> AgentResult<Termination> {
        within(self.sandbox_timeout, "sandbox connect", self.sandbox.connect()).await?;
        let initial = self.executor.observe(self.sandbox.as_mut()).await?;
        self.context.push(ContextItem::Task {
            text: self.task.clone(),
            observation: initial.clone(),
        });
        let mut latest = initial;

        loop {
            if self.model_calls >= self.max_turns {
                return Err(AgentError::TurnLimit(self.max_turns));
            }

            self.transition(SessionState::AwaitingModel);
            self.model_calls += 1;
            let ModelResponse { reply, echo, usage } = within(
                self.model_timeout,
                "model request",
                self.model.send(&self.context),
            )
            .await?;
            if let Some(usage) = usage {
                tracing::debug!(
                    session_id = %self.id,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Model usage"
                );
            }

            let calls = match reply {
                Reply::Completion { text } => return Ok(Termination::Completed { text }),
                Reply::Unrecognized { detail } => {
                    tracing::warn!(session_id = %self.id, "Unrecognized model reply: {}", detail);
                    return Ok(Termination::UnrecognizedReply { detail });
                }
                Reply::Actions(calls) if calls.is_empty() => {
                    return Ok(Termination::Completed { text: None })
                }
                Reply::Actions(calls) => calls,
            };

            let calls = self.select_calls(calls);
            self.record_echo(echo, &calls);

            self.transition(SessionState::Executing);
            for call in calls {
                latest = self.execute_call(call, latest).await?;
            }
        }
    }

    fn select_calls(&self, mut calls: Vec<ComputerCall>) -> Vec<ComputerCall> {
        match self.multi_action {
            MultiActionPolicy::All => calls,
            MultiActionPolicy::FirstOnly => {
                if calls.len() > 1 {
                    tracing::warn!(
                        session_id = %self.id,
                        dropped = calls.len() - 1,
                        "Model requested several actions; running only the first"
                    );
                }
                calls.truncate(1);
                calls
            }
        }
    }

    /// Append provider items to the context. Echoed computer calls that were
    /// not selected are left out: every call in the context needs an output.
    fn record_echo(&mut self, echo: Vec<Value>, selected: &[ComputerCall]) {
        let kept = echo.into_iter().filter(|item| match echoed_call_id(item) {
            Some(id) => selected.iter().any(|call| call.call_id == id),
            None => true,
        });
        self.context.items.extend(kept.map(ContextItem::Provider));
    }

    async fn execute_call(
        &mut self,
        call: ComputerCall,
        before: Observation,
    ) -> AgentResult<Observation> {
        tracing::info!(
            session_id = %self.id,
            call_id = %call.call_id,
            action = ?call.action,
            "Received action"
        );

        let acknowledged = if call.pending_safety_checks.is_empty() {
            Vec::new()
        } else {
            match self
                .gate
                .review(&call.call_id, &call.action, &call.pending_safety_checks)
                .await
            {
                SafetyDecision::Acknowledge => call.pending_safety_checks.clone(),
                SafetyDecision::Reject { reason } => {
                    return Err(AgentError::SafetyRejected {
                        call_id: call.call_id,
                        reason,
                    })
                }
            }
        };

        let after = self
            .executor
            .execute(self.sandbox.as_mut(), &call.action)
            .await?;

        self.context.push(ContextItem::CallOutput {
            call_id: call.call_id.clone(),
            observation: after.clone(),
            acknowledged_safety_checks: acknowledged.clone(),
        });
        self.turns.push(Turn {
            model_call: self.model_calls,
            call_id: call.call_id,
            action: call.action,
            before,
            after: after.clone(),
            acknowledged_safety_checks: acknowledged,
        });
        Ok(after)
    }
}

fn echoed_call_id(item: &Value) -> Option<&str> {
    if item.get("type").and_then(|t| t.as_str()) != Some("computer_call") {
        return None;
    }
    item.get("call_id").and_then(|id| id.as_str())
}
