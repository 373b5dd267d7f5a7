//! In-memory fakes for driving a session without a desktop or a provider.
//!
//! `RecordingSandbox` logs every primitive call and hands out synthetic
//! screenshots; `ScriptedModel` replays a fixed list of responses and keeps
//! the contexts it was sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::action::Action;
use crate::llm::{ComputerCall, LlmError, ModelClient, ModelContext, ModelResponse};
use crate::sandbox::{Sandbox, SandboxError, SandboxResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    Connect,
    Disconnect,
    CaptureScreenshot,
    MoveCursor(i32, i32),
    LeftClick,
    RightClick,
    DoubleClick,
    PressKey(String),
    ScrollVertical(i32),
    InjectText(String),
}

impl SandboxCall {
    /// Method name on [`Sandbox`], used to target failure injection.
    pub fn method(&self) -> &'static str {
        match self {
            SandboxCall::Connect => "connect",
            SandboxCall::Disconnect => "disconnect",
            SandboxCall::CaptureScreenshot => "capture_screenshot",
            SandboxCall::MoveCursor(..) => "move_cursor",
            SandboxCall::LeftClick => "left_click",
            SandboxCall::RightClick => "right_click",
            SandboxCall::DoubleClick => "double_click",
            SandboxCall::PressKey(_) => "press_key",
            SandboxCall::ScrollVertical(_) => "scroll_vertical",
            SandboxCall::InjectText(_) => "inject_text",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            SandboxCall::Connect | SandboxCall::Disconnect | SandboxCall::CaptureScreenshot
        )
    }
}

/// Shared view of a [`RecordingSandbox`]'s call log.
#[derive(Debug, Clone, Default)]
pub struct SandboxLog {
    calls: Arc<Mutex<Vec<SandboxCall>>>,
}

impl SandboxLog {
    pub fn calls(&self) -> Vec<SandboxCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &SandboxCall) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    /// Number of mutating primitive calls (cursor, clicks, keys, scroll, text).
    pub fn mutating_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| c.is_mutating()).count()
    }

    fn push(&self, call: SandboxCall) {
        lock(&self.calls).push(call);
    }
}

#[derive(Debug, Default)]
pub struct RecordingSandbox {
    log: SandboxLog,
    frames: VecDeque<Vec<u8>>,
    captures: u64,
    fail_on: Option<&'static str>,
    hang_on: Option<&'static str>,
}

impl RecordingSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screenshots to return, in order. Once exhausted, every capture returns
    /// distinct synthetic bytes.
    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames.into();
        self
    }

    /// Fail every call to the named method.
    pub fn fail_on(mut self, method: &'static str) -> Self {
        self.fail_on = Some(method);
        self
    }

    /// Never complete calls to the named method.
    pub fn hang_on(mut self, method: &'static str) -> Self {
        self.hang_on = Some(method);
        self
    }

    pub fn log(&self) -> SandboxLog {
        self.log.clone()
    }

    async fn record(&mut self, call: SandboxCall) -> SandboxResult<()> {
        let method = call.method();
        self.log.push(call);
        if self.hang_on == Some(method) {
            std::future::pending::<()>().await;
        }
        if self.fail_on == Some(method) {
            return Err(SandboxError::Command {
                command: method.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Sandbox for RecordingSandbox {
    async fn connect(&mut self) -> SandboxResult<()> {
        self.record(SandboxCall::Connect).await
    }

    async fn disconnect(&mut self) -> SandboxResult<()> {
        self.record(SandboxCall::Disconnect).await
    }

    async fn capture_screenshot(&mut self) -> SandboxResult<Vec<u8>> {
        self.record(SandboxCall::CaptureScreenshot).await?;
        self.captures += 1;
        Ok(self
            .frames
            .pop_front()
            .unwrap_or_else(|| format!("frame-{}", self.captures).into_bytes()))
    }

    async fn move_cursor(&mut self, x: i32, y: i32) -> SandboxResult<()> {
        self.record(SandboxCall::MoveCursor(x, y)).await
    }

    async fn left_click(&mut self) -> SandboxResult<()> {
        self.record(SandboxCall::LeftClick).await
    }

    async fn right_click(&mut self) -> SandboxResult<()> {
        self.record(SandboxCall::RightClick).await
    }

    async fn double_click(&mut self) -> SandboxResult<()> {
        self.record(SandboxCall::DoubleClick).await
    }

    async fn press_key(&mut self, name: &str) -> SandboxResult<()> {
        self.record(SandboxCall::PressKey(name.to_string())).await
    }

    async fn scroll_vertical(&mut self, amount: i32) -> SandboxResult<()> {
        self.record(SandboxCall::ScrollVertical(amount)).await
    }

    async fn inject_text(&mut self, text: &str) -> SandboxResult<()> {
        self.record(SandboxCall::InjectText(text.to_string())).await
    }
}

/// Model client that replays scripted responses.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    fallback: ModelResponse,
    seen: Mutex<Vec<ModelContext>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(results: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: ModelResponse::completion(None),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Response returned once the script runs out (a completion by default).
    pub fn with_fallback(mut self, fallback: ModelResponse) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.seen).len()
    }

    /// Contexts received, one per call.
    pub fn contexts(&self) -> Vec<ModelContext> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn send(&self, context: &ModelContext) -> Result<ModelResponse, LlmError> {
        lock(&self.seen).push(context.clone());
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A computer call with no pending safety checks.
pub fn call(call_id: &str, action: Action) -> ComputerCall {
    ComputerCall {
        call_id: call_id.to_string(),
        action,
        pending_safety_checks: Vec::new(),
    }
}
