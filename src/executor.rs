//! Turn executor: run one action against the sandbox and observe the result.

use std::time::Duration;

use crate::action::Action;
use crate::error::{within, AgentError, AgentResult};
use crate::observation::{Observation, ObservationChain, ScreenshotArchive};
use crate::sandbox::Sandbox;
use crate::settle::SettleStrategy;
use crate::translator::{translate, Primitive};

pub struct TurnExecutor {
    settle: Box<dyn SettleStrategy>,
    sandbox_timeout: Duration,
    chain: ObservationChain,
    archive: Option<ScreenshotArchive>,
}

impl TurnExecutor {
    pub fn new(settle: Box<dyn SettleStrategy>, sandbox_timeout: Duration) -> Self {
        Self {
            settle,
            sandbox_timeout,
            chain: ObservationChain::default(),
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: ScreenshotArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn archive(&self) -> Option<&ScreenshotArchive> {
        self.archive.as_ref()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.chain.latest()
    }

    /// Capture a fresh observation and append it to the chain.
    pub async fn observe(&mut self, sandbox: &mut dyn Sandbox) -> AgentResult<Observation> {
        let png = within(
            self.sandbox_timeout,
            "screenshot capture",
            sandbox.capture_screenshot(),
        )
        .await?;
        let observation = self.chain.record(png);
        tracing::debug!(
            seq = observation.seq(),
            bytes = observation.png().len(),
            "Captured observation"
        );

        if let Some(archive) = &self.archive {
            archive
                .store(&observation)
                .await
                .map_err(AgentError::Archive)?;
        }
        Ok(observation)
    }

    /// Translate and dispatch `action`, wait for the screen to settle, then
    /// return the new observation.
    ///
    /// Primitives run strictly in order; the first failure aborts the action.
    pub async fn execute(
        &mut self,
        sandbox: &mut dyn Sandbox,
        action: &Action,
    ) -> AgentResult<Observation> {
        let primitives = translate(action);
        tracing::info!(
            action = action.kind(),
            primitives = primitives.len(),
            "Executing action"
        );

        for primitive in &primitives {
            match primitive {
                Primitive::Pause(duration) => {
                    tracing::info!("Waiting for {:?}", duration);
                    tokio::time::sleep(*duration).await;
                }
                _ => {
                    let captured =
                        within(self.sandbox_timeout, "sandbox input", primitive.apply(sandbox))
                            .await?;
                    if let Some(png) = captured {
                        tracing::debug!(bytes = png.len(), "Out-of-band screenshot captured");
                    }
                }
            }
        }

        // The strategy's own wait plus one sandbox timeout for its captures.
        let settle_timeout = self.settle.budget().saturating_add(self.sandbox_timeout);
        within(settle_timeout, "settle", self.settle.settle(sandbox)).await?;

        self.observe(sandbox).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::MouseButton;
    use crate::sandbox::SandboxError;
    use crate::settle::{FixedDelay, StableFrames};
    use crate::testing::{RecordingSandbox, SandboxCall};

    fn executor() -> TurnExecutor {
        TurnExecutor::new(
            Box::new(FixedDelay(Duration::from_millis(500))),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_then_capture() {
        let mut sandbox = RecordingSandbox::new();
        let log = sandbox.log();
        let mut exec = executor();

        let obs = exec
            .execute(
                &mut sandbox,
                &Action::Click {
                    x: 100,
                    y: 100,
                    button: MouseButton::Left,
                },
            )
            .await
            .unwrap();

        assert_eq!(obs.seq(), 1);
        assert_eq!(
            log.calls(),
            vec![
                SandboxCall::MoveCursor(100, 100),
                SandboxCall::LeftClick,
                SandboxCall::CaptureScreenshot,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_does_not_touch_sandbox() {
        let mut sandbox = RecordingSandbox::new();
        let log = sandbox.log();
        let mut exec = executor();
        let start = tokio::time::Instant::now();

        exec.execute(
            &mut sandbox,
            &Action::Wait {
                duration: Duration::from_secs(3),
            },
        )
        .await
        .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(3500));
        assert_eq!(log.calls(), vec![SandboxCall::CaptureScreenshot]);
        assert_eq!(log.mutating_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_action_still_observes() {
        let mut sandbox = RecordingSandbox::new();
        let log = sandbox.log();
        let mut exec = executor();

        let obs = exec
            .execute(&mut sandbox, &Action::Unrecognized { kind: "drag".into() })
            .await
            .unwrap();
        assert_eq!(obs.seq(), 1);
        assert_eq!(log.calls(), vec![SandboxCall::CaptureScreenshot]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primitive_failure_propagates_and_stops() {
        let mut sandbox = RecordingSandbox::new().fail_on("move_cursor");
        let log = sandbox.log();
        let mut exec = executor();

        let err = exec
            .execute(
                &mut sandbox,
                &Action::Click {
                    x: -5,
                    y: 99999,
                    button: MouseButton::Right,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Sandbox(SandboxError::Command { .. })
        ));
        assert_eq!(log.calls(), vec![SandboxCall::MoveCursor(-5, 99999)]);
        assert!(exec.latest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_longer_than_sandbox_timeout() {
        let mut sandbox = RecordingSandbox::new();
        let mut exec = TurnExecutor::new(
            Box::new(FixedDelay(Duration::from_secs(31))),
            Duration::from_secs(30),
        );
        let start = tokio::time::Instant::now();

        let obs = exec
            .execute(&mut sandbox, &Action::Type { text: "x".into() })
            .await
            .unwrap();
        assert_eq!(obs.seq(), 1);
        assert!(start.elapsed() >= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_settle_capture_times_out() {
        let mut sandbox = RecordingSandbox::new().hang_on("capture_screenshot");
        let mut exec = TurnExecutor::new(
            Box::new(StableFrames {
                interval: Duration::from_millis(100),
                max_wait: Duration::from_secs(2),
            }),
            Duration::from_secs(5),
        );
        let err = exec
            .execute(&mut sandbox, &Action::Type { text: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout { operation: "settle", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_primitive_times_out() {
        let mut sandbox = RecordingSandbox::new().hang_on("inject_text");
        let mut exec = executor();
        let err = exec
            .execute(&mut sandbox, &Action::Type { text: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout { operation: "sandbox input", .. }));
    }
}
