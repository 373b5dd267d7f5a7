//! Action translation: one model action → ordered sandbox primitive calls.

use std::time::Duration;

use crate::action::{Action, MouseButton};
use crate::keys::normalize_key;
use crate::sandbox::{Sandbox, SandboxResult};

/// A single call against the sandbox, or a pause of the loop itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    MoveCursor { x: i32, y: i32 },
    LeftClick,
    RightClick,
    DoubleClick,
    PressKey(String),
    ScrollVertical(i32),
    InjectText(String),
    /// Suspend the loop without touching the sandbox.
    Pause(Duration),
    /// Out-of-band capture requested by the model.
    CaptureScreenshot,
}

impl Primitive {
    /// Whether this primitive changes sandbox state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Primitive::Pause(_) | Primitive::CaptureScreenshot)
    }

    /// Issue this primitive against `sandbox`.
    ///
    /// Returns the captured PNG for [`Primitive::CaptureScreenshot`]. Pauses are
    /// the caller's job and are a no-op here.
    pub async fn apply(&self, sandbox: &mut dyn Sandbox) -> SandboxResult<Option<Vec<u8>>> {
        match self {
            Primitive::MoveCursor { x, y } => sandbox.move_cursor(*x, *y).await?,
            Primitive::LeftClick => sandbox.left_click().await?,
            Primitive::RightClick => sandbox.right_click().await?,
            Primitive::DoubleClick => sandbox.double_click().await?,
            Primitive::PressKey(key) => sandbox.press_key(key).await?,
            Primitive::ScrollVertical(amount) => sandbox.scroll_vertical(*amount).await?,
            Primitive::InjectText(text) => sandbox.inject_text(text).await?,
            Primitive::Pause(_) => {}
            Primitive::CaptureScreenshot => return Ok(Some(sandbox.capture_screenshot().await?)),
        }
        Ok(None)
    }
}

/// Translate an action into the primitives that carry it out, in order.
///
/// Coordinates are forwarded as-is. Unrecognized actions translate to nothing.
pub fn translate(action: &Action) -> Vec<Primitive> {
    match action {
        Action::Move { x, y } => vec![Primitive::MoveCursor { x: *x, y: *y }],
        Action::Click { x, y, button } => vec![
            Primitive::MoveCursor { x: *x, y: *y },
            match button {
                MouseButton::Left => Primitive::LeftClick,
                MouseButton::Right => Primitive::RightClick,
            },
        ],
        Action::DoubleClick { x, y } => {
            vec![Primitive::MoveCursor { x: *x, y: *y }, Primitive::DoubleClick]
        }
        Action::Type { text } => vec![Primitive::InjectText(text.clone())],
        Action::KeyPress { keys } => keys
            .iter()
            .map(|key| Primitive::PressKey(normalize_key(key)))
            .collect(),
        // Horizontal scroll is not exposed by the sandbox; scroll_x is dropped.
        Action::Scroll { x, y, scroll_y, .. } => vec![
            Primitive::MoveCursor { x: *x, y: *y },
            Primitive::ScrollVertical(*scroll_y),
        ],
        Action::Wait { duration } => vec![Primitive::Pause(*duration)],
        Action::Screenshot => vec![Primitive::CaptureScreenshot],
        Action::Unrecognized { kind } => {
            tracing::warn!(kind = %kind, "Unhandled action kind, skipping");
            Vec::new()
        }
    }
}
