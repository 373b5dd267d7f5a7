//! Sandbox interface: the desktop the agent drives.
//!
//! The session loop only needs screenshot capture and a handful of input
//! primitives. Implementations own their connection and are used by exactly
//! one session at a time, so every method takes `&mut self`.

mod x11;

pub use x11::X11Sandbox;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox is not connected")]
    NotConnected,

    #[error("failed to connect to sandbox: {0}")]
    Connection(String),

    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    #[error("screenshot capture failed: {0}")]
    Capture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Capabilities the loop consumes from a desktop sandbox.
///
/// Click primitives act at the current cursor position.
#[async_trait]
pub trait Sandbox: Send {
    async fn connect(&mut self) -> SandboxResult<()>;

    async fn disconnect(&mut self) -> SandboxResult<()>;

    /// Capture the screen as PNG bytes.
    async fn capture_screenshot(&mut self) -> SandboxResult<Vec<u8>>;

    async fn move_cursor(&mut self, x: i32, y: i32) -> SandboxResult<()>;

    async fn left_click(&mut self) -> SandboxResult<()>;

    async fn right_click(&mut self) -> SandboxResult<()>;

    async fn double_click(&mut self) -> SandboxResult<()>;

    async fn press_key(&mut self, name: &str) -> SandboxResult<()>;

    /// Scroll vertically; positive amounts scroll down.
    async fn scroll_vertical(&mut self, amount: i32) -> SandboxResult<()>;

    async fn inject_text(&mut self, text: &str) -> SandboxResult<()>;
}
