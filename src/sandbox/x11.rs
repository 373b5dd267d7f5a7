//! X11 sandbox driven through `xdotool` and ImageMagick `import`.
//!
//! Works against any X server reachable through `DISPLAY`, typically an Xvfb
//! virtual desktop (e.g. ":99").

use async_trait::async_trait;
use tokio::process::Command;

use super::{Sandbox, SandboxError, SandboxResult};

/// Pixels of model-requested scroll per wheel notch.
const PIXELS_PER_NOTCH: u32 = 100;

/// Upper bound on wheel notches sent for one scroll.
const MAX_NOTCHES: u32 = 50;

/// Delay between typed characters, in milliseconds.
const TYPE_DELAY_MS: &str = "12";

pub struct X11Sandbox {
    display: String,
    connected: bool,
}

impl X11Sandbox {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            connected: false,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    fn ensure_connected(&self) -> SandboxResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SandboxError::NotConnected)
        }
    }

    /// Run `xdotool` with `args` against this display, returning stdout.
    async fn xdotool(&self, args: &[&str]) -> SandboxResult<String> {
        let output = Command::new("xdotool")
            .args(args)
            .env("DISPLAY", &self.display)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SandboxError::Command {
                command: format!("xdotool {}", args.first().copied().unwrap_or_default()),
                message: describe_x11_failure(&self.display, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Turn X11 stderr noise into a message a user can act on.
fn describe_x11_failure(display: &str, stderr: &str) -> String {
    if stderr.contains("unable to open X server")
        || stderr.contains("Can't open display")
        || stderr.contains("cannot open display")
    {
        return format!("Cannot connect to display {}. The desktop may have been closed.", display);
    }
    if stderr.is_empty() {
        return "exited with non-zero status".to_string();
    }
    stderr.to_string()
}

/// Sandbox key identifier → X keysym.
fn x11_keysym(name: &str) -> &str {
    match name {
        "return" => "Return",
        "tab" => "Tab",
        "escape" => "Escape",
        "backspace" => "BackSpace",
        "delete" => "Delete",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" => "Prior",
        "pagedown" => "Next",
        "option" => "alt",
        "command" => "super",
        other => other,
    }
}

/// Convert a pixel scroll amount into (wheel button, notch count).
fn wheel_clicks(amount: i32) -> (&'static str, u32) {
    let button = if amount < 0 { "4" } else { "5" };
    let notches = (amount.unsigned_abs() / PIXELS_PER_NOTCH).clamp(1, MAX_NOTCHES);
    (button, notches)
}

#[async_trait]
impl Sandbox for X11Sandbox {
    async fn connect(&mut self) -> SandboxResult<()> {
        let geometry = self
            .xdotool(&["getdisplaygeometry"])
            .await
            .map_err(|e| SandboxError::Connection(e.to_string()))?;
        self.connected = true;
        tracing::info!(display = %self.display, geometry = %geometry, "Connected to X11 sandbox");
        Ok(())
    }

    async fn disconnect(&mut self) -> SandboxResult<()> {
        if self.connected {
            tracing::info!(display = %self.display, "Released X11 sandbox");
        }
        self.connected = false;
        Ok(())
    }

    async fn capture_screenshot(&mut self) -> SandboxResult<Vec<u8>> {
        self.ensure_connected()?;
        let output = Command::new("import")
            .args(["-window", "root", "png:-"])
            .env("DISPLAY", &self.display)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SandboxError::Capture(describe_x11_failure(
                &self.display,
                stderr.trim(),
            )));
        }
        if output.stdout.is_empty() {
            return Err(SandboxError::Capture("import produced no image data".to_string()));
        }

        Ok(output.stdout)
    }

    async fn move_cursor(&mut self, x: i32, y: i32) -> SandboxResult<()> {
        self.ensure_connected()?;
        let (x, y) = (x.to_string(), y.to_string());
        self.xdotool(&["mousemove", "--sync", &x, &y]).await.map(|_| ())
    }

    async fn left_click(&mut self) -> SandboxResult<()> {
        self.ensure_connected()?;
        self.xdotool(&["click", "1"]).await.map(|_| ())
    }

    async fn right_click(&mut self) -> SandboxResult<()> {
        self.ensure_connected()?;
        self.xdotool(&["click", "3"]).await.map(|_| ())
    }

    async fn double_click(&mut self) -> SandboxResult<()> {
        self.ensure_connected()?;
        self.xdotool(&["click", "--repeat", "2", "1"]).await.map(|_| ())
    }

    async fn press_key(&mut self, name: &str) -> SandboxResult<()> {
        self.ensure_connected()?;
        self.xdotool(&["key", x11_keysym(name)]).await.map(|_| ())
    }

    async fn scroll_vertical(&mut self, amount: i32) -> SandboxResult<()> {
        self.ensure_connected()?;
        if amount == 0 {
            return Ok(());
        }
        let (button, notches) = wheel_clicks(amount);
        let repeat = notches.to_string();
        self.xdotool(&["click", "--repeat", &repeat, button])
            .await
            .map(|_| ())
    }

    async fn inject_text(&mut self, text: &str) -> SandboxResult<()> {
        self.ensure_connected()?;
        self.xdotool(&["type", "--delay", TYPE_DELAY_MS, "--", text])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keysyms() {
        assert_eq!(x11_keysym("return"), "Return");
        assert_eq!(x11_keysym("backspace"), "BackSpace");
        assert_eq!(x11_keysym("pagedown"), "Next");
        assert_eq!(x11_keysym("a"), "a");
    }

    #[test]
    fn test_wheel_clicks() {
        assert_eq!(wheel_clicks(300), ("5", 3));
        assert_eq!(wheel_clicks(-250), ("4", 2));
        assert_eq!(wheel_clicks(40), ("5", 1));
    }

    #[test]
    fn test_wheel_clicks_at_integer_bounds() {
        assert_eq!(wheel_clicks(i32::MIN), ("4", MAX_NOTCHES));
        assert_eq!(wheel_clicks(i32::MAX), ("5", MAX_NOTCHES));
        assert_eq!(wheel_clicks(2_000_000_000), ("5", MAX_NOTCHES));
        assert_eq!(wheel_clicks(-5_000), ("4", MAX_NOTCHES));
        assert_eq!(wheel_clicks(-4_900), ("4", 49));
    }

    #[test]
    fn test_display_errors_are_friendly() {
        let msg = describe_x11_failure(":99", "Error: Can't open display: :99");
        assert!(msg.contains("Cannot connect to display :99"));
        assert_eq!(describe_x11_failure(":1", ""), "exited with non-zero status");
    }

    #[tokio::test]
    async fn test_primitives_require_connection() {
        let mut sandbox = X11Sandbox::new(":99");
        assert!(matches!(
            sandbox.left_click().await,
            Err(SandboxError::NotConnected)
        ));
        assert!(matches!(
            sandbox.capture_screenshot().await,
            Err(SandboxError::NotConnected)
        ));
        // Releasing an unconnected sandbox is a no-op.
        assert!(sandbox.disconnect().await.is_ok());
    }
}
