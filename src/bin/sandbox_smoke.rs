//! Sandbox smoke check.
//!
//! Connects to the X11 sandbox, saves a screenshot, clicks at (100, 100) and
//! types "Hello!". Useful to confirm the desktop is reachable before running
//! the agent.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use deskpilot::{Config, Sandbox, X11Sandbox};

async fn exercise(sandbox: &mut X11Sandbox, output: &str) -> anyhow::Result<()> {
    let png = sandbox.capture_screenshot().await?;
    tracing::info!(bytes = png.len(), "Screenshot succeeded");
    tokio::fs::write(output, &png)
        .await
        .with_context(|| format!("writing {}", output))?;
    tracing::info!("Screenshot saved to {}", output);

    sandbox.move_cursor(100, 100).await?;
    sandbox.left_click().await?;
    tracing::info!("Click succeeded");

    sandbox.inject_text("Hello!").await?;
    tracing::info!("Type succeeded");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "screenshot.png".to_string());

    let mut sandbox = X11Sandbox::new(config.x11_display.clone());
    sandbox
        .connect()
        .await
        .with_context(|| format!("connecting to display {}", config.x11_display))?;
    tracing::info!("Connected, testing screenshot");

    let result = exercise(&mut sandbox, &output).await;
    sandbox.disconnect().await?;
    result
}
