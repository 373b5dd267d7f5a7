use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use deskpilot::{Config, OpenAiResponsesClient, Session, Termination, X11Sandbox};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let task = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if task.trim().is_empty() {
        anyhow::bail!("usage: deskpilot <task description>");
    }

    let config = match std::env::var("DESKPILOT_CONFIG") {
        Ok(path) => Config::load(&path).with_context(|| format!("loading config {}", path))?,
        Err(_) => Config::from_env(),
    };
    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;

    let model = Arc::new(OpenAiResponsesClient::new(api_key, &config));
    let sandbox = Box::new(X11Sandbox::new(config.x11_display.clone()));
    let session = Session::new(&config, task, sandbox, model)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping session");
            on_signal.cancel();
        }
    });

    let report = session.run_until_cancelled(cancel).await;
    tracing::info!(
        session_id = %report.session_id,
        state = %report.state,
        model_calls = report.model_calls,
        actions = report.turns.len(),
        "Session finished"
    );

    match report.into_result()? {
        Termination::Completed { text: Some(text) } => println!("{}", text),
        Termination::Completed { text: None } => println!("Done."),
        Termination::UnrecognizedReply { detail } => {
            println!("Stopped: model reply not understood ({})", detail)
        }
    }
    Ok(())
}
