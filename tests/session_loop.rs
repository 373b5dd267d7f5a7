use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;
use tokio_test::assert_ok;

use deskpilot::llm::ModelResponse;
use deskpilot::settle::SettleConfig;
use deskpilot::testing::{call, RecordingSandbox, SandboxCall, ScriptedModel};
use deskpilot::{Action, Config, MouseButton, Session, SessionState, Termination};

#[tokio::test(start_paused = true)]
async fn test_click_type_complete_scenario() {
    let click = Action::from_value(&json!({"type": "click", "x": 100, "y": 100}));
    let typing = Action::from_value(&json!({"type": "type", "text": "Hello!"}));
    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::actions(vec![call("call_1", click)]),
        ModelResponse::actions(vec![call("call_2", typing)]),
        ModelResponse::completion(None),
    ]));
    let sandbox = RecordingSandbox::new();
    let log = sandbox.log();

    let report = Session::new(&Config::default(), "Say hello", Box::new(sandbox), model.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.model_calls, 3);
    assert_eq!(model.calls(), 3);
    assert_eq!(log.mutating_count(), 3); // move + left click + text
    assert_eq!(report.turns.len(), 2);
    assert_eq!(
        log.calls(),
        vec![
            SandboxCall::Connect,
            SandboxCall::CaptureScreenshot,
            SandboxCall::MoveCursor(100, 100),
            SandboxCall::LeftClick,
            SandboxCall::CaptureScreenshot,
            SandboxCall::InjectText("Hello!".to_string()),
            SandboxCall::CaptureScreenshot,
            SandboxCall::Disconnect,
        ]
    );
    assert_eq!(log.count(&SandboxCall::Disconnect), 1);
    assert_eq!(
        assert_ok!(report.outcome),
        Termination::Completed { text: None }
    );
}

#[tokio::test(start_paused = true)]
async fn test_right_click_and_keys_through_session() {
    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::actions(vec![call(
            "c1",
            Action::Click {
                x: 20,
                y: 30,
                button: MouseButton::Right,
            },
        )]),
        ModelResponse::actions(vec![call(
            "c2",
            Action::from_value(&json!({"type": "keypress", "keys": ["Enter", "Tab", "XYZ"]})),
        )]),
        ModelResponse::actions(vec![call(
            "c3",
            Action::from_value(
                &json!({"type": "scroll", "x": 5, "y": 6, "scroll_x": 40, "scroll_y": -300}),
            ),
        )]),
        ModelResponse::completion(Some("finished".to_string())),
    ]));
    let sandbox = RecordingSandbox::new();
    let log = sandbox.log();

    let report = Session::new(&Config::default(), "Navigate", Box::new(sandbox), model)
        .unwrap()
        .run()
        .await;

    let mutating: Vec<SandboxCall> = log.calls().into_iter().filter(|c| c.is_mutating()).collect();
    assert_eq!(
        mutating,
        vec![
            SandboxCall::MoveCursor(20, 30),
            SandboxCall::RightClick,
            SandboxCall::PressKey("return".into()),
            SandboxCall::PressKey("tab".into()),
            SandboxCall::PressKey("xyz".into()),
            SandboxCall::MoveCursor(5, 6),
            SandboxCall::ScrollVertical(-300),
        ]
    );
    assert_eq!(
        report.outcome.unwrap(),
        Termination::Completed {
            text: Some("finished".to_string())
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_screenshots_archived_per_observation() {
    let temp = tempdir().unwrap();
    let mut config = Config::default();
    config.screenshot_dir = Some(temp.path().join("run"));

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::actions(vec![call("c1", Action::Screenshot)]),
        ModelResponse::completion(None),
    ]));
    let report = Session::new(&config, "Look", Box::new(RecordingSandbox::new()), model)
        .unwrap()
        .run()
        .await;
    assert!(report.outcome.is_ok());

    let mut files: Vec<String> = std::fs::read_dir(temp.path().join("run"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["step-0001.png", "step-0002.png"]);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_longer_than_sandbox_timeout() {
    let mut config = Config::default();
    config.sandbox_timeout_secs = 30;
    config.settle = SettleConfig::Fixed { delay_ms: 31_000 };

    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::actions(vec![call("c1", Action::Type { text: "x".into() })]),
        ModelResponse::completion(None),
    ]));
    let report = Session::new(&config, "Type", Box::new(RecordingSandbox::new()), model)
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.turns.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_extreme_model_values_do_not_abort_the_run() {
    let model = Arc::new(ScriptedModel::new(vec![
        ModelResponse::actions(vec![call(
            "c1",
            Action::from_value(&json!({
                "type": "scroll", "x": i32::MIN, "y": i32::MAX,
                "scroll_x": i64::MIN, "scroll_y": i32::MIN,
            })),
        )]),
        ModelResponse::actions(vec![call(
            "c2",
            Action::from_value(&json!({"type": "wait", "time": 1e30})),
        )]),
        ModelResponse::actions(vec![call(
            "c3",
            Action::from_value(&json!({"type": "wait", "time": -1})),
        )]),
        ModelResponse::completion(None),
    ]));
    let sandbox = RecordingSandbox::new();
    let log = sandbox.log();

    let report = Session::new(&Config::default(), "Scroll", Box::new(sandbox), model)
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.turns.len(), 3);
    assert_eq!(log.count(&SandboxCall::MoveCursor(i32::MIN, i32::MAX)), 1);
    assert_eq!(log.count(&SandboxCall::ScrollVertical(i32::MIN)), 1);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let mut config = Config::default();
    config.max_turns = 0;
    let result = Session::new(
        &config,
        "task",
        Box::new(RecordingSandbox::new()),
        Arc::new(ScriptedModel::new(vec![])),
    );
    assert!(result.is_err());
}
