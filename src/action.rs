//! Structured actions emitted by the model.
//!
//! Actions arrive as vendor JSON (`{"type": "click", "x": 10, "y": 20, "button": "left"}`)
//! and are decoded leniently: a malformed or unknown action becomes
//! [`Action::Unrecognized`] instead of failing the run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wait used when a `wait` action carries no usable duration.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

/// Longest wait a single `wait` action may request.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Mouse button for a click. Anything that is not "right" is a left click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

impl MouseButton {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(b) if b.eq_ignore_ascii_case("right") => MouseButton::Right,
            _ => MouseButton::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move {
        x: i32,
        y: i32,
    },
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
    },
    DoubleClick {
        x: i32,
        y: i32,
    },
    Type {
        text: String,
    },
    /// One or more keys, pressed in order.
    KeyPress {
        keys: Vec<String>,
    },
    Scroll {
        x: i32,
        y: i32,
        scroll_x: i32,
        scroll_y: i32,
    },
    Wait {
        duration: Duration,
    },
    Screenshot,
    /// Kind the loop does not know how to run, or a known kind missing fields.
    Unrecognized {
        kind: String,
    },
}

impl Action {
    /// Decode a vendor action object.
    pub fn from_value(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let parsed = match kind.as_str() {
            "move" | "mouse_move" => point(value).map(|(x, y)| Action::Move { x, y }),
            "click" => point(value).map(|(x, y)| Action::Click {
                x,
                y,
                button: MouseButton::parse(value.get("button").and_then(|v| v.as_str())),
            }),
            "double_click" => point(value).map(|(x, y)| Action::DoubleClick { x, y }),
            "type" => value
                .get("text")
                .and_then(|v| v.as_str())
                .map(|text| Action::Type {
                    text: text.to_string(),
                }),
            "keypress" | "key_press" | "key" => {
                parse_keys(value).map(|keys| Action::KeyPress { keys })
            }
            "scroll" => point(value).map(|(x, y)| Action::Scroll {
                x,
                y,
                scroll_x: int_field(value, "scroll_x").unwrap_or(0),
                scroll_y: int_field(value, "scroll_y").unwrap_or(0),
            }),
            "wait" => Some(Action::Wait {
                duration: parse_wait(value),
            }),
            "screenshot" => Some(Action::Screenshot),
            _ => None,
        };

        parsed.unwrap_or(Action::Unrecognized { kind })
    }

    /// Vendor name of this action kind, for logs.
    pub fn kind(&self) -> &str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::DoubleClick { .. } => "double_click",
            Action::Type { .. } => "type",
            Action::KeyPress { .. } => "keypress",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::Screenshot => "screenshot",
            Action::Unrecognized { kind } => kind,
        }
    }
}

fn int_field(value: &Value, key: &str) -> Option<i32> {
    let field = value.get(key)?;
    if let Some(i) = field.as_i64() {
        return i32::try_from(i).ok();
    }
    field.as_f64().map(|f| f.round() as i32)
}

fn point(value: &Value) -> Option<(i32, i32)> {
    Some((int_field(value, "x")?, int_field(value, "y")?))
}

fn parse_keys(value: &Value) -> Option<Vec<String>> {
    if let Some(keys) = value.get("keys").and_then(|v| v.as_array()) {
        let keys: Vec<String> = keys
            .iter()
            .filter_map(|k| k.as_str())
            .map(|k| k.to_string())
            .collect();
        return (!keys.is_empty()).then_some(keys);
    }
    value
        .get("key")
        .and_then(|v| v.as_str())
        .map(|k| vec![k.to_string()])
}

/// Requested wait, clamped to [`MAX_WAIT`]. Negative or non-numeric values
/// fall back to [`DEFAULT_WAIT`].
fn parse_wait(value: &Value) -> Duration {
    if let Some(ms) = value.get("ms").and_then(|v| v.as_u64()) {
        return Duration::from_millis(ms).min(MAX_WAIT);
    }
    for key in ["time", "seconds", "duration"] {
        let Some(secs) = value.get(key).and_then(|v| v.as_f64()) else {
            continue;
        };
        return match Duration::try_from_secs_f64(secs) {
            Ok(duration) => duration.min(MAX_WAIT),
            // Overflow only happens for huge positive values.
            Err(_) if secs > 0.0 => MAX_WAIT,
            Err(_) => DEFAULT_WAIT,
        };
    }
    DEFAULT_WAIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_click_defaults_to_left() {
        let action = Action::from_value(&json!({"type": "click", "x": 100, "y": 100}));
        assert_eq!(
            action,
            Action::Click {
                x: 100,
                y: 100,
                button: MouseButton::Left
            }
        );

        let wheel = Action::from_value(&json!({"type": "click", "x": 1, "y": 2, "button": "wheel"}));
        assert!(matches!(wheel, Action::Click { button: MouseButton::Left, .. }));

        let right = Action::from_value(&json!({"type": "click", "x": 1, "y": 2, "button": "right"}));
        assert!(matches!(right, Action::Click { button: MouseButton::Right, .. }));
    }

    #[test]
    fn test_fractional_coordinates_round() {
        let action = Action::from_value(&json!({"type": "move", "x": 10.6, "y": 3.2}));
        assert_eq!(action, Action::Move { x: 11, y: 3 });
    }

    #[test]
    fn test_keypress_accepts_list_or_single_key() {
        let chord = Action::from_value(&json!({"type": "keypress", "keys": ["CTRL", "a"]}));
        assert_eq!(
            chord,
            Action::KeyPress {
                keys: vec!["CTRL".to_string(), "a".to_string()]
            }
        );

        let single = Action::from_value(&json!({"type": "key_press", "key": "Enter"}));
        assert_eq!(
            single,
            Action::KeyPress {
                keys: vec!["Enter".to_string()]
            }
        );
    }

    #[test]
    fn test_wait_durations() {
        let secs = Action::from_value(&json!({"type": "wait", "time": 2.5}));
        assert_eq!(
            secs,
            Action::Wait {
                duration: Duration::from_millis(2500)
            }
        );

        let bare = Action::from_value(&json!({"type": "wait"}));
        assert_eq!(bare, Action::Wait { duration: DEFAULT_WAIT });
    }

    #[test]
    fn test_extreme_waits_are_clamped() {
        let wait = |value: Value| match Action::from_value(&value) {
            Action::Wait { duration } => duration,
            other => panic!("expected wait, got {other:?}"),
        };

        assert_eq!(wait(json!({"type": "wait", "time": 1e30})), MAX_WAIT);
        assert_eq!(wait(json!({"type": "wait", "seconds": f64::MAX})), MAX_WAIT);
        assert_eq!(wait(json!({"type": "wait", "ms": u64::MAX})), MAX_WAIT);
        assert_eq!(wait(json!({"type": "wait", "time": -5})), DEFAULT_WAIT);
        assert_eq!(wait(json!({"type": "wait", "duration": "soon"})), DEFAULT_WAIT);
        assert_eq!(wait(json!({"type": "wait", "time": 0})), Duration::ZERO);
    }

    #[test]
    fn test_integer_bounds_on_coordinates_and_scroll() {
        let scroll = Action::from_value(&json!({
            "type": "scroll",
            "x": i32::MAX,
            "y": i32::MIN,
            "scroll_x": i64::MAX,
            "scroll_y": i32::MIN,
        }));
        assert_eq!(
            scroll,
            Action::Scroll {
                x: i32::MAX,
                y: i32::MIN,
                scroll_x: 0,
                scroll_y: i32::MIN,
            }
        );

        // Out-of-range integers make the point unusable.
        let far = Action::from_value(&json!({"type": "move", "x": 1i64 << 40, "y": 0}));
        assert!(matches!(far, Action::Unrecognized { .. }));

        // Huge floats saturate instead of wrapping.
        let saturated = Action::from_value(&json!({"type": "move", "x": 1e20, "y": -1e20}));
        assert_eq!(
            saturated,
            Action::Move {
                x: i32::MAX,
                y: i32::MIN
            }
        );
    }

    #[test]
    fn test_unknown_and_malformed_become_unrecognized() {
        let drag = Action::from_value(&json!({"type": "drag", "path": []}));
        assert_eq!(
            drag,
            Action::Unrecognized {
                kind: "drag".to_string()
            }
        );

        let missing_y = Action::from_value(&json!({"type": "click", "x": 4}));
        assert_eq!(missing_y.kind(), "click");
        assert!(matches!(missing_y, Action::Unrecognized { .. }));

        let untyped = Action::from_value(&json!({"x": 1}));
        assert!(matches!(untyped, Action::Unrecognized { .. }));
    }
}
