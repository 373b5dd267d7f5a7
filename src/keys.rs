//! Key-name normalization between model vendors and the sandbox.
//!
//! Vendors spell keys differently ("Return", "ENTER", "ArrowUp", "BackSpace").
//! The sandbox accepts one lower-case identifier per key.

/// Vendor spelling (lower-cased) → sandbox key identifier.
const KEY_TABLE: &[(&str, &str)] = &[
    ("enter", "return"),
    ("return", "return"),
    ("tab", "tab"),
    ("escape", "escape"),
    ("esc", "escape"),
    ("backspace", "backspace"),
    ("delete", "delete"),
    ("del", "delete"),
    ("space", "space"),
    ("up", "up"),
    ("arrowup", "up"),
    ("down", "down"),
    ("arrowdown", "down"),
    ("left", "left"),
    ("arrowleft", "left"),
    ("right", "right"),
    ("arrowright", "right"),
    ("home", "home"),
    ("end", "end"),
    ("pageup", "pageup"),
    ("page_up", "pageup"),
    ("pagedown", "pagedown"),
    ("page_down", "pagedown"),
    ("ctrl", "ctrl"),
    ("control", "ctrl"),
    ("alt", "option"),
    ("option", "option"),
    ("shift", "shift"),
    ("cmd", "command"),
    ("command", "command"),
    ("meta", "command"),
    ("super", "command"),
    ("win", "command"),
];

/// Map a vendor key name to the sandbox identifier.
///
/// Lookup ignores case. Names missing from the table pass through lower-cased.
pub fn normalize_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    KEY_TABLE
        .iter()
        .find(|(vendor, _)| *vendor == lowered)
        .map(|(_, sandbox)| (*sandbox).to_string())
        .unwrap_or(lowered)
}
