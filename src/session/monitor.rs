//! Integrity monitoring for an active exam session.
//!
//! The monitor is a pure classifier: the embedding shell forwards raw UI
//! events (visibility changes, focus changes, clipboard actions, key chords)
//! and gets back either a violation to log or a pass-through. Classified
//! events must also be suppressed at the source.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabSwitch,
    WindowBlur,
    FullscreenExit,
    RightClick,
    CopyAttempt,
    CutAttempt,
    PasteAttempt,
    DevtoolsShortcut,
    ScreenshotKey,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TabSwitch => "tab_switch",
            Self::WindowBlur => "window_blur",
            Self::FullscreenExit => "fullscreen_exit",
            Self::RightClick => "right_click",
            Self::CopyAttempt => "copy_attempt",
            Self::CutAttempt => "cut_attempt",
            Self::PasteAttempt => "paste_attempt",
            Self::DevtoolsShortcut => "devtools_shortcut",
            Self::ScreenshotKey => "screenshot_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// A pressed key plus modifier state, as reported by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyCombo {
    pub fn plain(key: &str) -> Self {
        Self { key: key.to_string(), ctrl: false, shift: false, alt: false, meta: false }
    }

    pub fn ctrl(key: &str) -> Self {
        Self { ctrl: true, ..Self::plain(key) }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self { ctrl: true, shift: true, ..Self::plain(key) }
    }

    pub fn meta_shift(key: &str) -> Self {
        Self { meta: true, shift: true, ..Self::plain(key) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    VisibilityHidden,
    FocusLost,
    ContextMenu,
    Clipboard(ClipboardAction),
    Key(KeyCombo),
}

/// Classify a raw shell event. `Some` means the event breaches exam
/// integrity: the caller logs the violation and suppresses the event.
/// `None` lets the event through untouched.
pub fn classify(event: &MonitorEvent) -> Option<ViolationKind> {
    match event {
        MonitorEvent::VisibilityHidden => Some(ViolationKind::TabSwitch),
        MonitorEvent::FocusLost => Some(ViolationKind::WindowBlur),
        MonitorEvent::ContextMenu => Some(ViolationKind::RightClick),
        MonitorEvent::Clipboard(ClipboardAction::Copy) => Some(ViolationKind::CopyAttempt),
        MonitorEvent::Clipboard(ClipboardAction::Cut) => Some(ViolationKind::CutAttempt),
        MonitorEvent::Clipboard(ClipboardAction::Paste) => Some(ViolationKind::PasteAttempt),
        MonitorEvent::Key(combo) => classify_key(combo),
    }
}

fn classify_key(combo: &KeyCombo) -> Option<ViolationKind> {
    let key = combo.key.to_ascii_lowercase();

    // Devtools chords: F12, Ctrl+Shift+I/J/C, Ctrl+U (view-source).
    if key == "f12" {
        return Some(ViolationKind::DevtoolsShortcut);
    }
    if combo.ctrl && combo.shift && matches!(key.as_str(), "i" | "j" | "c") {
        return Some(ViolationKind::DevtoolsShortcut);
    }
    if combo.ctrl && !combo.shift && key == "u" {
        return Some(ViolationKind::DevtoolsShortcut);
    }

    // OS screenshot chords: PrintScreen, Win+Shift+S, macOS Cmd+Shift+3/4/5.
    if key == "printscreen" {
        return Some(ViolationKind::ScreenshotKey);
    }
    if combo.meta && combo.shift && matches!(key.as_str(), "3" | "4" | "5" | "s") {
        return Some(ViolationKind::ScreenshotKey);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_and_focus_map_to_distinct_kinds() {
        assert_eq!(classify(&MonitorEvent::VisibilityHidden), Some(ViolationKind::TabSwitch));
        assert_eq!(classify(&MonitorEvent::FocusLost), Some(ViolationKind::WindowBlur));
    }

    #[test]
    fn clipboard_actions_are_each_classified() {
        assert_eq!(
            classify(&MonitorEvent::Clipboard(ClipboardAction::Copy)),
            Some(ViolationKind::CopyAttempt)
        );
        assert_eq!(
            classify(&MonitorEvent::Clipboard(ClipboardAction::Cut)),
            Some(ViolationKind::CutAttempt)
        );
        assert_eq!(
            classify(&MonitorEvent::Clipboard(ClipboardAction::Paste)),
            Some(ViolationKind::PasteAttempt)
        );
    }

    #[test]
    fn devtools_chords_are_caught() {
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::plain("F12"))),
            Some(ViolationKind::DevtoolsShortcut)
        );
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::ctrl_shift("I"))),
            Some(ViolationKind::DevtoolsShortcut)
        );
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::ctrl_shift("j"))),
            Some(ViolationKind::DevtoolsShortcut)
        );
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::ctrl("u"))),
            Some(ViolationKind::DevtoolsShortcut)
        );
    }

    #[test]
    fn screenshot_chords_are_caught() {
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::plain("PrintScreen"))),
            Some(ViolationKind::ScreenshotKey)
        );
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::meta_shift("4"))),
            Some(ViolationKind::ScreenshotKey)
        );
        assert_eq!(
            classify(&MonitorEvent::Key(KeyCombo::meta_shift("s"))),
            Some(ViolationKind::ScreenshotKey)
        );
    }

    #[test]
    fn ordinary_typing_passes_through() {
        assert_eq!(classify(&MonitorEvent::Key(KeyCombo::plain("a"))), None);
        assert_eq!(classify(&MonitorEvent::Key(KeyCombo::ctrl("s"))), None);
        assert_eq!(classify(&MonitorEvent::Key(KeyCombo::plain("Enter"))), None);
    }
}
