//! Keyboard shortcut registry.

use crate::engine::DragMode;
use crate::input::KeyEvent;

/// What a shortcut does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleDrawing,
    ToggleErasing,
    CycleView,
    Undo,
    SaveDrawing,
    SaveScreenshot,
    SetDragMode(DragMode),
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub action: Action,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: &'static str, ctrl: bool, action: Action, description: &'static str) -> Self {
        Self {
            key,
            ctrl,
            action,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        if self.ctrl {
            format!("Ctrl+{}", self.key)
        } else {
            self.key.to_string()
        }
    }

    /// Check if a key press triggers this shortcut. Ctrl must match exactly.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.ctrl == event.modifiers.ctrl && self.key.eq_ignore_ascii_case(&event.key)
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("D", false, Action::ToggleDrawing, "Toggle drawing tool"),
            Shortcut::new("Space", false, Action::CycleView, "Cycle image perspective"),
            Shortcut::new("Z", true, Action::Undo, "Undo previous annotation"),
            Shortcut::new("Y", true, Action::SaveDrawing, "Save volume and annotations (.nvd)"),
            Shortcut::new("B", true, Action::SaveScreenshot, "Save current slice as .png"),
            Shortcut::new("E", false, Action::ToggleErasing, "Toggle erase tool"),
            Shortcut::new("1", false, Action::SetDragMode(DragMode::Pan), "Pan mode"),
            Shortcut::new("2", false, Action::SetDragMode(DragMode::Measurement), "Measurement mode"),
            Shortcut::new("3", false, Action::SetDragMode(DragMode::Slice), "Slice cycle mode"),
        ]
    }

    /// Find the action bound to a key press.
    pub fn lookup(event: &KeyEvent) -> Option<Action> {
        Self::all()
            .into_iter()
            .find(|shortcut| shortcut.matches(event))
            .map(|shortcut| shortcut.action)
    }

    /// Log all shortcuts.
    pub fn log_all() {
        for shortcut in Self::all() {
            log::info!("  {:10} {}", shortcut.format(), shortcut.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;

    #[test]
    fn test_lookup() {
        let undo = KeyEvent::new("z", Modifiers::CTRL);
        assert_eq!(ShortcutRegistry::lookup(&undo), Some(Action::Undo));

        let measure = KeyEvent::new("2", Modifiers::NONE);
        assert_eq!(
            ShortcutRegistry::lookup(&measure),
            Some(Action::SetDragMode(DragMode::Measurement))
        );
    }

    #[test]
    fn test_ctrl_must_match() {
        assert_eq!(ShortcutRegistry::lookup(&KeyEvent::new("Z", Modifiers::NONE)), None);
        assert_eq!(ShortcutRegistry::lookup(&KeyEvent::new("D", Modifiers::CTRL)), None);
    }

    #[test]
    fn test_format() {
        let formatted: Vec<String> = ShortcutRegistry::all().iter().map(Shortcut::format).collect();
        assert!(formatted.contains(&"Ctrl+B".to_string()));
        assert!(formatted.contains(&"Space".to_string()));
    }

    #[test]
    fn test_listed_shortcuts_are_distinct() {
        ShortcutRegistry::log_all();
        let mut labels: Vec<String> = ShortcutRegistry::all().iter().map(|s| s.format()).collect();
        let count = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), count);
    }
}
