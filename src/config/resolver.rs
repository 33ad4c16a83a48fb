use std::sync::Arc;

use crossterm::event::KeyEvent;

use crate::config::actions::{NavAction, PickerAction};
use crate::config::keybindings::KeybindingsConfig;

pub struct KeyResolver {
    pub keybindings: Arc<KeybindingsConfig>,
}

impl KeyResolver {
    pub const fn new(keybindings: Arc<KeybindingsConfig>) -> Self {
        Self { keybindings }
    }

    // Navigation actions
    pub fn matches_nav(&self, event: &KeyEvent, action: NavAction) -> bool {
        let kb = &self.keybindings.navigation;
        match action {
            NavAction::Up => kb.up.matches(event),
            NavAction::Down => kb.down.matches(event),
            NavAction::PageUp => kb.page_up.matches(event),
            NavAction::PageDown => kb.page_down.matches(event),
            NavAction::Home => kb.home.matches(event),
            NavAction::End => kb.end.matches(event),
            NavAction::Select => kb.select.matches(event),
        }
    }

    pub fn display_nav(&self, action: NavAction) -> String {
        let kb = &self.keybindings.navigation;
        match action {
            NavAction::Up => kb.up.display(),
            NavAction::Down => kb.down.display(),
            NavAction::PageUp => kb.page_up.display(),
            NavAction::PageDown => kb.page_down.display(),
            NavAction::Home => kb.home.display(),
            NavAction::End => kb.end.display(),
            NavAction::Select => kb.select.display(),
        }
    }

    // Picker actions
    pub fn matches_picker(&self, event: &KeyEvent, action: PickerAction) -> bool {
        let kb = &self.keybindings.picker;
        match action {
            PickerAction::Cancel => kb.cancel.matches(event),
        }
    }

    pub fn display_picker(&self, action: PickerAction) -> String {
        let kb = &self.keybindings.picker;
        match action {
            PickerAction::Cancel => kb.cancel.display(),
        }
    }
}

impl Default for KeyResolver {
    fn default() -> Self {
        Self::new(Arc::new(KeybindingsConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyModifiers};

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_default_navigation() {
        let resolver = KeyResolver::default();
        assert!(resolver.matches_nav(&key(KeyCode::Down), NavAction::Down));
        assert!(resolver.matches_nav(&key(KeyCode::Char('j')), NavAction::Down));
        assert!(resolver.matches_nav(&key(KeyCode::Enter), NavAction::Select));
        assert!(!resolver.matches_nav(&key(KeyCode::Enter), NavAction::Down));
    }

    #[test]
    fn test_default_cancel() {
        let resolver = KeyResolver::default();
        assert!(resolver.matches_picker(&key(KeyCode::Esc), PickerAction::Cancel));
        assert!(resolver.matches_picker(&key(KeyCode::Char('q')), PickerAction::Cancel));
        assert_eq!(resolver.display_picker(PickerAction::Cancel), "Esc/q");
    }
}
