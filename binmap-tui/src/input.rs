use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use binmap_core::model::ViewState;

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `controller.dismiss_location_prompt()`
    DismissPrompt,
    /// Run `controller.refresh()`
    Refresh,
}

pub(crate) fn is_quit(key: &KeyEvent) -> bool {
    (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        || (key.code == KeyCode::Char('q') && key.modifiers.is_empty())
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Char, Enter, Esc, Left, Right, Tab};

    if is_quit(&key) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.state() {
        ViewState::Loading => {}

        ViewState::LocationError => match key.code {
            Enter | Esc | Char(' ') => action = Action::DismissPrompt,
            _ => {}
        },

        ViewState::Ready => match key.code {
            Right | Tab | Char('l') => app.select_next(),
            Left | BackTab | Char('h') => app.select_prev(),
            Enter | Char(' ') => {
                app.click_selected();
            }
            Esc => {
                app.close_overlay();
            }
            Char('r') => action = Action::Refresh,
            _ => {}
        },
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_shortcuts() {
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::ALT)));
    }
}
