//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::DraftField;

/// Events generated from user input in the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    // Session intents
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Publish,

    // Field navigation
    NextField,
    PrevField,

    // Input editing
    StartEditing,
    StopEditing,
    /// Enter while editing: submit the form the focused field belongs to
    Submit,
    CharInput(char),
    Backspace,
    CursorLeft,
    CursorRight,

    // Message log
    ScrollUp,
    ScrollDown,

    // Popups
    ToggleHelp,
    CloseHelp,

    // System
    Quit,
}

/// Input mode
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Editing,
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(
    key: KeyEvent,
    focus: DraftField,
    input_mode: InputMode,
    show_help: bool,
) -> Option<UiEvent> {
    use crossterm::event::KeyEventKind;

    if key.kind != KeyEventKind::Press {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char('c') = key.code {
            return Some(UiEvent::Quit);
        }
    }

    if show_help {
        return Some(UiEvent::CloseHelp);
    }

    match input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => Some(UiEvent::Quit),
            KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
            KeyCode::Char('c') => Some(UiEvent::Connect),
            KeyCode::Char('d') => Some(UiEvent::Disconnect),
            KeyCode::Char('s') => Some(UiEvent::Subscribe),
            KeyCode::Char('u') => Some(UiEvent::Unsubscribe),
            KeyCode::Char('p') => Some(UiEvent::Publish),
            KeyCode::Char('e') | KeyCode::Enter => Some(UiEvent::StartEditing),
            KeyCode::Tab => Some(UiEvent::NextField),
            KeyCode::BackTab => Some(UiEvent::PrevField),
            KeyCode::Up => Some(UiEvent::ScrollUp),
            KeyCode::Down => Some(UiEvent::ScrollDown),
            _ => None,
        },
        InputMode::Editing => match key.code {
            KeyCode::Esc => Some(UiEvent::StopEditing),
            KeyCode::Left => Some(UiEvent::CursorLeft),
            KeyCode::Right => Some(UiEvent::CursorRight),
            KeyCode::Backspace => Some(UiEvent::Backspace),
            KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
            KeyCode::Tab => Some(UiEvent::NextField),
            KeyCode::Enter => match focus {
                DraftField::SubscribeSubject | DraftField::PublishPayload => Some(UiEvent::Submit),
                DraftField::PublishSubject => Some(UiEvent::StopEditing),
            },
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_normal_mode_intents() {
        let focus = DraftField::SubscribeSubject;
        let map = |code| key_to_ui_event(press(code), focus, InputMode::Normal, false);
        assert_eq!(map(KeyCode::Char('c')), Some(UiEvent::Connect));
        assert_eq!(map(KeyCode::Char('s')), Some(UiEvent::Subscribe));
        assert_eq!(map(KeyCode::Char('p')), Some(UiEvent::Publish));
        assert_eq!(map(KeyCode::Enter), Some(UiEvent::StartEditing));
    }

    #[test]
    fn test_editing_mode_types_letters() {
        let event = key_to_ui_event(
            press(KeyCode::Char('c')),
            DraftField::PublishPayload,
            InputMode::Editing,
            false,
        );
        assert_eq!(event, Some(UiEvent::CharInput('c')));
    }

    #[test]
    fn test_enter_submits_depending_on_field() {
        let enter = |focus| key_to_ui_event(press(KeyCode::Enter), focus, InputMode::Editing, false);
        assert_eq!(enter(DraftField::SubscribeSubject), Some(UiEvent::Submit));
        assert_eq!(enter(DraftField::PublishPayload), Some(UiEvent::Submit));
        assert_eq!(enter(DraftField::PublishSubject), Some(UiEvent::StopEditing));
    }

    #[test]
    fn test_help_swallows_keys_but_ctrl_c_quits() {
        let focus = DraftField::SubscribeSubject;
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('c')), focus, InputMode::Normal, true),
            Some(UiEvent::CloseHelp)
        );
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(
            key_to_ui_event(ctrl_c, focus, InputMode::Editing, true),
            Some(UiEvent::Quit)
        );
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        assert_eq!(
            key_to_ui_event(key, DraftField::SubscribeSubject, InputMode::Normal, false),
            None
        );
    }
}
