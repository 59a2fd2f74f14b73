//! Key mapping from terminal events to player input.

use crate::types::{Color, InputMode, Move, Swipe};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    Move(Move),
    SelectMode(InputMode),
    NewGame,
    Abandon,
    Retry,
    Quit,
}

/// Map one key press. Releases are ignored.
pub fn map_key(key: KeyEvent, mode: InputMode) -> Option<PlayerInput> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if should_quit(key) {
        return Some(PlayerInput::Quit);
    }

    let mv = match mode {
        InputMode::ColorTap => color_key(key.code).map(Move::from),
        InputMode::Swipe => swipe_key(key.code).map(Move::from),
    };
    if let Some(mv) = mv {
        return Some(PlayerInput::Move(mv));
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') => Some(PlayerInput::SelectMode(InputMode::ColorTap)),
        KeyCode::Char('g') | KeyCode::Char('G') => Some(PlayerInput::SelectMode(InputMode::Swipe)),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(PlayerInput::NewGame),
        KeyCode::Char('x') | KeyCode::Char('X') => Some(PlayerInput::Abandon),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(PlayerInput::Retry),
        _ => None,
    }
}

fn color_key(code: KeyCode) -> Option<Color> {
    match code {
        KeyCode::Char('1') => Some(Color::Green),
        KeyCode::Char('2') => Some(Color::Yellow),
        KeyCode::Char('3') => Some(Color::Red),
        KeyCode::Char('4') => Some(Color::Blue),
        _ => None,
    }
}

fn swipe_key(code: KeyCode) -> Option<Swipe> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Swipe::Up),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Swipe::Right),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Swipe::Down),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Swipe::Left),
        _ => None,
    }
}

/// Check if key should quit the controller.
pub fn should_quit(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn test_color_keys() {
        let mode = InputMode::ColorTap;
        assert_eq!(
            map_key(press(KeyCode::Char('1')), mode),
            Some(PlayerInput::Move(Move::new(2)))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('4')), mode),
            Some(PlayerInput::Move(Move::new(5)))
        );
        // Arrows are not moves while tapping colours.
        assert_eq!(map_key(press(KeyCode::Up), mode), None);
    }

    #[test]
    fn test_swipe_keys() {
        let mode = InputMode::Swipe;
        assert_eq!(
            map_key(press(KeyCode::Up), mode),
            Some(PlayerInput::Move(Move::new(2)))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('D')), mode),
            Some(PlayerInput::Move(Move::new(3)))
        );
        assert_eq!(
            map_key(press(KeyCode::Left), mode),
            Some(PlayerInput::Move(Move::new(5)))
        );
        assert_eq!(map_key(press(KeyCode::Char('1')), mode), None);
    }

    #[test]
    fn test_session_keys() {
        let mode = InputMode::ColorTap;
        assert_eq!(
            map_key(press(KeyCode::Char('g')), mode),
            Some(PlayerInput::SelectMode(InputMode::Swipe))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('C')), InputMode::Swipe),
            Some(PlayerInput::SelectMode(InputMode::ColorTap))
        );
        assert_eq!(map_key(press(KeyCode::Char('n')), mode), Some(PlayerInput::NewGame));
        assert_eq!(map_key(press(KeyCode::Char('x')), mode), Some(PlayerInput::Abandon));
        assert_eq!(map_key(press(KeyCode::Char('r')), mode), Some(PlayerInput::Retry));
    }

    #[test]
    fn test_release_is_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('1'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(map_key(release, InputMode::ColorTap), None);
    }

    #[test]
    fn test_quit_keys() {
        assert!(should_quit(KeyEvent::from(KeyCode::Char('q'))));
        assert!(should_quit(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
        assert!(!should_quit(KeyEvent::from(KeyCode::Char('x'))));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), InputMode::Swipe),
            Some(PlayerInput::Quit)
        );
    }
}
