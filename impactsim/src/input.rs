use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Intro,
    Main,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Action {
    Quit,
    IntroNext,
    IntroBack,
    IntroSkip,
    ReplayIntro,
    HelpToggle,
    SelectField(i32),
    Adjust(i32),
    Run,
    /// Camera orbit in input units (yaw, pitch).
    Orbit(f64, f64),
    Zoom(f64),
    ResetCamera,
    ToggleColor,
}

/// Keyboard stand-in for mouse dragging, in the same units.
const ORBIT_STEP: f64 = 10.0;
const ZOOM_STEP: f64 = 0.5;

pub(crate) fn map_key(screen: Screen, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q')) {
        return Some(Action::Quit);
    }

    match screen {
        Screen::Intro => match key.code {
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Right | KeyCode::Down => {
                Some(Action::IntroNext)
            }
            KeyCode::Left | KeyCode::Up => Some(Action::IntroBack),
            KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('S') => Some(Action::IntroSkip),
            _ => None,
        },
        Screen::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('?') => Some(Action::HelpToggle),
            _ => None,
        },
        Screen::Main => {
            let coarse = if key.modifiers.contains(KeyModifiers::SHIFT) { 10 } else { 1 };
            match key.code {
                KeyCode::Up => Some(Action::SelectField(-1)),
                KeyCode::Down | KeyCode::Tab => Some(Action::SelectField(1)),
                KeyCode::BackTab => Some(Action::SelectField(-1)),
                KeyCode::Left => Some(Action::Adjust(-coarse)),
                KeyCode::Right => Some(Action::Adjust(coarse)),
                KeyCode::PageDown => Some(Action::Adjust(-10)),
                KeyCode::PageUp => Some(Action::Adjust(10)),
                KeyCode::Enter | KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Run),
                KeyCode::Char('a') => Some(Action::Orbit(-ORBIT_STEP, 0.0)),
                KeyCode::Char('d') => Some(Action::Orbit(ORBIT_STEP, 0.0)),
                KeyCode::Char('w') => Some(Action::Orbit(0.0, -ORBIT_STEP)),
                KeyCode::Char('s') => Some(Action::Orbit(0.0, ORBIT_STEP)),
                KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::Zoom(-ZOOM_STEP)),
                KeyCode::Char('-') | KeyCode::Char('_') => Some(Action::Zoom(ZOOM_STEP)),
                KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::ResetCamera),
                KeyCode::Char('m') | KeyCode::Char('M') => Some(Action::ToggleColor),
                KeyCode::Char('i') | KeyCode::Char('I') => Some(Action::ReplayIntro),
                KeyCode::Char('h') | KeyCode::Char('?') => Some(Action::HelpToggle),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_everywhere() {
        for screen in [Screen::Intro, Screen::Main, Screen::Help] {
            assert_eq!(map_key(screen, key(KeyCode::Char('q'))), Some(Action::Quit));
            let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
            assert_eq!(map_key(screen, ctrl_c), Some(Action::Quit));
        }
    }

    #[test]
    fn test_s_depends_on_screen() {
        assert_eq!(map_key(Screen::Intro, key(KeyCode::Char('s'))), Some(Action::IntroSkip));
        assert_eq!(
            map_key(Screen::Main, key(KeyCode::Char('s'))),
            Some(Action::Orbit(0.0, ORBIT_STEP))
        );
    }

    #[test]
    fn test_shift_adjusts_coarsely() {
        let shifted = KeyEvent::new(KeyCode::Right, KeyModifiers::SHIFT);
        assert_eq!(map_key(Screen::Main, shifted), Some(Action::Adjust(10)));
        assert_eq!(map_key(Screen::Main, key(KeyCode::Left)), Some(Action::Adjust(-1)));
        assert_eq!(map_key(Screen::Main, key(KeyCode::Enter)), Some(Action::Run));
        assert_eq!(map_key(Screen::Help, key(KeyCode::Enter)), None);
    }
}
