use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::config::ControlsSettings;
use crate::transport::TransportCommand;

/// What a key press asks for.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum KeyAction {
    Transport(TransportCommand),
    SelectNext,
    SelectPrev,
    ToggleSelected,
    ToggleDetails,
    Quit,
}

pub fn map_key(key: KeyEvent, controls: &ControlsSettings) -> Option<KeyAction> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let seek = |sign: f64| {
        let step = if shift {
            controls.seek_large_seconds
        } else {
            controls.seek_small_seconds
        };
        KeyAction::Transport(TransportCommand::SeekBy(sign * step))
    };

    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Char(' ') => KeyAction::Transport(TransportCommand::TogglePlay),
        KeyCode::Char('n') => KeyAction::Transport(TransportCommand::Next),
        KeyCode::Char('p') => KeyAction::Transport(TransportCommand::Previous),
        KeyCode::Char('m') => KeyAction::Transport(TransportCommand::ToggleMute),
        KeyCode::Left => seek(-1.0),
        KeyCode::Right => seek(1.0),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            KeyAction::Transport(TransportCommand::VolumeBy(controls.volume_step))
        }
        KeyCode::Char('-') => KeyAction::Transport(TransportCommand::VolumeBy(-controls.volume_step)),
        KeyCode::Char('j') | KeyCode::Down => KeyAction::SelectNext,
        KeyCode::Char('k') | KeyCode::Up => KeyAction::SelectPrev,
        KeyCode::Enter => KeyAction::ToggleSelected,
        KeyCode::Char('i') => KeyAction::ToggleDetails,
        _ => return None,
    };
    Some(action)
}

/// Apply `action` to the app. Returns `true` when shutdown is requested.
pub fn apply(action: KeyAction, app: &mut App) -> bool {
    match action {
        KeyAction::Transport(command) => app.transport.handle_command(command),
        KeyAction::SelectNext => app.next(),
        KeyAction::SelectPrev => app.prev(),
        KeyAction::ToggleSelected => app.toggle_selected(),
        KeyAction::ToggleDetails => app.toggle_details_window(),
        KeyAction::Quit => return true,
    }
    false
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::app::AppViews;
    use crate::testing::{Harness, PlayMode};
    use crate::ui::views::{DeepLink, FooterState, ListViewport, TrackRow};
    use crate::waveform::Palette;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
        map_key(KeyEvent::new(code, modifiers), &ControlsSettings::default())
    }

    #[test]
    fn arrows_seek_by_the_small_step_and_shift_by_the_large() {
        assert_eq!(
            press(KeyCode::Right, KeyModifiers::NONE),
            Some(KeyAction::Transport(TransportCommand::SeekBy(5.0)))
        );
        assert_eq!(
            press(KeyCode::Left, KeyModifiers::SHIFT),
            Some(KeyAction::Transport(TransportCommand::SeekBy(-30.0)))
        );
    }

    #[test]
    fn volume_and_quit_keys() {
        assert_eq!(
            press(KeyCode::Char('-'), KeyModifiers::NONE),
            Some(KeyAction::Transport(TransportCommand::VolumeBy(-0.05)))
        );
        assert_eq!(
            press(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(KeyAction::Quit)
        );
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::NONE), None);
        assert_eq!(press(KeyCode::Tab, KeyModifiers::NONE), None);
    }

    #[test]
    fn keys_drive_the_transport() {
        let mut h = Harness::new(&[100.0, 150.0], PlayMode::Immediate);
        let views = AppViews {
            rows: vec![Rc::new(TrackRow::default()), Rc::new(TrackRow::default())],
            footer: Rc::new(FooterState::default()),
            link: Rc::new(DeepLink::new(None)),
            viewport: Rc::new(ListViewport::default()),
        };
        let mut app = App::new(h.transport.clone(), views, Palette::default(), "test".into());

        let space = press(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(space, Some(KeyAction::Transport(TransportCommand::TogglePlay)));
        assert!(!apply(space.unwrap(), &mut app));
        h.run();
        assert_eq!(h.playing(), vec![0]);

        apply(press(KeyCode::Right, KeyModifiers::NONE).unwrap(), &mut app);
        assert_eq!(h.tracks[0].adapter().current_time(), 5.0);

        apply(press(KeyCode::Char('n'), KeyModifiers::NONE).unwrap(), &mut app);
        h.run();
        assert_eq!(h.playing(), vec![1]);

        apply(press(KeyCode::Char('m'), KeyModifiers::NONE).unwrap(), &mut app);
        assert!(h.transport.state().muted);

        apply(press(KeyCode::Down, KeyModifiers::NONE).unwrap(), &mut app);
        assert_eq!(app.selected, 1);
        assert!(apply(KeyAction::Quit, &mut app));
    }
}
