// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use lambdactl_app::{AppCommand, ViewMode};

pub fn command_for_key(mode: ViewMode, key: KeyEvent) -> Option<AppCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(AppCommand::Quit),
            KeyCode::Char('d') if mode.list().is_some() => Some(AppCommand::PageDown),
            KeyCode::Char('u') if mode.list().is_some() => Some(AppCommand::PageUp),
            _ => None,
        };
    }
    if key.code == KeyCode::Char('q') {
        return Some(AppCommand::Quit);
    }

    match mode {
        ViewMode::DetailOverlay => match key.code {
            KeyCode::Esc => Some(AppCommand::Back),
            KeyCode::Char('s') => Some(AppCommand::OpenShell),
            _ => None,
        },
        ViewMode::LaunchConfirm => match key.code {
            KeyCode::Esc => Some(AppCommand::Back),
            KeyCode::Char('l') => Some(AppCommand::Launch),
            _ => None,
        },
        ViewMode::ShellSession => None,
        ViewMode::InstanceList
        | ViewMode::OfferingList
        | ViewMode::FilesystemList
        | ViewMode::CredentialList => list_command(key.code),
    }
}

fn list_command(code: KeyCode) -> Option<AppCommand> {
    match code {
        KeyCode::Tab => Some(AppCommand::NextView),
        KeyCode::BackTab => Some(AppCommand::PrevView),
        KeyCode::Enter => Some(AppCommand::Select),
        KeyCode::Char('r') => Some(AppCommand::Refresh),
        KeyCode::Char('x') => Some(AppCommand::CancelLaunch),
        KeyCode::Char('j') | KeyCode::Down => Some(AppCommand::MoveDown(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(AppCommand::MoveUp(1)),
        KeyCode::Char('g') | KeyCode::Home => Some(AppCommand::MoveTop),
        KeyCode::Char('G') | KeyCode::End => Some(AppCommand::MoveBottom),
        KeyCode::PageDown => Some(AppCommand::PageDown),
        KeyCode::PageUp => Some(AppCommand::PageUp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::command_for_key;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
    use lambdactl_app::{AppCommand, ViewMode};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn quit_keys_work_in_every_interactive_mode() {
        for mode in [
            ViewMode::InstanceList,
            ViewMode::CredentialList,
            ViewMode::DetailOverlay,
            ViewMode::LaunchConfirm,
        ] {
            assert_eq!(
                command_for_key(mode, key(KeyCode::Char('q'))),
                Some(AppCommand::Quit)
            );
            assert_eq!(command_for_key(mode, ctrl('c')), Some(AppCommand::Quit));
        }
    }

    #[test]
    fn list_keys_map_to_navigation() {
        let mode = ViewMode::OfferingList;
        assert_eq!(
            command_for_key(mode, key(KeyCode::Tab)),
            Some(AppCommand::NextView)
        );
        assert_eq!(
            command_for_key(mode, KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(AppCommand::PrevView)
        );
        assert_eq!(
            command_for_key(mode, key(KeyCode::Char('j'))),
            Some(AppCommand::MoveDown(1))
        );
        assert_eq!(
            command_for_key(mode, key(KeyCode::Up)),
            Some(AppCommand::MoveUp(1))
        );
        assert_eq!(
            command_for_key(mode, key(KeyCode::Char('G'))),
            Some(AppCommand::MoveBottom)
        );
        assert_eq!(command_for_key(mode, ctrl('d')), Some(AppCommand::PageDown));
        assert_eq!(
            command_for_key(mode, key(KeyCode::Char('x'))),
            Some(AppCommand::CancelLaunch)
        );
    }

    #[test]
    fn modal_keys_are_scoped() {
        assert_eq!(
            command_for_key(ViewMode::DetailOverlay, key(KeyCode::Char('s'))),
            Some(AppCommand::OpenShell)
        );
        assert_eq!(
            command_for_key(ViewMode::DetailOverlay, key(KeyCode::Char('l'))),
            None
        );
        assert_eq!(
            command_for_key(ViewMode::LaunchConfirm, key(KeyCode::Char('l'))),
            Some(AppCommand::Launch)
        );
        assert_eq!(
            command_for_key(ViewMode::LaunchConfirm, key(KeyCode::Esc)),
            Some(AppCommand::Back)
        );
        assert_eq!(
            command_for_key(ViewMode::DetailOverlay, key(KeyCode::Tab)),
            None
        );
        assert_eq!(
            command_for_key(ViewMode::InstanceList, key(KeyCode::Char('s'))),
            None
        );
    }

    #[test]
    fn release_events_are_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(command_for_key(ViewMode::InstanceList, release), None);
    }
}
