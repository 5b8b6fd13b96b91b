use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hotspot_core::Kpi;

use crate::app::{App, Granularity, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Re-read the dashboard files from disk
    Reload,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Down, Enter, Esc, Left, Up};

    // Global shortcuts
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if !key.modifiers.is_empty() && key.modifiers != KeyModifiers::SHIFT {
        return Action::None;
    }
    match key.code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('r') => return Action::Reload,
        _ => {}
    }

    match app.screen {
        Screen::GranularitySelect => match key.code {
            Up | KeyCode::Char('k') => {
                app.granularity_index = app.granularity_index.saturating_sub(1);
            }
            Down | KeyCode::Char('j') => {
                if app.granularity_index + 1 < Granularity::ALL.len() {
                    app.granularity_index += 1;
                }
            }
            Enter | KeyCode::Char(' ') => app.select_current_granularity(),
            _ => {}
        },

        Screen::KpiSelect => match key.code {
            Up | KeyCode::Char('k') => {
                app.kpi_index = app.kpi_index.saturating_sub(1);
            }
            Down | KeyCode::Char('j') => {
                if app.kpi_index + 1 < Kpi::ALL.len() {
                    app.kpi_index += 1;
                }
            }
            Enter | KeyCode::Char(' ') => app.select_current_kpi(),
            Left | Esc => app.screen = Screen::GranularitySelect,
            _ => {}
        },

        Screen::MapView => match key.code {
            Up | KeyCode::Char('k') => {
                app.ranking_index = app.ranking_index.saturating_sub(1);
            }
            Down | KeyCode::Char('j') => {
                if app.ranking_index + 1 < app.data.features.len() {
                    app.ranking_index += 1;
                }
            }
            KeyCode::Char('t') => app.toggle_overlay(),
            Left | Esc | KeyCode::Char('b') => {
                app.screen = match app.granularity {
                    Granularity::Municipality => Screen::KpiSelect,
                    Granularity::Gps => Screen::GranularitySelect,
                };
            }
            _ => {}
        },
    }
    Action::None
}
