//! Gaple - score keeper for four-player Gaple tables
//!
//! Count up, don't bust, and stay off the KADES list.

mod app;
mod config;
mod game;
mod session;
mod stats;
mod storage;
mod tui;

use app::{AppCoordinator, Screen};
use config::Config;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use game::Steps;
use log::info;
use std::error::Error;
use std::time::Duration;
use storage::Storage;
use tui::Tui;

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    config.init_logging()?;
    info!("gaple starting, database at {}", config.db_path.display());

    let storage = Storage::open(&config.db_path)?;
    let mut coordinator = AppCoordinator::new(storage);

    // Initialize terminal
    let mut terminal = Tui::new()?;
    terminal.enter()?;

    let poll_interval = Duration::from_millis(250);

    loop {
        terminal.draw(|frame| tui::render(frame, &coordinator))?;

        if event::poll(poll_interval)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    handle_key(&mut coordinator, key.code);
                }
            }
        }

        if coordinator.should_quit {
            break;
        }
    }

    info!("gaple exiting");
    // Terminal cleanup happens automatically via Tui::drop
    Ok(())
}

/// Which key map applies
enum KeyMap {
    NameInput,
    Roster,
    ConfirmEnd,
    Board,
    Archive,
    Notice,
}

impl KeyMap {
    fn of(screen: &Screen) -> Self {
        match screen {
            Screen::Roster { input: Some(_), .. } => KeyMap::NameInput,
            Screen::Roster { .. } => KeyMap::Roster,
            Screen::Board(board) if board.confirming_end => KeyMap::ConfirmEnd,
            Screen::Board(_) => KeyMap::Board,
            Screen::Archive { .. } => KeyMap::Archive,
            Screen::Result { .. } | Screen::Error { .. } => KeyMap::Notice,
        }
    }
}

/// Route a key press to the current screen
fn handle_key(coordinator: &mut AppCoordinator, code: KeyCode) {
    if code == KeyCode::Esc {
        coordinator.back();
        return;
    }

    match KeyMap::of(&coordinator.screen) {
        KeyMap::NameInput => match code {
            KeyCode::Enter => coordinator.roster_submit(),
            KeyCode::Backspace => coordinator.roster_backspace(),
            KeyCode::Char(c) if !c.is_control() => coordinator.roster_char(c),
            _ => {}
        },
        KeyMap::Roster => match code {
            KeyCode::Up => coordinator.roster_up(),
            KeyCode::Down => coordinator.roster_down(),
            KeyCode::Char(' ') => coordinator.roster_toggle_pick(),
            KeyCode::Char('a') => coordinator.roster_begin_add(),
            KeyCode::Char('r') => coordinator.roster_begin_rename(),
            KeyCode::Char('d') => coordinator.roster_delete(),
            KeyCode::Char('h') => coordinator.open_archive(),
            KeyCode::Enter => coordinator.roster_submit(),
            _ => {}
        },
        KeyMap::ConfirmEnd => {
            if let KeyCode::Char('y') | KeyCode::Enter = code {
                coordinator.board_confirm_end();
            }
        }
        KeyMap::Board => match code {
            KeyCode::Left => coordinator.board_left(),
            KeyCode::Right => coordinator.board_right(),
            KeyCode::Char('a') | KeyCode::Char('1') => coordinator.board_advance(Steps::One),
            KeyCode::Char('s') | KeyCode::Char('2') => coordinator.board_advance(Steps::Two),
            KeyCode::Char('t') => coordinator.board_cycle(),
            KeyCode::Char('u') => coordinator.board_undo(),
            KeyCode::Char('e') => coordinator.board_request_end(),
            _ => {}
        },
        KeyMap::Archive => match code {
            KeyCode::Up => coordinator.archive_up(),
            KeyCode::Down => coordinator.archive_down(),
            KeyCode::Enter => coordinator.archive_select(),
            _ => {}
        },
        KeyMap::Notice => {
            if code == KeyCode::Enter {
                coordinator.go_to_roster();
            }
        }
    }
}
