//! Application screen state management
//!
//! Handles transitions between different application screens:
//! - Roster (manage players, pick the table, leaderboard)
//! - Board (match in progress)
//! - Result (match just ended)
//! - Archive (ended matches and their rounds)

use crate::game::Steps;
use crate::session::{MatchArchive, MatchSession, TABLE_SIZE};
use crate::stats::{MatchResult, StatsTracker};
use crate::storage::{Match, Player, Storage};
use log::{error, warn};

use super::state::Board;

/// Longest accepted player name
pub const MAX_NAME_LEN: usize = 24;

/// What the name prompt is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMode {
    Add,
    Rename(i64),
}

/// Name prompt on the roster screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInput {
    pub mode: NameMode,
    pub text: String,
}

/// The current application screen
pub enum Screen {
    /// Player roster
    Roster {
        /// Newest first
        players: Vec<Player>,
        /// Lifetime totals, best first
        leaderboard: Vec<Player>,
        /// Lifetime stats rebuilt from ended matches
        stats: StatsTracker,
        selected: usize,
        /// Picked player ids in seating order
        picks: Vec<i64>,
        input: Option<NameInput>,
        notice: String,
    },
    /// Match in progress
    Board(Board),
    /// Match just ended
    Result { result: MatchResult },
    /// Ended matches
    Archive {
        matches: Vec<Match>,
        selected: usize,
        details: Option<MatchArchive>,
    },
    /// Storage error
    Error { message: String },
}

/// Main application coordinator
pub struct AppCoordinator {
    pub storage: Storage,
    /// Current screen
    pub screen: Screen,
    /// Whether the application should quit
    pub should_quit: bool,
}

impl AppCoordinator {
    /// Create a coordinator, resuming an unfinished match if there is one
    pub fn new(storage: Storage) -> Self {
        let mut coordinator = Self {
            storage,
            screen: Screen::Error {
                message: String::new(),
            },
            should_quit: false,
        };
        match MatchSession::resume(&coordinator.storage) {
            Ok(Some(session)) => coordinator.screen = Screen::Board(Board::new(session)),
            Ok(None) => coordinator.go_to_roster(),
            Err(e) => {
                error!("could not resume match: {}", e);
                coordinator.screen = Screen::Error {
                    message: e.to_string(),
                };
            }
        }
        coordinator
    }

    /// Quit the application
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Go to the roster, reloading players and stats
    pub fn go_to_roster(&mut self) {
        self.go_to_roster_with(String::new());
    }

    fn go_to_roster_with(&mut self, notice: String) {
        let loaded = self.storage.list_players().and_then(|players| {
            let leaderboard = self.storage.leaderboard()?;
            let mut results = self.storage.ended_match_results()?;
            let mut stats = StatsTracker::new();
            stats.rebuild_from_matches(&mut results);
            Ok((players, leaderboard, stats))
        });
        self.screen = match loaded {
            Ok((players, leaderboard, stats)) => Screen::Roster {
                players,
                leaderboard,
                stats,
                selected: 0,
                picks: Vec::new(),
                input: None,
                notice,
            },
            Err(e) => {
                error!("could not load roster: {}", e);
                Screen::Error {
                    message: e.to_string(),
                }
            }
        };
    }

    /// Esc: leave the current screen (or the app)
    pub fn back(&mut self) {
        match &mut self.screen {
            Screen::Roster { input, .. } if input.is_some() => {
                *input = None;
                return;
            }
            Screen::Board(board) if board.confirming_end => {
                board.cancel_end();
                return;
            }
            Screen::Archive { details, .. } if details.is_some() => {
                *details = None;
                return;
            }
            _ => {}
        }
        match self.screen {
            Screen::Roster { .. } | Screen::Board(_) => self.quit(),
            _ => self.go_to_roster(),
        }
    }

    // === Roster ===

    pub fn roster_up(&mut self) {
        if let Screen::Roster { selected, input: None, .. } = &mut self.screen {
            *selected = selected.saturating_sub(1);
        }
    }

    pub fn roster_down(&mut self) {
        if let Screen::Roster { selected, players, input: None, .. } = &mut self.screen {
            if *selected + 1 < players.len() {
                *selected += 1;
            }
        }
    }

    /// Pick or unpick the highlighted player
    pub fn roster_toggle_pick(&mut self) {
        if let Screen::Roster { players, selected, picks, input: None, notice, .. } = &mut self.screen {
            let Some(player) = players.get(*selected) else {
                return;
            };
            if let Some(pos) = picks.iter().position(|&id| id == player.id) {
                picks.remove(pos);
            } else if picks.len() < TABLE_SIZE {
                picks.push(player.id);
            } else {
                *notice = format!("The table seats {} players", TABLE_SIZE);
            }
        }
    }

    pub fn roster_begin_add(&mut self) {
        if let Screen::Roster { input, .. } = &mut self.screen {
            *input = Some(NameInput {
                mode: NameMode::Add,
                text: String::new(),
            });
        }
    }

    pub fn roster_begin_rename(&mut self) {
        if let Screen::Roster { players, selected, input, .. } = &mut self.screen {
            if let Some(player) = players.get(*selected) {
                *input = Some(NameInput {
                    mode: NameMode::Rename(player.id),
                    text: player.name.clone(),
                });
            }
        }
    }

    pub fn roster_char(&mut self, c: char) {
        if let Screen::Roster { input: Some(input), .. } = &mut self.screen {
            if input.text.chars().count() < MAX_NAME_LEN {
                input.text.push(c);
            }
        }
    }

    pub fn roster_backspace(&mut self) {
        if let Screen::Roster { input: Some(input), .. } = &mut self.screen {
            input.text.pop();
        }
    }

    /// Enter: save the name prompt, or start the match
    pub fn roster_submit(&mut self) {
        let pending = match &self.screen {
            Screen::Roster { input, .. } => input.clone(),
            _ => return,
        };
        match pending {
            Some(input) => self.save_name(input),
            None => self.start_match(),
        }
    }

    fn save_name(&mut self, input: NameInput) {
        let saved = match input.mode {
            NameMode::Add => self.storage.create_player(&input.text),
            NameMode::Rename(id) => self.storage.rename_player(id, &input.text),
        };
        match saved {
            Ok(player) => self.go_to_roster_with(format!("Saved {}", player.name)),
            Err(e) => {
                warn!("player name not saved: {}", e);
                if let Screen::Roster { notice, .. } = &mut self.screen {
                    *notice = e.to_string();
                }
            }
        }
    }

    /// Delete the highlighted player
    pub fn roster_delete(&mut self) {
        let target = match &self.screen {
            Screen::Roster { players, selected, input: None, .. } => {
                players.get(*selected).map(|p| (p.id, p.name.clone()))
            }
            _ => None,
        };
        let Some((id, name)) = target else {
            return;
        };
        match self.storage.delete_player(id) {
            Ok(()) => self.go_to_roster_with(format!("Deleted {}", name)),
            Err(e) => {
                warn!("player {} not deleted: {}", id, e);
                if let Screen::Roster { notice, .. } = &mut self.screen {
                    *notice = e.to_string();
                }
            }
        }
    }

    fn start_match(&mut self) {
        let picks = match &self.screen {
            Screen::Roster { picks, .. } => picks.clone(),
            _ => return,
        };
        match MatchSession::start(&mut self.storage, &picks) {
            Ok(session) => self.screen = Screen::Board(Board::new(session)),
            Err(e) => {
                if let Screen::Roster { notice, .. } = &mut self.screen {
                    *notice = e.to_string();
                }
            }
        }
    }

    // === Board ===

    pub fn board_left(&mut self) {
        if let Screen::Board(board) = &mut self.screen {
            board.select_prev();
        }
    }

    pub fn board_right(&mut self) {
        if let Screen::Board(board) = &mut self.screen {
            board.select_next();
        }
    }

    pub fn board_advance(&mut self, steps: Steps) {
        if let Screen::Board(board) = &mut self.screen {
            if !board.confirming_end {
                board.advance(&mut self.storage, steps);
            }
        }
    }

    pub fn board_cycle(&mut self) {
        if let Screen::Board(board) = &mut self.screen {
            if !board.confirming_end {
                board.declare_cycle(&mut self.storage);
            }
        }
    }

    pub fn board_undo(&mut self) {
        if let Screen::Board(board) = &mut self.screen {
            if !board.confirming_end {
                board.undo(&mut self.storage);
            }
        }
    }

    pub fn board_request_end(&mut self) {
        if let Screen::Board(board) = &mut self.screen {
            board.request_end();
        }
    }

    /// Confirm ending the match
    pub fn board_confirm_end(&mut self) {
        let confirming = matches!(&self.screen, Screen::Board(board) if board.confirming_end);
        if !confirming {
            return;
        }
        let placeholder = Screen::Error {
            message: String::new(),
        };
        let Screen::Board(board) = std::mem::replace(&mut self.screen, placeholder) else {
            return;
        };

        match board.finish(&mut self.storage) {
            Ok(result) => self.screen = Screen::Result { result },
            Err(e) => {
                error!("match not ended: {}", e);
                self.screen = match MatchSession::resume(&self.storage) {
                    Ok(Some(session)) => {
                        let mut board = Board::new(session);
                        board.feedback = format!("NOT SAVED: {}", e);
                        Screen::Board(board)
                    }
                    _ => Screen::Error {
                        message: e.to_string(),
                    },
                };
            }
        }
    }

    // === Archive ===

    pub fn open_archive(&mut self) {
        match self.storage.ended_matches() {
            Ok(matches) => {
                self.screen = Screen::Archive {
                    matches,
                    selected: 0,
                    details: None,
                }
            }
            Err(e) => {
                error!("could not load archive: {}", e);
                self.screen = Screen::Error {
                    message: e.to_string(),
                };
            }
        }
    }

    pub fn archive_up(&mut self) {
        if let Screen::Archive { selected, details: None, .. } = &mut self.screen {
            *selected = selected.saturating_sub(1);
        }
    }

    pub fn archive_down(&mut self) {
        if let Screen::Archive { selected, matches, details: None } = &mut self.screen {
            if *selected + 1 < matches.len() {
                *selected += 1;
            }
        }
    }

    /// Open the highlighted match
    pub fn archive_select(&mut self) {
        let chosen = match &self.screen {
            Screen::Archive { matches, selected, details: None } => {
                matches.get(*selected).map(|m| m.id)
            }
            _ => None,
        };
        let Some(match_id) = chosen else {
            return;
        };
        match MatchArchive::load(&self.storage, match_id) {
            Ok(archive) => {
                if let Screen::Archive { details, .. } = &mut self.screen {
                    *details = Some(archive);
                }
            }
            Err(e) => {
                error!("could not load match {}: {}", match_id, e);
                self.screen = Screen::Error {
                    message: e.to_string(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Level;

    fn coordinator_with_players(names: &[&str]) -> AppCoordinator {
        let storage = Storage::open_in_memory().unwrap();
        for name in names {
            storage.create_player(name).unwrap();
        }
        AppCoordinator::new(storage)
    }

    fn pick_all(coordinator: &mut AppCoordinator, count: usize) {
        for i in 0..count {
            coordinator.roster_toggle_pick();
            if i + 1 < count {
                coordinator.roster_down();
            }
        }
    }

    fn notice(coordinator: &AppCoordinator) -> String {
        match &coordinator.screen {
            Screen::Roster { notice, .. } => notice.clone(),
            _ => panic!("expected roster screen"),
        }
    }

    #[test]
    fn test_starts_on_roster() {
        let coordinator = coordinator_with_players(&["Andi"]);
        assert!(matches!(coordinator.screen, Screen::Roster { .. }));
        assert!(!coordinator.should_quit);
    }

    #[test]
    fn test_add_player_through_prompt() {
        let mut coordinator = coordinator_with_players(&[]);
        coordinator.roster_begin_add();
        for c in " Eko ".chars() {
            coordinator.roster_char(c);
        }
        coordinator.roster_submit();

        assert_eq!(notice(&coordinator), "Saved Eko");
        match &coordinator.screen {
            Screen::Roster { players, input, .. } => {
                assert_eq!(players.len(), 1);
                assert!(input.is_none());
            }
            _ => panic!("expected roster screen"),
        }
    }

    #[test]
    fn test_duplicate_name_keeps_prompt_open() {
        let mut coordinator = coordinator_with_players(&["Andi"]);
        coordinator.roster_begin_add();
        for c in "Andi".chars() {
            coordinator.roster_char(c);
        }
        coordinator.roster_submit();

        assert!(notice(&coordinator).contains("already exists"));
        assert!(matches!(&coordinator.screen, Screen::Roster { input: Some(_), .. }));

        // Esc closes the prompt before it closes the app
        coordinator.back();
        assert!(!coordinator.should_quit);
        coordinator.back();
        assert!(coordinator.should_quit);
    }

    #[test]
    fn test_cannot_start_short_table() {
        let mut coordinator = coordinator_with_players(&["Andi", "Budi", "Citra"]);
        pick_all(&mut coordinator, 3);
        coordinator.roster_submit();
        assert!(notice(&coordinator).contains("exactly 4"));
    }

    #[test]
    fn test_fifth_pick_is_refused() {
        let mut coordinator = coordinator_with_players(&["A", "B", "C", "D", "E"]);
        pick_all(&mut coordinator, 5);
        match &coordinator.screen {
            Screen::Roster { picks, notice, .. } => {
                assert_eq!(picks.len(), TABLE_SIZE);
                assert!(notice.contains("seats 4"));
            }
            _ => panic!("expected roster screen"),
        }
    }

    #[test]
    fn test_full_match_flow() {
        let mut coordinator = coordinator_with_players(&["Andi", "Budi", "Citra", "Dewi"]);
        pick_all(&mut coordinator, 4);
        coordinator.roster_submit();
        assert!(matches!(coordinator.screen, Screen::Board(_)));

        coordinator.board_advance(Steps::One);
        coordinator.board_cycle();
        coordinator.board_right();
        coordinator.board_advance(Steps::Two);

        // Ending needs a confirmation
        coordinator.board_confirm_end();
        assert!(matches!(coordinator.screen, Screen::Board(_)));
        coordinator.board_request_end();
        coordinator.board_advance(Steps::One);
        if let Screen::Board(board) = &coordinator.screen {
            assert_eq!(board.session().players()[1].current, Level::BigL);
        }
        coordinator.board_confirm_end();

        let winner = match &coordinator.screen {
            Screen::Result { result } => result.winner().map(str::to_string),
            _ => panic!("expected result screen"),
        };
        // Players were listed newest first, so Dewi sat first
        assert_eq!(winner.as_deref(), Some("Dewi"));

        coordinator.back();
        match &coordinator.screen {
            Screen::Roster { stats, .. } => {
                assert_eq!(stats.get("Dewi").unwrap().matches_won, 1);
            }
            _ => panic!("expected roster screen"),
        }

        coordinator.open_archive();
        coordinator.archive_select();
        match &coordinator.screen {
            Screen::Archive { matches, details: Some(archive), .. } => {
                assert_eq!(matches.len(), 1);
                assert_eq!(archive.winner(), Some("Dewi"));
            }
            _ => panic!("expected archive details"),
        }
        coordinator.back();
        assert!(matches!(&coordinator.screen, Screen::Archive { details: None, .. }));
    }

    #[test]
    fn test_active_match_is_resumed() {
        let mut storage = Storage::open_in_memory().unwrap();
        let ids: Vec<i64> = ["Andi", "Budi", "Citra", "Dewi"]
            .iter()
            .map(|name| storage.create_player(name).unwrap().id)
            .collect();
        let mut session = MatchSession::start(&mut storage, &ids).unwrap();
        session.advance(&mut storage, ids[2], Steps::Two).unwrap();

        let coordinator = AppCoordinator::new(storage);
        match &coordinator.screen {
            Screen::Board(board) => {
                assert_eq!(board.session().players()[2].current, Level::BigL);
            }
            _ => panic!("expected board screen"),
        }
    }

    #[test]
    fn test_seated_player_cannot_be_deleted() {
        let mut storage = Storage::open_in_memory().unwrap();
        let ids: Vec<i64> = ["Andi", "Budi", "Citra", "Dewi"]
            .iter()
            .map(|name| storage.create_player(name).unwrap().id)
            .collect();
        MatchSession::start(&mut storage, &ids).unwrap();
        let mut coordinator = AppCoordinator::new(storage);

        // Leave the board without ending the match
        coordinator.go_to_roster();
        coordinator.roster_delete();
        assert!(notice(&coordinator).contains("active match"));
    }
}
