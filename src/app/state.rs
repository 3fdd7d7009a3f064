#![allow(dead_code)]
//! Board state for the match in progress

use crate::game::engine::{EventKind, TableEvent};
use crate::game::{PlayerRoundState, Steps};
use crate::session::{MatchSession, SessionError};
use crate::stats::MatchResult;
use crate::storage::Storage;
use std::collections::VecDeque;

/// Maximum entries kept in the event feed
pub const EVENT_FEED_MAX: usize = 8;

/// Announcement text for a table event
pub fn banner_text(event: &TableEvent) -> String {
    match &event.kind {
        EventKind::Bust(count) => format!("HAHAHAHA {} BRO {}", count, event.player),
        EventKind::Rw => format!("{} is on RW", event.player),
        EventKind::Kades => format!("Selamat Pak KADES {}", event.player),
        EventKind::Win => format!("{} completed a cycle (TTD)", event.player),
    }
}

/// The board: a live match plus what the table sees
pub struct Board {
    session: MatchSession,
    /// Seat under the cursor
    pub selected: usize,
    /// Outcome of the last key press
    pub feedback: String,
    /// Recent table events, oldest first
    pub event_feed: VecDeque<TableEvent>,
    /// Waiting for the end-of-match confirmation
    pub confirming_end: bool,
}

impl Board {
    pub fn new(session: MatchSession) -> Self {
        Board {
            session,
            selected: 0,
            feedback: String::new(),
            event_feed: VecDeque::new(),
            confirming_end: false,
        }
    }

    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    pub fn selected_player(&self) -> Option<&PlayerRoundState> {
        self.session.players().get(self.selected)
    }

    pub fn select_prev(&mut self) {
        let seats = self.session.players().len();
        if seats > 0 {
            self.selected = (self.selected + seats - 1) % seats;
        }
    }

    pub fn select_next(&mut self) {
        let seats = self.session.players().len();
        if seats > 0 {
            self.selected = (self.selected + 1) % seats;
        }
    }

    /// Most recent announcement, if any
    pub fn banner(&self) -> Option<String> {
        self.event_feed.back().map(banner_text)
    }

    /// Advance the selected player
    pub fn advance(&mut self, storage: &mut Storage, steps: Steps) {
        let Some(player) = self.selected_player() else {
            return;
        };
        let (id, name) = (player.player_id, player.name.clone());
        match self.session.advance(storage, id, steps) {
            Ok(events) => {
                self.feedback = match self.session.player(id) {
                    Some(p) if events.is_empty() => {
                        format!("OK {} +{} -> {}", name, steps.get(), p.current.history_label())
                    }
                    _ => format!("OK {} +{}", name, steps.get()),
                };
                self.record(events);
            }
            Err(e) => self.not_saved(e),
        }
    }

    /// Record a completed cycle for the selected player
    pub fn declare_cycle(&mut self, storage: &mut Storage) {
        let Some(player) = self.selected_player() else {
            return;
        };
        let (id, name) = (player.player_id, player.name.clone());
        match self.session.declare_cycle(storage, id) {
            Ok(Some(events)) => {
                self.feedback = format!("OK {} TTD", name);
                self.record(events);
            }
            Ok(None) => self.feedback = format!("{} has nothing to complete", name),
            Err(e) => self.not_saved(e),
        }
    }

    /// Undo the selected player's last entry
    pub fn undo(&mut self, storage: &mut Storage) {
        let Some(player) = self.selected_player() else {
            return;
        };
        let (id, name) = (player.player_id, player.name.clone());
        match self.session.undo(storage, id) {
            Ok(true) => self.feedback = format!("OK undid last move of {}", name),
            Ok(false) => self.feedback = format!("Nothing to undo for {}", name),
            Err(e) => self.not_saved(e),
        }
    }

    pub fn request_end(&mut self) {
        self.confirming_end = true;
    }

    pub fn cancel_end(&mut self) {
        self.confirming_end = false;
    }

    /// End the match. The board is consumed either way; on failure the
    /// match is still active in the store and can be resumed.
    pub fn finish(self, storage: &mut Storage) -> Result<MatchResult, SessionError> {
        self.session.end(storage)
    }

    fn record(&mut self, events: Vec<TableEvent>) {
        for event in events {
            self.event_feed.push_back(event);
            if self.event_feed.len() > EVENT_FEED_MAX {
                self.event_feed.pop_front();
            }
        }
    }

    fn not_saved(&mut self, e: SessionError) {
        self.feedback = format!("NOT SAVED: {}", e);
    }
}
