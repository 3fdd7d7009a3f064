#![allow(dead_code)]
//! Match sessions
//!
//! Handles:
//! - Seating a table of four and starting a match
//! - Resuming the match left active by a previous run
//! - Running engine operations and persisting them before touching memory
//! - Ending a match and loading ended matches for the archive

use crate::game::engine::{self, TableEvent, Transition};
use crate::game::rounds::{self, Round, Rounds};
use crate::game::{HistoryEntry, Level, PlayerRoundState, Steps};
use crate::stats::MatchResult;
use crate::storage::{Match, Storage, StorageError};
use log::{debug, error, info, warn};
use thiserror::Error;

/// Number of seats at a Gaple table
pub const TABLE_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a match needs exactly {expected} players, got {found}")]
    TableSize { expected: usize, found: usize },
    #[error("player {0} was picked twice")]
    DuplicateSeat(i64),
    #[error("player {0} is not seated at this table")]
    NotSeated(i64),
    #[error("match {0} is still in progress")]
    MatchInProgress(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An active match and its in-memory mirror of the store
#[derive(Debug)]
pub struct MatchSession {
    info: Match,
    /// Seated players in seating order
    players: Vec<PlayerRoundState>,
    /// History in canonical order
    history: Vec<HistoryEntry>,
}

impl MatchSession {
    /// Seat exactly [`TABLE_SIZE`] distinct players and start a match.
    pub fn start(storage: &mut Storage, player_ids: &[i64]) -> Result<Self, SessionError> {
        if player_ids.len() != TABLE_SIZE {
            return Err(SessionError::TableSize {
                expected: TABLE_SIZE,
                found: player_ids.len(),
            });
        }
        for (i, id) in player_ids.iter().enumerate() {
            if player_ids[..i].contains(id) {
                return Err(SessionError::DuplicateSeat(*id));
            }
        }
        if let Some(active) = storage.active_match()? {
            return Err(SessionError::MatchInProgress(active.id));
        }

        let (info, players) = storage.create_match(player_ids)?;
        info!(
            "match {} started with {}",
            info.id,
            players
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(MatchSession {
            info,
            players,
            history: Vec::new(),
        })
    }

    /// Reload the most recent active match, if there is one.
    pub fn resume(storage: &Storage) -> Result<Option<Self>, SessionError> {
        let Some(info) = storage.active_match()? else {
            return Ok(None);
        };
        let players = storage.participants(info.id)?;
        let history = storage.history(info.id)?;
        info!(
            "resumed match {} ({} history entries)",
            info.id,
            history.len()
        );
        Ok(Some(MatchSession {
            info,
            players,
            history,
        }))
    }

    pub fn match_id(&self) -> i64 {
        self.info.id
    }

    pub fn started_at(&self) -> i64 {
        self.info.started_at
    }

    pub fn players(&self) -> &[PlayerRoundState] {
        &self.players
    }

    pub fn player(&self, player_id: i64) -> Option<&PlayerRoundState> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Rounds played so far, rebuilt from the history.
    pub fn rounds(&self) -> Rounds<'_> {
        rounds::rounds(&self.history, &self.player_names())
    }

    /// Advance a seated player by `steps`.
    pub fn advance(
        &mut self,
        storage: &mut Storage,
        player_id: i64,
        steps: Steps,
    ) -> Result<Vec<TableEvent>, SessionError> {
        let state = self.seated(player_id)?;
        let transition = engine::advance(state, steps);
        self.commit(storage, transition)
    }

    /// Record a completed cycle. `None` when the player is at baseline.
    pub fn declare_cycle(
        &mut self,
        storage: &mut Storage,
        player_id: i64,
    ) -> Result<Option<Vec<TableEvent>>, SessionError> {
        let state = self.seated(player_id)?;
        match engine::declare_cycle(state) {
            Some(transition) => self.commit(storage, transition).map(Some),
            None => {
                debug!("{} has no cycle to complete", state.name);
                Ok(None)
            }
        }
    }

    /// Undo a player's most recent history entry.
    ///
    /// Returns `false` when the player has no history. Counters and status
    /// are left as they are.
    pub fn undo(&mut self, storage: &mut Storage, player_id: i64) -> Result<bool, SessionError> {
        let name = self.seated(player_id)?.name.clone();
        let last = storage.last_entry_for(self.info.id, &name)?;
        let Some(plan) = engine::plan_undo(last.as_ref()) else {
            debug!("nothing to undo for {}", name);
            return Ok(false);
        };

        if let Err(e) = storage.apply_undo(self.info.id, player_id, &plan) {
            error!("undo for {} was not saved: {}", name, e);
            return Err(e.into());
        }

        if let Some(state) = self.players.iter_mut().find(|p| p.player_id == player_id) {
            state.current = plan.restored;
        }
        self.history.retain(|entry| entry.id != plan.entry_id);
        debug!(
            "undid entry {} for {}, back to {:?}",
            plan.entry_id,
            name,
            plan.restored.as_str()
        );
        Ok(true)
    }

    /// End the match and fold its counters into the roster totals.
    pub fn end(self, storage: &mut Storage) -> Result<MatchResult, SessionError> {
        let result = storage.end_match(self.info.id)?;
        match result.winner() {
            Some(name) => info!("match {} won by {}", self.info.id, name),
            None => info!("match {} ended without a winner", self.info.id),
        }
        Ok(result)
    }

    fn seated(&self, player_id: i64) -> Result<&PlayerRoundState, SessionError> {
        self.player(player_id).ok_or_else(|| {
            warn!("player {} is not seated in match {}", player_id, self.info.id);
            SessionError::NotSeated(player_id)
        })
    }

    /// Persist a transition, then mirror it in memory.
    fn commit(
        &mut self,
        storage: &mut Storage,
        transition: Transition,
    ) -> Result<Vec<TableEvent>, SessionError> {
        let appended = match storage.apply_transition(self.info.id, &transition) {
            Ok(appended) => appended,
            Err(e) => {
                error!(
                    "transition for {} was not saved: {}",
                    transition.next.name, e
                );
                return Err(e.into());
            }
        };

        if transition.table_reset {
            for state in &mut self.players {
                state.current = Level::Baseline;
            }
        }
        let Transition { next, events, .. } = transition;
        debug!(
            "{} now at {:?} (streak {}, {}, {}W/{}L)",
            next.name,
            next.current.as_str(),
            next.rt_streak,
            next.status.as_str(),
            next.match_wins,
            next.match_losses
        );
        if let Some(slot) = self.players.iter_mut().find(|p| p.player_id == next.player_id) {
            *slot = next;
        }
        self.history.extend(appended);
        Ok(events)
    }
}

/// An ended match as shown in the archive
#[derive(Debug, Clone)]
pub struct MatchArchive {
    pub info: Match,
    pub result: MatchResult,
    pub rounds: Vec<Round>,
}

impl MatchArchive {
    /// Load an ended match with its records and rounds.
    pub fn load(storage: &Storage, match_id: i64) -> Result<Self, SessionError> {
        let info = storage.match_by_id(match_id)?;
        let result = storage.match_result(match_id)?;
        let history = storage.history(match_id)?;
        let names: Vec<String> = result.records.iter().map(|r| r.name.clone()).collect();
        let rounds = rounds::rounds(&history, &names).collect();
        Ok(MatchArchive {
            info,
            result,
            rounds,
        })
    }

    pub fn winner(&self) -> Option<&str> {
        self.result.winner()
    }
}
