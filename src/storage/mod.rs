#![allow(dead_code)]
//! Persistent storage using SQLite (rusqlite)
//!
//! This module provides:
//! - SQLite database with schema versioning and forward-only migrations
//! - The player roster with lifetime totals
//! - Matches, their seated participants and the per-match history log
//! - Transactional application of engine transitions, undos and match ends

use crate::game::engine::{Transition, UndoPlan};
use crate::game::{HistoryEntry, Level, PlayerRoundState, Status};
use crate::stats::{MatchResult, PlayerRecord};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

/// Current schema version. Bump this when making schema changes.
/// Version history:
/// - v1: meta, players, matches, match_players, history
/// - v2: indexes for history ordering and seat lookups
/// - v3: seat name snapshot; seats outlive deleted players; history ordered by id
const SCHEMA_VERSION: u32 = 3;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database schema version {found} is newer than supported version {supported}")]
    FutureSchemaVersion { found: u32, supported: u32 },
    #[error("failed to create data directory: {0}")]
    CreateDirFailed(#[source] std::io::Error),
    #[error("migration from v{from} to v{to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
    #[error("player {0} not found")]
    PlayerNotFound(i64),
    #[error("match {0} not found")]
    MatchNotFound(i64),
    #[error("player {player_id} is not seated in match {match_id}")]
    ParticipantNotFound { match_id: i64, player_id: i64 },
    #[error("player name cannot be empty")]
    EmptyName,
    #[error("a player named {0:?} already exists")]
    DuplicateName(String),
    #[error("player {0} is seated in an active match")]
    PlayerInActiveMatch(i64),
    #[error("match {0} is not active")]
    MatchNotActive(i64),
}

/// A roster entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: i64,
    pub name: String,
    /// Completed cycles over all ended matches
    pub total_wins: u32,
    /// Busts over all ended matches
    pub total_losses: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Active,
    Ended,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Ended => "ended",
        }
    }

    pub fn parse(literal: &str) -> Option<MatchStatus> {
        match literal {
            "active" => Some(MatchStatus::Active),
            "ended" => Some(MatchStatus::Ended),
            _ => None,
        }
    }
}

/// A stored match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: i64,
    pub status: MatchStatus,
    /// Unix timestamp (milliseconds)
    pub started_at: i64,
    /// Set when the match is ended
    pub ended_at: Option<i64>,
}

impl Match {
    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }
}

/// The main storage handle for Gaple data.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at `path`.
    ///
    /// `:memory:` opens a throwaway in-memory database.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StorageError::CreateDirFailed)?;
        }
        let conn = Connection::open(path)?;
        info!("opened database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Storage { conn };
        storage.initialize_schema()?;
        Ok(storage)
    }

    // === Roster ===

    /// Add a player to the roster. The name is trimmed and must be unique.
    pub fn create_player(&self, name: &str) -> Result<Player, StorageError> {
        let name = self.check_name(name, None)?;
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO players (name, total_wins, total_losses, created_at, updated_at)
             VALUES (?1, 0, 0, ?2, ?2)",
            params![name, now],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("created player {} ({})", id, name);
        self.player(id)
    }

    /// Rename a player. Refused while they sit in an active match, since
    /// that match's history refers to them by name.
    pub fn rename_player(&self, id: i64, name: &str) -> Result<Player, StorageError> {
        self.player(id)?;
        let name = self.check_name(name, Some(id))?;
        if self.in_active_match(id)? {
            return Err(StorageError::PlayerInActiveMatch(id));
        }
        self.conn.execute(
            "UPDATE players SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now_millis(), id],
        )?;
        self.player(id)
    }

    /// Remove a player. Their seats in ended matches stay, under the name
    /// they played with.
    pub fn delete_player(&self, id: i64) -> Result<(), StorageError> {
        if self.in_active_match(id)? {
            return Err(StorageError::PlayerInActiveMatch(id));
        }
        let deleted = self
            .conn
            .execute("DELETE FROM players WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StorageError::PlayerNotFound(id));
        }
        debug!("deleted player {}", id);
        Ok(())
    }

    /// All players, newest first.
    pub fn list_players(&self) -> Result<Vec<Player>, StorageError> {
        self.query_players("SELECT id, name, total_wins, total_losses, created_at, updated_at
             FROM players ORDER BY created_at DESC, id DESC")
    }

    /// Lifetime leaderboard: most wins, then fewest losses, then name.
    pub fn leaderboard(&self) -> Result<Vec<Player>, StorageError> {
        self.query_players("SELECT id, name, total_wins, total_losses, created_at, updated_at
             FROM players ORDER BY total_wins DESC, total_losses ASC, name ASC")
    }

    pub fn player(&self, id: i64) -> Result<Player, StorageError> {
        self.conn
            .query_row(
                "SELECT id, name, total_wins, total_losses, created_at, updated_at
                 FROM players WHERE id = ?1",
                params![id],
                player_from_row,
            )
            .optional()?
            .ok_or(StorageError::PlayerNotFound(id))
    }

    fn query_players(&self, sql: &str) -> Result<Vec<Player>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], player_from_row)?;
        let mut players = Vec::new();
        for row in rows {
            players.push(row?);
        }
        Ok(players)
    }

    fn check_name(&self, name: &str, except: Option<i64>) -> Result<String, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::EmptyName);
        }
        let taken: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM players WHERE name = ?1 AND id IS NOT ?2)",
            params![name, except],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StorageError::DuplicateName(name.to_string()));
        }
        Ok(name.to_string())
    }

    fn in_active_match(&self, player_id: i64) -> Result<bool, StorageError> {
        let seated = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM match_players mp JOIN matches m ON m.id = mp.match_id
                WHERE mp.player_id = ?1 AND m.status = 'active')",
            params![player_id],
            |row| row.get(0),
        )?;
        Ok(seated)
    }

    // === Matches ===

    /// Create an active match with the players seated in the given order.
    pub fn create_match(
        &mut self,
        player_ids: &[i64],
    ) -> Result<(Match, Vec<PlayerRoundState>), StorageError> {
        let now = now_millis();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO matches (status, started_at, ended_at) VALUES ('active', ?1, NULL)",
            params![now],
        )?;
        let match_id = tx.last_insert_rowid();

        let mut seated = Vec::with_capacity(player_ids.len());
        for (seat, &player_id) in player_ids.iter().enumerate() {
            let name: String = tx
                .query_row(
                    "SELECT name FROM players WHERE id = ?1",
                    params![player_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StorageError::PlayerNotFound(player_id))?;

            let state = PlayerRoundState::new(player_id, name);
            tx.execute(
                "INSERT INTO match_players
                    (match_id, player_id, player_name, seat, current_count, status, rt_streak,
                     match_wins, match_losses)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0)",
                params![
                    match_id,
                    player_id,
                    state.name,
                    seat as i64,
                    state.current.as_str(),
                    state.status.as_str()
                ],
            )?;
            seated.push(state);
        }
        tx.commit()?;

        let created = Match {
            id: match_id,
            status: MatchStatus::Active,
            started_at: now,
            ended_at: None,
        };
        Ok((created, seated))
    }

    /// The most recently started match that has not been ended.
    pub fn active_match(&self) -> Result<Option<Match>, StorageError> {
        let found = self
            .conn
            .query_row(
                "SELECT id, status, started_at, ended_at FROM matches
                 WHERE status = 'active' ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                match_from_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn match_by_id(&self, match_id: i64) -> Result<Match, StorageError> {
        self.conn
            .query_row(
                "SELECT id, status, started_at, ended_at FROM matches WHERE id = ?1",
                params![match_id],
                match_from_row,
            )
            .optional()?
            .ok_or(StorageError::MatchNotFound(match_id))
    }

    /// Ended matches, newest first.
    pub fn ended_matches(&self) -> Result<Vec<Match>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status, started_at, ended_at FROM matches
             WHERE status = 'ended' ORDER BY ended_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], match_from_row)?;
        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?);
        }
        Ok(matches)
    }

    /// Seated players of a match in seating order.
    pub fn participants(&self, match_id: i64) -> Result<Vec<PlayerRoundState>, StorageError> {
        participants_on(&self.conn, match_id)
    }

    /// History of a match in canonical order.
    pub fn history(&self, match_id: i64) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, match_id, player_name, action, previous_count, new_count, created_at
             FROM history WHERE match_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![match_id], history_from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// The most recent history entry of one player in a match.
    pub fn last_entry_for(
        &self,
        match_id: i64,
        player_name: &str,
    ) -> Result<Option<HistoryEntry>, StorageError> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, match_id, player_name, action, previous_count, new_count, created_at
                 FROM history WHERE match_id = ?1 AND player_name = ?2
                 ORDER BY id DESC LIMIT 1",
                params![match_id, player_name],
                history_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Persist an engine transition as one unit.
    ///
    /// The table reset, the acting player's row and the new history entries
    /// are written in one transaction; on any error nothing is written.
    /// Returns the appended entries with their ids and timestamps.
    pub fn apply_transition(
        &mut self,
        match_id: i64,
        transition: &Transition,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let now = now_millis();
        let next = &transition.next;
        let tx = self.conn.transaction()?;
        ensure_active(&tx, match_id)?;

        if transition.table_reset {
            tx.execute(
                "UPDATE match_players SET current_count = ?1 WHERE match_id = ?2",
                params![Level::Baseline.as_str(), match_id],
            )?;
        }

        let updated = tx.execute(
            "UPDATE match_players
             SET current_count = ?1, status = ?2, rt_streak = ?3, match_wins = ?4, match_losses = ?5
             WHERE match_id = ?6 AND player_id = ?7",
            params![
                next.current.as_str(),
                next.status.as_str(),
                next.rt_streak,
                next.match_wins,
                next.match_losses,
                match_id,
                next.player_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::ParticipantNotFound {
                match_id,
                player_id: next.player_id,
            });
        }

        let mut appended = Vec::with_capacity(transition.entries.len());
        for entry in &transition.entries {
            tx.execute(
                "INSERT INTO history (match_id, player_name, action, previous_count, new_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    match_id,
                    entry.player_name,
                    entry.action,
                    entry.previous_count,
                    entry.new_count,
                    now
                ],
            )?;
            appended.push(HistoryEntry {
                id: tx.last_insert_rowid(),
                match_id,
                player_name: entry.player_name.clone(),
                action: entry.action.clone(),
                previous_count: entry.previous_count.clone(),
                new_count: entry.new_count.clone(),
                created_at: now,
            });
        }

        tx.commit()?;
        Ok(appended)
    }

    /// Restore a player's count and delete the undone history entry as one unit.
    pub fn apply_undo(
        &mut self,
        match_id: i64,
        player_id: i64,
        plan: &UndoPlan,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        ensure_active(&tx, match_id)?;

        let updated = tx.execute(
            "UPDATE match_players SET current_count = ?1 WHERE match_id = ?2 AND player_id = ?3",
            params![plan.restored.as_str(), match_id, player_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ParticipantNotFound {
                match_id,
                player_id,
            });
        }
        tx.execute(
            "DELETE FROM history WHERE id = ?1 AND match_id = ?2",
            params![plan.entry_id, match_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// End a match and fold its counters into the roster totals.
    pub fn end_match(&mut self, match_id: i64) -> Result<MatchResult, StorageError> {
        let now = now_millis();
        let tx = self.conn.transaction()?;
        ensure_active(&tx, match_id)?;

        let seated = participants_on(&tx, match_id)?;
        for state in &seated {
            tx.execute(
                "UPDATE players
                 SET total_wins = total_wins + ?1, total_losses = total_losses + ?2, updated_at = ?3
                 WHERE id = ?4",
                params![state.match_wins, state.match_losses, now, state.player_id],
            )?;
        }
        tx.execute(
            "UPDATE matches SET status = 'ended', ended_at = ?1 WHERE id = ?2",
            params![now, match_id],
        )?;
        tx.commit()?;

        info!("match {} ended", match_id);
        Ok(MatchResult::new(match_id, records_of(&seated)))
    }

    /// Final (or, for an active match, running) records of a match.
    pub fn match_result(&self, match_id: i64) -> Result<MatchResult, StorageError> {
        let found = self.match_by_id(match_id)?;
        let seated = self.participants(match_id)?;
        let mut result = MatchResult::new(match_id, records_of(&seated));
        result.completed = !found.is_active();
        Ok(result)
    }

    /// Results of every ended match.
    pub fn ended_match_results(&self) -> Result<Vec<MatchResult>, StorageError> {
        self.ended_matches()?
            .iter()
            .map(|m| self.match_result(m.id))
            .collect()
    }

    // Private helper methods

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let mut current_version = self.get_schema_version()?;

        if current_version == 0 {
            // Fresh database: lay down v1, then migrate forward like any other
            self.create_schema_v1()?;
            current_version = 1;
        }

        if current_version < SCHEMA_VERSION {
            self.migrate_schema(current_version)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(StorageError::FutureSchemaVersion {
                found: current_version,
                supported: SCHEMA_VERSION,
            });
        }

        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StorageError> {
        let table_exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> = self
            .conn
            .query_row("SELECT schema_version FROM meta LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(version.unwrap_or(0))
    }

    fn create_schema_v1(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE meta (
                schema_version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                total_wins INTEGER NOT NULL DEFAULT 0,
                total_losses INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status TEXT NOT NULL CHECK (status IN ('active', 'ended')),
                started_at INTEGER NOT NULL,
                ended_at INTEGER
            );

            -- One row per seated player, holding their in-match state
            CREATE TABLE match_players (
                match_id INTEGER NOT NULL REFERENCES matches (id) ON DELETE CASCADE,
                player_id INTEGER NOT NULL REFERENCES players (id) ON DELETE CASCADE,
                seat INTEGER NOT NULL,
                current_count TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'normal',
                rt_streak INTEGER NOT NULL DEFAULT 0,
                match_wins INTEGER NOT NULL DEFAULT 0,
                match_losses INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (match_id, player_id)
            );

            -- Append-only log; rows are only removed by undo
            CREATE TABLE history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                match_id INTEGER NOT NULL REFERENCES matches (id) ON DELETE CASCADE,
                player_name TEXT NOT NULL,
                action TEXT NOT NULL,
                previous_count TEXT,
                new_count TEXT,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT INTO meta (schema_version, created_at) VALUES (1, ?1)",
            params![now_millis()],
        )?;

        Ok(())
    }

    fn migrate_schema(&self, from_version: u32) -> Result<(), StorageError> {
        let mut current_version = from_version;

        while current_version < SCHEMA_VERSION {
            match current_version {
                1 => {
                    self.migrate_v1_to_v2()?;
                    current_version = 2;
                }
                2 => {
                    self.migrate_v2_to_v3()?;
                    current_version = 3;
                }
                _ => {
                    return Err(StorageError::MigrationFailed {
                        from: current_version,
                        to: SCHEMA_VERSION,
                        reason: format!("no migration path from version {}", current_version),
                    });
                }
            }
        }

        self.conn.execute(
            "UPDATE meta SET schema_version = ?1",
            params![SCHEMA_VERSION],
        )?;
        info!("database schema migrated from v{} to v{}", from_version, SCHEMA_VERSION);

        Ok(())
    }

    /// Migrate from schema v1 to v2: add ordering and lookup indexes
    fn migrate_v1_to_v2(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_history_match ON history (match_id, created_at, id);
            CREATE INDEX IF NOT EXISTS idx_match_players_player ON match_players (player_id);
            "#,
        )?;
        Ok(())
    }

    /// Migrate from schema v2 to v3: seats keep the name they were taken
    /// under and survive the player's deletion; history is ordered by id alone
    fn migrate_v2_to_v3(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            BEGIN;

            CREATE TABLE match_players_v3 (
                match_id INTEGER NOT NULL REFERENCES matches (id) ON DELETE CASCADE,
                player_id INTEGER REFERENCES players (id) ON DELETE SET NULL,
                player_name TEXT NOT NULL,
                seat INTEGER NOT NULL,
                current_count TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'normal',
                rt_streak INTEGER NOT NULL DEFAULT 0,
                match_wins INTEGER NOT NULL DEFAULT 0,
                match_losses INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (match_id, seat),
                UNIQUE (match_id, player_id)
            );

            INSERT INTO match_players_v3
                (match_id, player_id, player_name, seat, current_count, status, rt_streak,
                 match_wins, match_losses)
            SELECT mp.match_id, mp.player_id, p.name, mp.seat, mp.current_count, mp.status,
                   mp.rt_streak, mp.match_wins, mp.match_losses
            FROM match_players mp JOIN players p ON p.id = mp.player_id;

            DROP TABLE match_players;
            ALTER TABLE match_players_v3 RENAME TO match_players;
            CREATE INDEX IF NOT EXISTS idx_match_players_player ON match_players (player_id);

            DROP INDEX IF EXISTS idx_history_match;
            CREATE INDEX IF NOT EXISTS idx_history_match_id ON history (match_id, id);

            COMMIT;
            "#,
        )?;
        Ok(())
    }
}

fn ensure_active(conn: &Connection, match_id: i64) -> Result<(), StorageError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM matches WHERE id = ?1",
            params![match_id],
            |row| row.get(0),
        )
        .optional()?;
    match status.as_deref().and_then(MatchStatus::parse) {
        None => Err(StorageError::MatchNotFound(match_id)),
        Some(MatchStatus::Ended) => Err(StorageError::MatchNotActive(match_id)),
        Some(MatchStatus::Active) => Ok(()),
    }
}

fn participants_on(conn: &Connection, match_id: i64) -> Result<Vec<PlayerRoundState>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT player_id, player_name, current_count, rt_streak, status,
                match_wins, match_losses
         FROM match_players WHERE match_id = ?1 ORDER BY seat",
    )?;
    let rows = stmt.query_map(params![match_id], |row| {
        let status: String = row.get(4)?;
        let status = Status::parse(&status).ok_or_else(|| invalid_text(4, "status", &status))?;
        let current: String = row.get(2)?;
        // A deleted player's seat keeps its name; rowids start at 1
        let player_id: Option<i64> = row.get(0)?;
        Ok(PlayerRoundState {
            player_id: player_id.unwrap_or(0),
            name: row.get(1)?,
            current: Level::from_stored(&current),
            rt_streak: row.get(3)?,
            status,
            match_wins: row.get(5)?,
            match_losses: row.get(6)?,
        })
    })?;

    let mut seated = Vec::new();
    for row in rows {
        seated.push(row?);
    }
    Ok(seated)
}

fn records_of(seated: &[PlayerRoundState]) -> Vec<PlayerRecord> {
    seated
        .iter()
        .map(|s| PlayerRecord::new(s.name.clone(), s.match_wins, s.match_losses))
        .collect()
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        total_wins: row.get(2)?,
        total_losses: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    let status: String = row.get(1)?;
    Ok(Match {
        id: row.get(0)?,
        status: MatchStatus::parse(&status).ok_or_else(|| invalid_text(1, "match status", &status))?,
        started_at: row.get(2)?,
        ended_at: row.get(3)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        match_id: row.get(1)?,
        player_name: row.get(2)?,
        action: row.get(3)?,
        previous_count: row.get(4)?,
        new_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn invalid_text(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown {} {:?}", what, value).into(),
    )
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::{advance, declare_cycle, plan_undo};
    use crate::game::{Steps, BASELINE_PLACEHOLDER};

    fn storage_with_players() -> (Storage, Vec<i64>) {
        let storage = Storage::open_in_memory().unwrap();
        let ids = ["Andi", "Budi", "Citra", "Dewi"]
            .iter()
            .map(|name| storage.create_player(name).unwrap().id)
            .collect();
        (storage, ids)
    }

    fn seat_at(storage: &Storage, match_id: i64, player_id: i64, level: Level) {
        storage
            .conn
            .execute(
                "UPDATE match_players SET current_count = ?1 WHERE match_id = ?2 AND player_id = ?3",
                params![level.as_str(), match_id, player_id],
            )
            .unwrap();
    }

    // === Schema Tests ===

    #[test]
    fn test_schema_version_is_current() {
        let storage = Storage::open_in_memory().unwrap();
        let version: u32 = storage
            .conn
            .query_row("SELECT schema_version FROM meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_v1_database_is_migrated() {
        let storage = Storage {
            conn: Connection::open_in_memory().unwrap(),
        };
        storage.create_schema_v1().unwrap();
        assert_eq!(storage.get_schema_version().unwrap(), 1);

        storage.initialize_schema().unwrap();
        assert_eq!(storage.get_schema_version().unwrap(), SCHEMA_VERSION);

        let index_exists: bool = storage
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name='idx_history_match_id'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(index_exists, "idx_history_match_id should exist after migration");
    }

    #[test]
    fn test_v2_seats_get_name_snapshot() {
        let mut storage = Storage {
            conn: Connection::open_in_memory().unwrap(),
        };
        storage.conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        storage.create_schema_v1().unwrap();
        storage.migrate_v1_to_v2().unwrap();
        storage
            .conn
            .execute("UPDATE meta SET schema_version = 2", [])
            .unwrap();

        let now = now_millis();
        storage
            .conn
            .execute_batch(&format!(
                "INSERT INTO players (id, name, created_at, updated_at) VALUES (1, 'Andi', {now}, {now});
                 INSERT INTO matches (id, status, started_at) VALUES (1, 'ended', {now});
                 INSERT INTO match_players (match_id, player_id, seat, match_wins)
                 VALUES (1, 1, 0, 2);"
            ))
            .unwrap();

        storage.initialize_schema().unwrap();
        assert_eq!(storage.get_schema_version().unwrap(), 3);

        storage.delete_player(1).unwrap();
        let seated = storage.participants(1).unwrap();
        assert_eq!(seated.len(), 1);
        assert_eq!(seated[0].name, "Andi");
        assert_eq!(seated[0].match_wins, 2);

        // Seats still work for new matches after the rebuild
        let ids: Vec<i64> = ["Budi", "Citra", "Dewi", "Eko"]
            .iter()
            .map(|name| storage.create_player(name).unwrap().id)
            .collect();
        let (created, _) = storage.create_match(&ids).unwrap();
        assert_eq!(storage.participants(created.id).unwrap()[0].name, "Budi");
    }

    #[test]
    fn test_future_schema_is_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .conn
            .execute("UPDATE meta SET schema_version = 99", [])
            .unwrap();
        match storage.initialize_schema() {
            Err(StorageError::FutureSchemaVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected FutureSchemaVersion, got {:?}", other.err()),
        }
    }

    // === Roster Tests ===

    #[test]
    fn test_create_player_trims_name() {
        let storage = Storage::open_in_memory().unwrap();
        let player = storage.create_player("  Andi  ").unwrap();
        assert_eq!(player.name, "Andi");
        assert_eq!(player.total_wins, 0);
        assert_eq!(player.total_losses, 0);
    }

    #[test]
    fn test_empty_and_duplicate_names_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(matches!(storage.create_player("   "), Err(StorageError::EmptyName)));

        storage.create_player("Andi").unwrap();
        assert!(matches!(
            storage.create_player(" Andi"),
            Err(StorageError::DuplicateName(name)) if name == "Andi"
        ));
    }

    #[test]
    fn test_rename_player() {
        let storage = Storage::open_in_memory().unwrap();
        let andi = storage.create_player("Andi").unwrap();
        let budi = storage.create_player("Budi").unwrap();

        assert_eq!(storage.rename_player(andi.id, "Andika").unwrap().name, "Andika");
        // Keeping your own name is not a duplicate
        assert_eq!(storage.rename_player(budi.id, "Budi ").unwrap().name, "Budi");
        assert!(matches!(
            storage.rename_player(budi.id, "Andika"),
            Err(StorageError::DuplicateName(_))
        ));
        assert!(matches!(
            storage.rename_player(999, "Eko"),
            Err(StorageError::PlayerNotFound(999))
        ));
    }

    #[test]
    fn test_list_players_newest_first() {
        let (storage, ids) = storage_with_players();
        let listed: Vec<i64> = storage.list_players().unwrap().iter().map(|p| p.id).collect();
        let mut expected = ids.clone();
        expected.reverse();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_seated_player_cannot_be_deleted_or_renamed() {
        let (mut storage, ids) = storage_with_players();
        let (created, _) = storage.create_match(&ids).unwrap();

        assert!(matches!(
            storage.delete_player(ids[0]),
            Err(StorageError::PlayerInActiveMatch(_))
        ));
        assert!(matches!(
            storage.rename_player(ids[0], "Andika"),
            Err(StorageError::PlayerInActiveMatch(_))
        ));

        storage.end_match(created.id).unwrap();
        storage.delete_player(ids[0]).unwrap();
        assert!(matches!(
            storage.player(ids[0]),
            Err(StorageError::PlayerNotFound(_))
        ));
        assert_eq!(storage.participants(created.id).unwrap().len(), 4);
    }

    #[test]
    fn test_deleting_past_winner_keeps_ended_result() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();

        let mut andi = seated[0].clone();
        for _ in 0..2 {
            andi.current = Level::F;
            let win = declare_cycle(&andi).unwrap();
            storage.apply_transition(created.id, &win).unwrap();
            andi = win.next;
        }
        let mut budi = seated[1].clone();
        budi.current = Level::SmallL;
        storage
            .apply_transition(created.id, &declare_cycle(&budi).unwrap())
            .unwrap();

        let ended = storage.end_match(created.id).unwrap();
        assert_eq!(ended.winner(), Some("Andi"));

        storage.delete_player(ids[0]).unwrap();
        let archived = storage.match_result(created.id).unwrap();
        assert_eq!(archived.winner(), Some("Andi"));
        assert_eq!(archived.records, ended.records);
        assert_eq!(storage.ended_match_results().unwrap()[0].winner(), Some("Andi"));
    }

    #[test]
    fn test_rename_after_match_keeps_seat_name() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();
        storage
            .apply_transition(created.id, &advance(&seated[0], Steps::Two))
            .unwrap();
        storage.end_match(created.id).unwrap();

        storage.rename_player(ids[0], "Andika").unwrap();

        let names: Vec<String> = storage
            .participants(created.id)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Andi", "Budi", "Citra", "Dewi"]);
        assert_eq!(storage.history(created.id).unwrap()[0].player_name, "Andi");

        // New matches seat the player under the new name
        let (next, _) = storage.create_match(&ids).unwrap();
        assert_eq!(storage.participants(next.id).unwrap()[0].name, "Andika");
    }

    #[test]
    fn test_delete_missing_player() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(matches!(
            storage.delete_player(42),
            Err(StorageError::PlayerNotFound(42))
        ));
    }

    // === Match Tests ===

    #[test]
    fn test_create_match_seats_players_at_baseline() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();
        assert!(created.is_active());
        assert_eq!(seated.len(), 4);

        let stored = storage.participants(created.id).unwrap();
        assert_eq!(stored, seated);
        assert!(stored.iter().all(|s| s.current == Level::Baseline
            && s.status == Status::Normal
            && s.rt_streak == 0));
        assert_eq!(storage.active_match().unwrap(), Some(created));
    }

    #[test]
    fn test_create_match_with_unknown_player_writes_nothing() {
        let (mut storage, mut ids) = storage_with_players();
        ids[3] = 999;
        assert!(matches!(
            storage.create_match(&ids),
            Err(StorageError::PlayerNotFound(999))
        ));
        assert_eq!(storage.active_match().unwrap(), None);
    }

    #[test]
    fn test_apply_transition_persists_state_and_history() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();

        let t = advance(&seated[0], Steps::One);
        let appended = storage.apply_transition(created.id, &t).unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].new_count.as_deref(), Some("l"));

        let stored = storage.participants(created.id).unwrap();
        assert_eq!(stored[0].current, Level::SmallL);
        assert_eq!(storage.history(created.id).unwrap(), appended);
    }

    #[test]
    fn test_bust_resets_every_participant() {
        let (mut storage, ids) = storage_with_players();
        let (created, _) = storage.create_match(&ids).unwrap();
        seat_at(&storage, created.id, ids[0], Level::Ri);
        seat_at(&storage, created.id, ids[1], Level::P);
        seat_at(&storage, created.id, ids[2], Level::SmallL);

        let seated = storage.participants(created.id).unwrap();
        let t = advance(&seated[0], Steps::Two);
        storage.apply_transition(created.id, &t).unwrap();

        let stored = storage.participants(created.id).unwrap();
        assert!(stored.iter().all(|s| s.current == Level::Baseline));
        assert_eq!(stored[0].match_losses, 1);
        assert_eq!(stored[0].rt_streak, 1);
        assert_eq!(stored[1].match_losses, 0);

        let history = storage.history(created.id).unwrap();
        assert_eq!(history.last().unwrap().new_count.as_deref(), Some("RT+1"));
    }

    #[test]
    fn test_failed_transition_leaves_store_untouched() {
        let (mut storage, ids) = storage_with_players();
        let (created, _) = storage.create_match(&ids).unwrap();
        seat_at(&storage, created.id, ids[1], Level::F);

        // A bust for somebody who is not seated: the table reset must roll back
        let mut stranger = PlayerRoundState::new(999, "Eko");
        stranger.current = Level::Ri;
        let t = advance(&stranger, Steps::One);
        assert!(t.table_reset);

        assert!(matches!(
            storage.apply_transition(created.id, &t),
            Err(StorageError::ParticipantNotFound { player_id: 999, .. })
        ));
        assert_eq!(storage.participants(created.id).unwrap()[1].current, Level::F);
        assert!(storage.history(created.id).unwrap().is_empty());
    }

    #[test]
    fn test_transition_on_ended_match_is_refused() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();
        storage.end_match(created.id).unwrap();

        let t = advance(&seated[0], Steps::One);
        assert!(matches!(
            storage.apply_transition(created.id, &t),
            Err(StorageError::MatchNotActive(_))
        ));
    }

    #[test]
    fn test_kades_bust_appends_penalty_entry_first() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();

        let mut state = seated[2].clone();
        state.current = Level::R;
        state.rt_streak = 3;
        state.status = Status::Rw;
        let t = advance(&state, Steps::Two);
        storage.apply_transition(created.id, &t).unwrap();

        let history = storage.history(created.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].new_count, None);
        assert_eq!(history[1].new_count.as_deref(), Some("RT"));
        assert!(history[0].id < history[1].id);
        assert_eq!(storage.participants(created.id).unwrap()[2].status, Status::Kades);
    }

    #[test]
    fn test_undo_restores_count_and_deletes_entry() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();

        let first = advance(&seated[0], Steps::One);
        storage.apply_transition(created.id, &first).unwrap();
        let second = advance(&first.next, Steps::Two);
        storage.apply_transition(created.id, &second).unwrap();
        assert_eq!(storage.participants(created.id).unwrap()[0].current, Level::F);

        let last = storage.last_entry_for(created.id, "Andi").unwrap();
        let plan = plan_undo(last.as_ref()).unwrap();
        storage.apply_undo(created.id, ids[0], &plan).unwrap();

        assert_eq!(storage.participants(created.id).unwrap()[0].current, Level::SmallL);
        let history = storage.history(created.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_count.as_deref(), Some(BASELINE_PLACEHOLDER));
    }

    #[test]
    fn test_last_entry_is_per_player() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();
        storage
            .apply_transition(created.id, &advance(&seated[0], Steps::One))
            .unwrap();
        storage
            .apply_transition(created.id, &advance(&seated[1], Steps::Two))
            .unwrap();

        let andi = storage.last_entry_for(created.id, "Andi").unwrap().unwrap();
        assert_eq!(andi.new_count.as_deref(), Some("l"));
        assert!(storage.last_entry_for(created.id, "Dewi").unwrap().is_none());
    }

    #[test]
    fn test_history_order_ignores_clock_steps() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();
        let first = advance(&seated[0], Steps::One);
        storage.apply_transition(created.id, &first).unwrap();
        let second = advance(&first.next, Steps::One);
        let appended = storage.apply_transition(created.id, &second).unwrap();

        // Clock stepped back between the two moves
        storage
            .conn
            .execute(
                "UPDATE history SET created_at = created_at - 60000 WHERE id = ?1",
                params![appended[0].id],
            )
            .unwrap();

        let last = storage.last_entry_for(created.id, "Andi").unwrap().unwrap();
        assert_eq!(last.id, appended[0].id);
        assert_eq!(last.new_count.as_deref(), Some("L"));

        let counts: Vec<Option<String>> = storage
            .history(created.id)
            .unwrap()
            .into_iter()
            .map(|e| e.new_count)
            .collect();
        assert_eq!(counts, vec![Some("l".to_string()), Some("L".to_string())]);
    }

    #[test]
    fn test_end_match_folds_totals() {
        let (mut storage, ids) = storage_with_players();
        let (created, seated) = storage.create_match(&ids).unwrap();

        let mut budi = seated[1].clone();
        budi.current = Level::P;
        let win = declare_cycle(&budi).unwrap();
        storage.apply_transition(created.id, &win).unwrap();

        let mut citra = seated[2].clone();
        citra.current = Level::Ri;
        storage
            .apply_transition(created.id, &advance(&citra, Steps::One))
            .unwrap();

        let result = storage.end_match(created.id).unwrap();
        assert!(result.completed);
        assert_eq!(result.winner(), Some("Budi"));
        assert_eq!(result.records[2].losses, 1);

        assert_eq!(storage.player(ids[1]).unwrap().total_wins, 1);
        assert_eq!(storage.player(ids[2]).unwrap().total_losses, 1);
        assert_eq!(storage.active_match().unwrap(), None);

        let ended = storage.match_by_id(created.id).unwrap();
        assert_eq!(ended.status, MatchStatus::Ended);
        assert!(ended.ended_at.is_some());

        // Ending twice would double-count
        assert!(matches!(
            storage.end_match(created.id),
            Err(StorageError::MatchNotActive(_))
        ));
    }

    #[test]
    fn test_leaderboard_order() {
        let (storage, ids) = storage_with_players();
        let set_totals = |id: i64, wins: u32, losses: u32| {
            storage
                .conn
                .execute(
                    "UPDATE players SET total_wins = ?1, total_losses = ?2 WHERE id = ?3",
                    params![wins, losses, id],
                )
                .unwrap();
        };
        set_totals(ids[0], 2, 5);
        set_totals(ids[1], 2, 1);
        set_totals(ids[2], 4, 9);
        set_totals(ids[3], 2, 1);

        let names: Vec<String> = storage
            .leaderboard()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Citra", "Budi", "Dewi", "Andi"]);
    }

    #[test]
    fn test_ended_match_results() {
        let (mut storage, ids) = storage_with_players();
        let (first, _) = storage.create_match(&ids).unwrap();
        storage.end_match(first.id).unwrap();
        let (second, _) = storage.create_match(&ids).unwrap();

        let results = storage.ended_match_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_id, first.id);
        assert!(!storage.match_result(second.id).unwrap().completed);
    }

    #[test]
    fn test_open_on_disk_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("gaple-test-{}", now_millis()));
        let path = dir.join("nested").join("gaple.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.create_player("Andi").unwrap();
        }
        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.list_players().unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
