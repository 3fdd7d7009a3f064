#![allow(dead_code)]
//! Match results and lifetime statistics
//!
//! This module provides:
//! - Final per-player records of a match and the match winner
//! - Lifetime stats rebuilt by replaying ended matches in order
//! - Leaderboards derived from those stats
//!
//! A match winner is the single player with the most completed cycles. A tie
//! for the top spot means the match has no winner.

use std::collections::HashMap;

/// One player's final counters for a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    /// Completed cycles (TTD)
    pub wins: u32,
    /// Busts (RT)
    pub losses: u32,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>, wins: u32, losses: u32) -> Self {
        PlayerRecord {
            name: name.into(),
            wins,
            losses,
        }
    }
}

/// Final result of a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Match id (ids grow with time, so they give a deterministic replay order)
    pub match_id: i64,
    /// Records in seating order
    pub records: Vec<PlayerRecord>,
    /// Whether the match has been ended
    pub completed: bool,
}

impl MatchResult {
    /// Create a result for an ended match
    pub fn new(match_id: i64, records: Vec<PlayerRecord>) -> Self {
        MatchResult {
            match_id,
            records,
            completed: true,
        }
    }

    /// Get the number of players in this match
    pub fn player_count(&self) -> usize {
        self.records.len()
    }

    /// The unique player with the most wins, if there is one
    pub fn winner(&self) -> Option<&str> {
        match_winner(&self.records)
    }

    /// Records sorted by wins (highest first), seating order on ties
    pub fn standings(&self) -> Vec<&PlayerRecord> {
        let mut standings: Vec<_> = self.records.iter().collect();
        standings.sort_by(|a, b| b.wins.cmp(&a.wins));
        standings
    }
}

/// The unique player with the maximum wins; `None` on a tie or no players.
pub fn match_winner(records: &[PlayerRecord]) -> Option<&str> {
    let max_wins = records.iter().map(|r| r.wins).max()?;
    let mut leaders = records.iter().filter(|r| r.wins == max_wins);
    let leader = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(&leader.name)
}

/// Player lifetime statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStats {
    /// Player name
    pub name: String,
    /// Ended matches the player took part in
    pub matches_played: u32,
    /// Matches the player won outright
    pub matches_won: u32,
    /// Completed cycles across all matches
    pub cycles: u32,
    /// Busts across all matches
    pub busts: u32,
    /// Most cycles in a single match
    pub best_cycles: u32,
}

impl PlayerStats {
    /// Create stats for a new player
    pub fn new(name: String) -> Self {
        PlayerStats {
            name,
            ..Default::default()
        }
    }

    /// Share of played matches won outright
    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.matches_won as f64 / self.matches_played as f64
        }
    }

    /// Average busts per match
    pub fn busts_per_match(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.busts as f64 / self.matches_played as f64
        }
    }
}

/// Stats tracker that maintains lifetime statistics for all players
#[derive(Debug, Default)]
pub struct StatsTracker {
    /// Statistics for each player by name
    stats: HashMap<String, PlayerStats>,
}

impl StatsTracker {
    /// Create a new stats tracker
    pub fn new() -> Self {
        StatsTracker::default()
    }

    /// Get stats for a player (creates default if not exists)
    pub fn get_or_create(&mut self, name: &str) -> &mut PlayerStats {
        self.stats
            .entry(name.to_string())
            .or_insert_with(|| PlayerStats::new(name.to_string()))
    }

    /// Get stats for a player (read-only)
    pub fn get(&self, name: &str) -> Option<&PlayerStats> {
        self.stats.get(name)
    }

    /// Get all player stats
    pub fn all_stats(&self) -> &HashMap<String, PlayerStats> {
        &self.stats
    }

    /// Process an ended match
    pub fn process_match(&mut self, result: &MatchResult) {
        if !result.completed {
            return;
        }

        let winner = result.winner().map(str::to_string);

        for record in &result.records {
            let stats = self.get_or_create(&record.name);
            stats.matches_played += 1;
            stats.cycles += record.wins;
            stats.busts += record.losses;
            if record.wins > stats.best_cycles {
                stats.best_cycles = record.wins;
            }
            if winner.as_deref() == Some(record.name.as_str()) {
                stats.matches_won += 1;
            }
        }
    }

    /// Leaderboard by matches won, then cycles, then fewest busts
    pub fn leaderboard(&self) -> Vec<&PlayerStats> {
        let mut board: Vec<_> = self.stats.values().collect();
        board.sort_by(|a, b| {
            b.matches_won
                .cmp(&a.matches_won)
                .then(b.cycles.cmp(&a.cycles))
                .then(a.busts.cmp(&b.busts))
                .then(a.name.cmp(&b.name))
        });
        board
    }

    /// Rebuild stats from a list of match results
    ///
    /// Matches are replayed in id order so the result does not depend on
    /// the order they were loaded in.
    pub fn rebuild_from_matches(&mut self, matches: &mut [MatchResult]) {
        self.stats.clear();

        matches.sort_by_key(|m| m.match_id);
        for result in matches.iter() {
            self.process_match(result);
        }
    }
}
