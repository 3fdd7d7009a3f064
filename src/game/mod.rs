#![allow(dead_code)]
//! Score engine: count levels, penalty statuses and per-player round state
//!
//! A player's count climbs a fixed sequence of symbolic levels. Landing on
//! (or jumping past) the last level is a bust: the player is penalised and
//! the whole table starts a new round.

pub mod engine;
pub mod rounds;

use std::fmt;
use std::num::NonZeroU8;
use thiserror::Error;

/// Placeholder written to the history log in place of the empty baseline level
pub const BASELINE_PLACEHOLDER: &str = "Oke Bro";

/// Busts needed before a player is put on RW probation
pub const RW_STREAK: u32 = 3;

/// One position of the count sequence, ordered by danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// `""`, the reset state
    #[default]
    Baseline,
    /// `"l"`
    SmallL,
    /// `"L"`
    BigL,
    /// `"F"`
    F,
    /// `"P"`
    P,
    /// `"R"`
    R,
    /// `"RI"`, one step short of a bust
    Ri,
    /// `"RT"`, the bust level
    Rt,
}

impl Level {
    /// The full sequence, index 0 through 7.
    pub const SEQUENCE: [Level; 8] = [
        Level::Baseline,
        Level::SmallL,
        Level::BigL,
        Level::F,
        Level::P,
        Level::R,
        Level::Ri,
        Level::Rt,
    ];

    /// Position of this level in the sequence.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level at a sequence position, `None` past the end.
    pub fn from_index(index: usize) -> Option<Level> {
        Self::SEQUENCE.get(index).copied()
    }

    /// The literal stored for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Baseline => "",
            Level::SmallL => "l",
            Level::BigL => "L",
            Level::F => "F",
            Level::P => "P",
            Level::R => "R",
            Level::Ri => "RI",
            Level::Rt => "RT",
        }
    }

    /// Exact-string lookup against the sequence.
    pub fn lookup(literal: &str) -> Option<Level> {
        Self::SEQUENCE.iter().copied().find(|l| l.as_str() == literal)
    }

    pub fn is_baseline(self) -> bool {
        self == Level::Baseline
    }

    /// A player never rests on the bust level; it is read as already reset.
    pub fn resting(self) -> Level {
        match self {
            Level::Rt => Level::Baseline,
            other => other,
        }
    }

    /// Text written to the history log for this level.
    pub fn history_label(self) -> &'static str {
        match self {
            Level::Baseline => BASELINE_PLACEHOLDER,
            other => other.as_str(),
        }
    }

    /// Read a stored `current_count` as a resting level.
    ///
    /// Bust literals and unrecognised strings degrade to baseline.
    pub fn from_stored(raw: &str) -> Level {
        match Count::parse(raw) {
            Some(Count::At(level)) => level.resting(),
            Some(Count::Overflow(_)) => Level::Baseline,
            None => {
                log::warn!("unrecognised count {:?}, treating as baseline", raw);
                Level::Baseline
            }
        }
    }
}

/// A count value as recorded in history: a sequence level, or an `RT+N` overflow bust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    At(Level),
    /// `"RT+N"`, reached by jumping past RT
    Overflow(NonZeroU8),
}

impl Count {
    pub const BASELINE: Count = Count::At(Level::Baseline);

    /// Parse a stored count literal.
    ///
    /// Accepts the sequence literals, `RT+N` with N >= 1 and the baseline
    /// placeholder. Anything else is `None`.
    pub fn parse(literal: &str) -> Option<Count> {
        if literal == BASELINE_PLACEHOLDER {
            return Some(Count::BASELINE);
        }
        if let Some(amount) = literal.strip_prefix("RT+") {
            if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            return amount
                .parse::<u8>()
                .ok()
                .and_then(NonZeroU8::new)
                .map(Count::Overflow);
        }
        Level::lookup(literal).map(Count::At)
    }

    /// True for `RT` and any `RT+N`.
    pub fn is_bust(&self) -> bool {
        matches!(self, Count::At(Level::Rt) | Count::Overflow(_))
    }

    pub fn is_baseline(&self) -> bool {
        *self == Count::BASELINE
    }

    /// Text written to the history log, using the placeholder for baseline.
    pub fn history_label(&self) -> String {
        match self {
            Count::At(level) => level.history_label().to_string(),
            Count::Overflow(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::At(level) => f.write_str(level.as_str()),
            Count::Overflow(amount) => write!(f, "RT+{}", amount),
        }
    }
}

/// Penalty flag for a player within one match. Only ever escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    #[default]
    Normal,
    /// Probation after repeated busts
    Rw,
    /// Bust while on probation
    Kades,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Rw => "RW",
            Status::Kades => "KADES",
        }
    }

    pub fn parse(literal: &str) -> Option<Status> {
        match literal {
            "normal" => Some(Status::Normal),
            "RW" => Some(Status::Rw),
            "KADES" => Some(Status::Kades),
            _ => None,
        }
    }

    /// Move up to `target`, never down.
    pub fn escalate(self, target: Status) -> Status {
        self.max(target)
    }
}

/// Advancement sizes the game defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Steps {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a move advances 1 or 2 steps, not {0}")]
pub struct InvalidSteps(pub u8);

impl Steps {
    pub fn get(self) -> usize {
        match self {
            Steps::One => 1,
            Steps::Two => 2,
        }
    }

    /// Overflow amount when jumping past RT from RI: `steps - 1`, if any.
    pub fn overflow(self) -> Option<NonZeroU8> {
        NonZeroU8::new(self.get() as u8 - 1)
    }
}

impl TryFrom<u8> for Steps {
    type Error = InvalidSteps;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Steps::One),
            2 => Ok(Steps::Two),
            other => Err(InvalidSteps(other)),
        }
    }
}

/// Per-player state scoped to one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRoundState {
    /// Roster id of the player
    pub player_id: i64,
    /// Display name, also the key used in history entries
    pub name: String,
    /// Resting level (never `Rt`)
    pub current: Level,
    /// Bust counter, never decremented within a match
    pub rt_streak: u32,
    pub status: Status,
    /// Completed cycles this match
    pub match_wins: u32,
    /// Busts this match
    pub match_losses: u32,
}

impl PlayerRoundState {
    /// Fresh state for a player joining a match.
    pub fn new(player_id: i64, name: impl Into<String>) -> Self {
        PlayerRoundState {
            player_id,
            name: name.into(),
            current: Level::Baseline,
            rt_streak: 0,
            status: Status::Normal,
            match_wins: 0,
            match_losses: 0,
        }
    }
}

/// An immutable row of the match history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub match_id: i64,
    pub player_name: String,
    /// Free-text description of what happened
    pub action: String,
    /// `None` on penalty-only entries
    pub previous_count: Option<String>,
    /// `None` on penalty-only entries
    pub new_count: Option<String>,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
}
