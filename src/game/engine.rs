#![allow(dead_code)]
//! State transitions for a single player's count
//!
//! Every operation here is pure: it takes the player's current state and
//! returns a `Transition` describing the next state, the history entries to
//! append and the table events to announce. Persisting the transition is the
//! caller's job.

use super::{
    Count, HistoryEntry, Level, PlayerRoundState, Status, Steps, BASELINE_PLACEHOLDER, RW_STREAK,
};
use log::warn;

/// Action text of the extra entry logged when a player on RW busts again
pub const KADES_ACTION: &str = "Lost with RW status - KADES penalty applied";

/// Action text of a completed cycle
pub const CYCLE_ACTION: &str = "Completed cycle (TTD)";

/// A history row waiting to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub player_name: String,
    pub action: String,
    pub previous_count: Option<String>,
    pub new_count: Option<String>,
}

/// What the front-end should announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The player busted, ending the round for everyone
    Bust(Count),
    /// The player was put on RW probation
    Rw,
    /// The player busted while on RW
    Kades,
    /// The player completed a cycle
    Win,
}

/// A notification emitted alongside a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEvent {
    pub player: String,
    pub kind: EventKind,
}

impl TableEvent {
    fn new(player: &str, kind: EventKind) -> Self {
        TableEvent {
            player: player.to_string(),
            kind,
        }
    }
}

/// Result of applying one engine operation to a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The acting player's state after the operation
    pub next: PlayerRoundState,
    /// Every participant goes back to baseline
    pub table_reset: bool,
    /// Entries to append, in order
    pub entries: Vec<NewHistoryEntry>,
    /// Events to announce, in order
    pub events: Vec<TableEvent>,
}

impl Transition {
    /// True if this transition ended the round.
    pub fn is_bust(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.kind, EventKind::Bust(_)))
    }
}

/// Advance a player by `steps`.
///
/// Jumping two steps from RI is an `RT+1` overflow bust; reaching or passing
/// RT any other way is a plain `RT` bust. Either bust applies the penalty
/// protocol and resets the whole table.
pub fn advance(state: &PlayerRoundState, steps: Steps) -> Transition {
    let from = state.current.resting();
    let reached = resolve(from, steps);

    match reached {
        Count::At(level) if !reached.is_bust() => {
            if level.is_baseline() && !from.is_baseline() {
                complete_cycle(state, from)
            } else {
                advanced(state, from, level, steps)
            }
        }
        bust_count => bust(state, from, bust_count),
    }
}

/// Record a completed cycle (TTD) for a player sitting above baseline.
///
/// Returns `None` at baseline, where there is no cycle to complete.
pub fn declare_cycle(state: &PlayerRoundState) -> Option<Transition> {
    let from = state.current.resting();
    if from.is_baseline() {
        return None;
    }
    Some(complete_cycle(state, from))
}

/// Where `steps` from `from` lands.
fn resolve(from: Level, steps: Steps) -> Count {
    if from == Level::Ri {
        if let Some(amount) = steps.overflow() {
            return Count::Overflow(amount);
        }
    }
    match Level::from_index(from.index() + steps.get()) {
        Some(level) => Count::At(level),
        None => Count::At(Level::Rt),
    }
}

fn advanced(state: &PlayerRoundState, from: Level, to: Level, steps: Steps) -> Transition {
    let mut next = state.clone();
    next.current = to;

    Transition {
        next,
        table_reset: false,
        entries: vec![NewHistoryEntry {
            player_name: state.name.clone(),
            action: format!("Advanced +{}", steps.get()),
            previous_count: Some(from.history_label().to_string()),
            new_count: Some(to.history_label().to_string()),
        }],
        events: Vec::new(),
    }
}

fn complete_cycle(state: &PlayerRoundState, from: Level) -> Transition {
    let mut next = state.clone();
    next.current = Level::Baseline;
    next.match_wins += 1;

    Transition {
        next,
        table_reset: false,
        entries: vec![NewHistoryEntry {
            player_name: state.name.clone(),
            action: CYCLE_ACTION.to_string(),
            previous_count: Some(from.as_str().to_string()),
            new_count: Some(BASELINE_PLACEHOLDER.to_string()),
        }],
        events: vec![TableEvent::new(&state.name, EventKind::Win)],
    }
}

/// Bust penalty protocol.
///
/// The KADES check looks at the status held before this bust, so a player
/// who reaches the streak threshold and was already on RW goes straight to
/// KADES.
fn bust(state: &PlayerRoundState, from: Level, reached: Count) -> Transition {
    let mut next = state.clone();
    let mut entries = Vec::with_capacity(2);
    let mut events = vec![TableEvent::new(&state.name, EventKind::Bust(reached))];

    next.match_losses += 1;
    next.rt_streak += 1;

    if next.rt_streak >= RW_STREAK {
        next.status = next.status.escalate(Status::Rw);
        if state.status == Status::Normal {
            events.push(TableEvent::new(&state.name, EventKind::Rw));
        }
    }

    if state.status == Status::Rw {
        next.status = Status::Kades;
        entries.push(NewHistoryEntry {
            player_name: state.name.clone(),
            action: KADES_ACTION.to_string(),
            previous_count: None,
            new_count: None,
        });
        events.push(TableEvent::new(&state.name, EventKind::Kades));
    }

    let action = match reached {
        Count::Overflow(_) => format!("Reached {} (RT) - New Round Started", reached),
        _ => "Reached RT - New Round Started".to_string(),
    };
    entries.push(NewHistoryEntry {
        player_name: state.name.clone(),
        action,
        previous_count: Some(from.history_label().to_string()),
        new_count: Some(reached.to_string()),
    });

    next.current = Level::Baseline;

    Transition {
        next,
        table_reset: true,
        entries,
        events,
    }
}

/// How to reverse a player's most recent history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoPlan {
    /// History row to delete
    pub entry_id: i64,
    /// Level the player goes back to
    pub restored: Level,
}

/// Plan an undo from the player's most recent history entry.
///
/// Only the displayed count comes back; streak, status and the win/loss
/// counters stay as they are. `None` when the player has no history.
pub fn plan_undo(last: Option<&HistoryEntry>) -> Option<UndoPlan> {
    let entry = last?;
    let restored = match entry.previous_count.as_deref() {
        None => Level::Baseline,
        Some(raw) => match Count::parse(raw) {
            Some(Count::At(level)) => level.resting(),
            Some(Count::Overflow(_)) => Level::Baseline,
            None => {
                warn!(
                    "history entry {} has unrecognised previous count {:?}",
                    entry.id, raw
                );
                Level::Baseline
            }
        },
    };
    Some(UndoPlan {
        entry_id: entry.id,
        restored,
    })
}
