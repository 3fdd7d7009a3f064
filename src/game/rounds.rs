//! Round reconstruction from the history log
//!
//! Rounds are never stored. They are derived on demand by scanning a match's
//! history in order and closing a round each time somebody busts.

use super::{Count, HistoryEntry};
use log::warn;

/// One row of the round table: every participant's count when the round closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// 1-based round number
    pub number: usize,
    /// Count per player, participants first in seating order
    pub counts: Vec<(String, Count)>,
    /// The trailing round nobody has busted yet
    pub in_progress: bool,
}

impl Round {
    /// Count recorded for a player in this round.
    pub fn count_for(&self, player: &str) -> Option<Count> {
        self.counts
            .iter()
            .find(|(name, _)| name == player)
            .map(|(_, count)| *count)
    }

    /// Player whose bust closed this round.
    pub fn busted_by(&self) -> Option<&str> {
        self.counts
            .iter()
            .find(|(_, count)| count.is_bust())
            .map(|(name, _)| name.as_str())
    }
}

/// Lazy iterator over the rounds of a match.
///
/// Cloning it (or calling [`rounds`] again) restarts the scan from the top of
/// the history.
#[derive(Debug, Clone)]
pub struct Rounds<'a> {
    entries: std::slice::Iter<'a, HistoryEntry>,
    working: Vec<(String, Count)>,
    closed: usize,
    finished: bool,
}

/// Rounds of a match, from its chronologically ordered history.
pub fn rounds<'a>(history: &'a [HistoryEntry], players: &[String]) -> Rounds<'a> {
    Rounds {
        entries: history.iter(),
        working: players
            .iter()
            .map(|name| (name.clone(), Count::BASELINE))
            .collect(),
        closed: 0,
        finished: false,
    }
}

impl Rounds<'_> {
    fn set(&mut self, player: &str, count: Count) {
        match self.working.iter_mut().find(|(name, _)| name == player) {
            Some(slot) => slot.1 = count,
            None => self.working.push((player.to_string(), count)),
        }
    }

    fn snapshot(&self, in_progress: bool) -> Round {
        Round {
            number: self.closed + 1,
            counts: self.working.clone(),
            in_progress,
        }
    }
}

impl Iterator for Rounds<'_> {
    type Item = Round;

    fn next(&mut self) -> Option<Round> {
        if self.finished {
            return None;
        }

        while let Some(entry) = self.entries.next() {
            let raw = match entry.new_count.as_deref() {
                Some(raw) if !raw.is_empty() => raw,
                _ => continue,
            };
            let count = Count::parse(raw).unwrap_or_else(|| {
                warn!("history entry {} has unrecognised count {:?}", entry.id, raw);
                Count::BASELINE
            });
            self.set(&entry.player_name, count);

            if count.is_bust() {
                let round = self.snapshot(false);
                self.closed += 1;
                for (_, slot) in &mut self.working {
                    *slot = Count::BASELINE;
                }
                return Some(round);
            }
        }

        self.finished = true;
        if self.working.iter().any(|(_, count)| !count.is_baseline()) {
            Some(self.snapshot(true))
        } else {
            None
        }
    }
}
