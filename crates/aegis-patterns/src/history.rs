//! Bounded per-agent decision history.
//!
//! Each agent keeps a ring of its most recent decisions, pruned to a sliding
//! time window. Agents themselves are held in an LRU cache so an unbounded
//! stream of agent ids cannot grow memory without limit.

use std::{collections::VecDeque, num::NonZeroUsize};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;

use aegis_contracts::{decision::Direction, rules::TemporalRules};

/// One remembered decision. Carries no amounts or free text.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub asset: String,
    pub direction: Direction,
}

/// What the window looked like after recording the latest decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalSignals {
    /// Decisions in the window, including the latest.
    pub decisions_in_window: usize,
    /// Long/short reversals on the latest decision's asset.
    pub reversals: usize,
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

pub struct AgentHistory {
    agents: Mutex<LruCache<String, VecDeque<HistoryEntry>>>,
}

impl AgentHistory {
    pub fn new(max_agents: usize) -> Self {
        Self {
            agents: Mutex::new(LruCache::new(capacity(max_agents))),
        }
    }

    /// Append `entry` for `agent` and summarize the agent's current window.
    pub fn record(&self, agent: &str, entry: HistoryEntry, rules: &TemporalRules) -> TemporalSignals {
        let secs = i64::try_from(rules.window_secs).unwrap_or(i64::MAX);
        let window = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        let cutoff = entry.at.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let asset = entry.asset.clone();

        let mut agents = self.agents.lock();
        let ring = agents.get_or_insert_mut(agent.to_string(), VecDeque::new);

        while ring.front().is_some_and(|e| e.at < cutoff) {
            ring.pop_front();
        }
        ring.push_back(entry);
        while ring.len() > rules.per_agent_capacity.max(1) {
            ring.pop_front();
        }

        let directions: Vec<Direction> = ring
            .iter()
            .filter(|e| e.asset == asset && e.direction != Direction::Neutral)
            .map(|e| e.direction)
            .collect();
        let reversals = directions.windows(2).filter(|w| w[0] != w[1]).count();

        TemporalSignals {
            decisions_in_window: ring.len(),
            reversals,
        }
    }

    /// Change the agent capacity, evicting least-recently-seen agents if needed.
    pub fn resize(&self, max_agents: usize) {
        self.agents.lock().resize(capacity(max_agents));
    }

    pub fn clear(&self) {
        self.agents.lock().clear();
    }

    /// Number of agents currently tracked.
    pub fn len(&self) -> usize {
        self.agents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn entry(minute: u32, asset: &str, direction: Direction) -> HistoryEntry {
        HistoryEntry { at: at(minute), asset: asset.to_string(), direction }
    }

    fn rules() -> TemporalRules {
        TemporalRules { enabled: true, window_secs: 600, ..TemporalRules::default() }
    }

    #[test]
    fn window_drops_old_entries() {
        let history = AgentHistory::new(8);
        let rules = rules();
        history.record("a", entry(0, "BTC", Direction::Long), &rules);
        history.record("a", entry(5, "BTC", Direction::Long), &rules);
        let signals = history.record("a", entry(12, "BTC", Direction::Long), &rules);
        // minute 0 is older than the 10 minute window
        assert_eq!(signals.decisions_in_window, 2);
    }

    #[test]
    fn ring_is_bounded_per_agent() {
        let history = AgentHistory::new(8);
        let rules = TemporalRules { per_agent_capacity: 3, ..rules() };
        let mut last = TemporalSignals::default();
        for minute in 0..6 {
            last = history.record("a", entry(minute, "BTC", Direction::Long), &rules);
        }
        assert_eq!(last.decisions_in_window, 3);
    }

    #[test]
    fn reversals_count_same_asset_only() {
        let history = AgentHistory::new(8);
        let rules = rules();
        history.record("a", entry(0, "BTC", Direction::Long), &rules);
        history.record("a", entry(1, "ETH", Direction::Short), &rules);
        history.record("a", entry(2, "BTC", Direction::Short), &rules);
        history.record("a", entry(3, "BTC", Direction::Neutral), &rules);
        let signals = history.record("a", entry(4, "BTC", Direction::Long), &rules);
        assert_eq!(signals.reversals, 2);
    }

    #[test]
    fn least_recent_agent_is_evicted() {
        let history = AgentHistory::new(2);
        let rules = rules();
        history.record("a", entry(0, "BTC", Direction::Long), &rules);
        history.record("b", entry(0, "BTC", Direction::Long), &rules);
        history.record("c", entry(0, "BTC", Direction::Long), &rules);
        assert_eq!(history.len(), 2);

        // "a" was evicted, so its window starts fresh
        let signals = history.record("a", entry(1, "BTC", Direction::Long), &rules);
        assert_eq!(signals.decisions_in_window, 1);
    }
}
