//! # aegis-patterns
//!
//! Pattern detection for the Aegis verification engine: regex tables over
//! reasoning and strategy text, behavioral heuristics over the decision's
//! numbers, and optional temporal checks over a bounded per-agent history.

pub mod detector;
pub mod history;

pub use detector::{default_rules, RegexPatternDetector, DEFAULT_RULES};
pub use history::{AgentHistory, HistoryEntry, TemporalSignals};
