//! Chain entry and exported log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aegis_contracts::audit::AuditRecord;

/// One link in the audit chain.
///
/// Changing any field, including fields of the embedded record, invalidates
/// `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The trail this event belongs to.
    pub trail_id: String,

    pub record: AuditRecord,

    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// SHA-256 (hex) over trail id, sequence, prev hash, and record JSON.
    pub this_hash: String,
}

impl AuditEvent {
    /// `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A point-in-time export of a trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub trail_id: String,
    pub events: Vec<AuditEvent>,
    /// `prev_hash` of the first exported event. `GENESIS_HASH` until the
    /// writer has evicted anything.
    pub anchor_hash: String,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last event; empty when the trail is empty.
    pub terminal_hash: String,
}
