//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. trail_id as UTF-8
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 (64 hex chars)
//!   4. compact JSON of the record

use sha2::{Digest, Sha256};

use aegis_contracts::{
    audit::AuditRecord,
    error::{AegisError, AegisResult},
};

use crate::event::AuditEvent;

/// Lowercase hex SHA-256 of one event's content.
pub fn hash_event(
    trail_id: &str,
    sequence: u64,
    record: &AuditRecord,
    prev_hash: &str,
) -> AegisResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| AegisError::AuditWriteFailed {
        reason: format!("audit record could not be encoded: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(trail_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check linkage, sequence numbering, and every stored hash of a full trail.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    verify_chain_from(events, 0, AuditEvent::GENESIS_HASH)
}

/// Check a retained suffix of a trail.
///
/// The first event must carry `start_sequence` and link to `anchor_hash`,
/// the `this_hash` of the last evicted event.
pub fn verify_chain_from(events: &[AuditEvent], start_sequence: u64, anchor_hash: &str) -> bool {
    let mut expected_prev = anchor_hash.to_string();

    for (offset, event) in events.iter().enumerate() {
        if event.sequence != start_sequence + offset as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.trail_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
