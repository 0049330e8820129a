//! In-memory `AuditWriter`.
//!
//! Events live in a bounded ring behind `Arc<Mutex<_>>`, so the writer can be
//! shared between the engine and whoever exports or checks the trail. When
//! the ring is full the oldest event is evicted and its hash becomes the
//! anchor the retained suffix is verified against.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use tracing::debug;

use aegis_contracts::{
    audit::AuditRecord,
    error::{AegisError, AegisResult},
};
use aegis_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_chain_from},
    event::{AuditEvent, AuditLog},
};

/// Events retained by `InMemoryAuditWriter::new`.
pub const DEFAULT_CAPACITY: usize = 1024;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    pub(crate) events: VecDeque<AuditEvent>,
    /// Sequence number of the next event.
    pub(crate) sequence: u64,
    /// `this_hash` of the last event, or `GENESIS_HASH`.
    pub(crate) last_hash: String,
    /// `this_hash` of the last evicted event, or `GENESIS_HASH`.
    pub(crate) anchor_hash: String,
}

impl InMemoryState {
    fn first_sequence(&self) -> u64 {
        self.sequence - self.events.len() as u64
    }
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// Append-only audit writer backed by a SHA-256 hash chain.
#[derive(Clone)]
pub struct InMemoryAuditWriter {
    trail_id: String,
    capacity: usize,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new(trail_id: impl Into<String>) -> Self {
        Self::with_capacity(trail_id, DEFAULT_CAPACITY)
    }

    /// Keep at most `capacity` events, evicting oldest first. A capacity of
    /// zero is treated as one.
    pub fn with_capacity(trail_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let state = InMemoryState {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            sequence: 0,
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            anchor_hash: AuditEvent::GENESIS_HASH.to_string(),
        };
        Self {
            trail_id: trail_id.into(),
            capacity,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn trail_id(&self) -> &str {
        &self.trail_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock for export and checks. Poisoning is ignored: `write` only mutates
    /// state after the new hash has been computed.
    fn read(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events currently retained.
    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events written over the writer's lifetime, including evicted ones.
    pub fn total_written(&self) -> u64 {
        self.read().sequence
    }

    /// Snapshot of the retained events.
    pub fn export_log(&self) -> AuditLog {
        let state = self.read();
        AuditLog {
            trail_id: self.trail_id.clone(),
            events: state.events.iter().cloned().collect(),
            anchor_hash: state.anchor_hash.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .events
                .back()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    /// True if the retained chain has not been altered.
    pub fn verify_integrity(&self) -> bool {
        let mut state = self.read();
        let start = state.first_sequence();
        let anchor = state.anchor_hash.clone();
        verify_chain_from(state.events.make_contiguous(), start, &anchor)
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: &AuditRecord) -> AegisResult<()> {
        let mut state = self.state.lock().map_err(|e| AegisError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {e}"),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.trail_id, sequence, record, &prev_hash)?;

        state.events.push_back(AuditEvent {
            sequence,
            trail_id: self.trail_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        while state.events.len() > self.capacity {
            if let Some(evicted) = state.events.pop_front() {
                state.anchor_hash = evicted.this_hash;
            }
        }

        debug!(
            trail_id = %self.trail_id,
            sequence,
            verification_id = %record.verification_id,
            "audit event appended"
        );
        Ok(())
    }
}
