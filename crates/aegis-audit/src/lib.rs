//! # aegis-audit
//!
//! Append-only, SHA-256 hash-chained local audit trail for the Aegis
//! verification engine.
//!
//! Every verification appends an `AuditRecord` wrapped in an `AuditEvent`
//! that links to the previous event by hash. Records carry digests of the
//! reasoning and strategy text, never the text. Editing any stored event
//! breaks the chain, which `verify_chain` detects.
//!
//! The in-memory writer is bounded. Once full it evicts the oldest event and
//! verifies the retained suffix against the evicted event's hash.
//!
//! ```rust,ignore
//! use aegis_audit::InMemoryAuditWriter;
//!
//! let audit = Arc::new(InMemoryAuditWriter::new("engine-1"));
//! let engine = engine.with_audit(audit.clone());
//! engine.verify(decision, None).await?;
//!
//! assert!(audit.verify_integrity());
//! let log = audit.export_log();
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain, verify_chain_from};
pub use event::{AuditEvent, AuditLog};
pub use memory::{InMemoryAuditWriter, DEFAULT_CAPACITY};

// ── Tests ─────────────────────────────────────────────────────────────────────
