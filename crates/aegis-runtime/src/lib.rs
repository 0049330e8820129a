//! # aegis-runtime
//!
//! Reference wiring for the Aegis verification engine.
//!
//! `build_default_engine` assembles a `LocalVerificationEngine` from the
//! default validator, analyzers, Ed25519 provider, digest attestation, and
//! in-memory audit trail. `EngineBuilder` swaps in custom rule tables or a
//! persisted signing key. `scenarios` holds fixture decisions with known
//! verdicts.
//!
//! Everything runs in-process. No network calls are made.

pub mod builder;
pub mod scenarios;

pub use builder::{build_default_engine, AegisRuntime, EngineBuilder};
pub use scenarios::{Expectation, Scenario, ScenarioOutcome};
