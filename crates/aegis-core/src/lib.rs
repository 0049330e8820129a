//! # aegis-core
//!
//! The local decision-verification runtime.
//!
//! This crate provides:
//! - The seam traits every analyzer, signer, and sink implements
//! - `LocalVerificationEngine`, which runs them in a fixed order
//! - Pure aggregation of analyzer outputs into a trust score and verdict
//! - Engine configuration and an in-memory metrics sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aegis_core::{LocalVerificationEngine, traits::{RiskAnalyzer, PatternDetector}};
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod traits;

pub use config::{EngineConfig, FailureMode, ValidationConfig};
pub use engine::{LocalVerificationEngine, ENGINE_VERSION};
pub use metrics::{InMemoryMetrics, MetricsSnapshot};
