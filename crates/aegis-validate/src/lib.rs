//! # aegis-validate
//!
//! The first gate of the verification pipeline.
//!
//! - [`schema`] checks untrusted JSON against a JSON Schema and decodes it.
//! - [`validator`] implements `InputValidator`: range checks on typed
//!   decisions, then sanitization before any analyzer sees them.

pub mod schema;
pub mod validator;

pub use schema::{parse_context, parse_decision};
pub use validator::DecisionValidator;
