//! Transparency module for the gate.
//!
//! This module tracks what a session observed and what it sent out,
//! so a run can be audited after the fact.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats};
