//! The verification controller and its state machine.
//!
//! This module contains:
//! - The verification states and their guarded transitions
//! - Correlation id parsing from the page URL
//! - The controller driving a gate session

pub mod gate;
pub mod page;
pub mod state;

// Re-export commonly used types
pub use gate::{
    GateEvent, GateOptions, GateParts, InitializationError, KeyFocus, Transition,
    VerificationController, VerificationOutcome, ACTIVATION_KEYS, FAILURE_MESSAGE,
    FALLBACK_MESSAGE, RETRY_LABEL,
};
pub use page::{correlation_id, CORRELATION_PARAM};
pub use state::VerificationState;
