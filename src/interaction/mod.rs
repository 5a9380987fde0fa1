//! Interaction observation for the gate.
//!
//! Pointer events are fanned out by an [`InteractionSource`]; the observer
//! opens fixed-duration windows on it, one per kind, and hands the frozen
//! sample to the controller.

pub mod observer;
pub mod types;

// Re-export commonly used types
pub use observer::{
    InteractionObserver, InteractionSource, ObserverError, PendingSample, WindowHandle,
};
pub use types::{ClickRecord, InteractionKind, InteractionSample, PointerEvent};
