//! Capability probes for the gate.
//!
//! Each probe reads one environment signal through a [`CapabilityProvider`]
//! and degrades to a sentinel when the signal is missing or the read fails.

pub mod fixture;
pub mod provider;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use fixture::{FixtureEnvironment, FixtureError, WebGlFixture};
pub use provider::{CapabilityProvider, ProbeSet, SharedProvider, REFERENCE_FONTS};
pub use system::SystemEnvironment;
pub use types::{
    CanvasScript, ConnectionHints, ContextKind, DrawOp, HardwareHints, LocaleInfo,
    NavigationTiming, NavigatorInfo, Probe, ProbeFailure, Rgba, RuntimeFeatures, ScreenMetrics,
    StorageSupport, WebGlParameters,
};
