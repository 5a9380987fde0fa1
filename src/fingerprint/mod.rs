//! Fingerprint aggregation for the gate.
//!
//! This module contains:
//! - The canvas render signature script and a software rendering surface
//! - The aggregator composing probe results into snapshots and signatures

pub mod aggregate;
pub mod canvas;

// Re-export commonly used types
pub use aggregate::{
    BrowserIdentity, EnvironmentSnapshot, FeatureFlags, FingerprintAggregator, HardwareSnapshot,
    NetworkSnapshot, RenderingSignature,
};
pub use canvas::{signature_script, strip_data_url_header, GlyphMetrics, SoftwareCanvas};
