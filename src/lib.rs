//! Captcha Gate - client-side human verification gate.
//!
//! This library gathers an environment fingerprint, observes pointer
//! interaction for a few seconds after consent, and delivers the aggregated
//! report to a backend endpoint before notifying the embedding host.
//!
//! # Guarantees
//!
//! - **Never blocks on probes**: every capability probe degrades to a
//!   sentinel instead of failing the gate
//! - **Bounded observation**: each interaction window unsubscribes once its
//!   duration has elapsed, whatever the event volume
//! - **Optimistic delivery**: a failed submission still completes the
//!   verification locally
//! - **Transparency**: everything observed and sent is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Captcha Gate                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Probes    │──▶│ Fingerprint │──▶│   Payload   │       │
//! │  │ (provider)  │   │ (aggregate) │   │ (assemble)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             ▲   │           │
//! │  ┌─────────────┐   ┌─────────────┐          │   ▼           │
//! │  │ Interaction │──▶│ Controller  │──────────┘ ┌─────────┐  │
//! │  │  (windows)  │   │  (states)   │───────────▶│Delivery │  │
//! │  └─────────────┘   └─────────────┘            └─────────┘  │
//! │                          │                                  │
//! │                          ▼                                  │
//! │                   ┌─────────────┐                           │
//! │                   │ Host bridge │ / fallback indicator      │
//! │                   └─────────────┘                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use captcha_gate::{
//!     Bridge, DeliveryClient, DeliveryConfig, GateOptions, GateParts, HeadlessSurface,
//!     InteractionSource, ProbeSet, SystemEnvironment, VerificationController,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gate = VerificationController::new(GateParts {
//!     probes: ProbeSet::new(Arc::new(SystemEnvironment::new())),
//!     delivery: DeliveryClient::new(DeliveryConfig::new("https://backend.example"))?,
//!     surface: Box::new(HeadlessSurface::new()),
//!     bridge: Bridge::Absent,
//!     source: InteractionSource::new(),
//!     log: captcha_gate::transparency::create_shared_log(),
//!     options: GateOptions::default(),
//! })?;
//!
//! gate.toggle_consent();
//! gate.verify();
//! gate.settle().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod fingerprint;
pub mod identity;
pub mod interaction;
pub mod payload;
pub mod presentation;
pub mod probe;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use bridge::{Bridge, HostBridge, JsonLineBridge, NotificationPath};
pub use config::{Config, WindowDurations};
pub use controller::{
    GateEvent, GateOptions, GateParts, InitializationError, KeyFocus, Transition,
    VerificationController, VerificationOutcome, VerificationState,
};
pub use delivery::{DeliveryClient, DeliveryConfig, DeliveryReceipt};
pub use fingerprint::{EnvironmentSnapshot, FingerprintAggregator, RenderingSignature};
pub use identity::SessionIdentity;
pub use interaction::{InteractionKind, InteractionSample, InteractionSource, PointerEvent};
pub use payload::VerificationPayload;
pub use presentation::{Anchor, HeadlessSurface, Presentation, TerminalSurface, UiUpdate};
pub use probe::{CapabilityProvider, FixtureEnvironment, Probe, ProbeSet, SystemEnvironment};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data disclosure that can be displayed to users.
pub const DATA_DISCLOSURE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              CAPTCHA GATE - DATA DISCLOSURE                      ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Verifying sends one report to the configured endpoint.          ║
║                                                                  ║
║  ✓ WHAT THE REPORT CONTAINS:                                     ║
║    • Screen, language, platform and hardware hints               ║
║    • A canvas rendering signature and graphics details           ║
║    • Which reference fonts are installed                         ║
║    • Pointer movement and scroll counts, click positions/times   ║
║    • A random session id and a per-load pseudo user id           ║
║                                                                  ║
║  ✗ WHAT IT NEVER CONTAINS:                                       ║
║    • Keystrokes or typed text                                    ║
║    • Page or screen content                                      ║
║    • Anything observed after the verify action                   ║
║                                                                  ║
║  Observation starts only after the consent box is checked and    ║
║  stops after a few seconds, or when consent is withdrawn.        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_disclosure_contents() {
        assert!(DATA_DISCLOSURE.contains("DISCLOSURE"));
        assert!(DATA_DISCLOSURE.contains("NEVER CONTAINS"));
        assert!(DATA_DISCLOSURE.contains("Keystrokes"));
    }
}
