//! Presentation surface of the gate.
//!
//! The controller never draws anything itself. It checks the required
//! anchors once at construction and then pushes [`UiUpdate`]s to a
//! [`Presentation`] implementation.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Elements the gate needs from its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The toggleable consent control
    ConsentControl,
    /// The verify button
    SubmitTrigger,
    /// Label inside the verify button
    ButtonLabel,
    /// Indicator shown while submitting
    LoadingIndicator,
    /// Message shown once verified
    SuccessMessage,
    /// Message shown when an attempt failed
    FailureMessage,
}

impl Anchor {
    pub const REQUIRED: [Anchor; 6] = [
        Anchor::ConsentControl,
        Anchor::SubmitTrigger,
        Anchor::ButtonLabel,
        Anchor::LoadingIndicator,
        Anchor::SuccessMessage,
        Anchor::FailureMessage,
    ];

    /// Element id on the page.
    pub fn id(&self) -> &'static str {
        match self {
            Anchor::ConsentControl => "captchaBox",
            Anchor::SubmitTrigger => "verifyBtn",
            Anchor::ButtonLabel => "btnText",
            Anchor::LoadingIndicator => "loadingDots",
            Anchor::SuccessMessage => "successMessage",
            Anchor::FailureMessage => "errorMessage",
        }
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.id())
    }
}

/// A change the surface should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    /// Consent control toggled; the verify button follows it
    Consent { checked: bool },
    /// Submission in progress
    Loading,
    /// Attempt verified
    Success,
    /// Local success indicator, used when the host bridge is not reachable
    FallbackNotice(String),
    /// Attempt failed; the button offers a retry
    Failure { message: String, retry_label: String },
}

/// A surface the controller can drive.
pub trait Presentation: Send {
    fn has_anchor(&self, anchor: Anchor) -> bool;

    fn render(&mut self, update: UiUpdate);
}

/// Surface printing each update as a line.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
}

impl TerminalSurface<std::io::Stderr> {
    /// Surface on stderr, leaving stdout to the host bridge.
    pub fn stderr() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Presentation for TerminalSurface<W> {
    fn has_anchor(&self, _anchor: Anchor) -> bool {
        true
    }

    fn render(&mut self, update: UiUpdate) {
        let line = match update {
            UiUpdate::Consent { checked: true } => {
                "[x] I'm not a robot    (verify enabled)".to_string()
            }
            UiUpdate::Consent { checked: false } => {
                "[ ] I'm not a robot    (verify disabled)".to_string()
            }
            UiUpdate::Loading => "... verifying".to_string(),
            UiUpdate::Success => "✓ Verification successful".to_string(),
            UiUpdate::FallbackNotice(message) => format!("✓ {message}"),
            UiUpdate::Failure {
                message,
                retry_label,
            } => format!("✗ {message} [{retry_label}]"),
        };
        // A closed terminal is not the gate's problem.
        let _ = writeln!(self.out, "{line}");
    }
}

/// Surface without output that records every update.
///
/// Cloning shares the record, so a clone kept outside the controller can
/// inspect what was rendered.
#[derive(Clone, Default)]
pub struct HeadlessSurface {
    updates: Arc<Mutex<Vec<UiUpdate>>>,
    missing: Arc<Mutex<HashSet<Anchor>>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface lacking the given anchor.
    pub fn without(self, anchor: Anchor) -> Self {
        self.detach(anchor);
        self
    }

    /// Remove an anchor from the surface.
    pub fn detach(&self, anchor: Anchor) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(anchor);
        }
    }

    /// Put a removed anchor back.
    pub fn reattach(&self, anchor: Anchor) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.remove(&anchor);
        }
    }

    pub fn updates(&self) -> Vec<UiUpdate> {
        match self.updates.lock() {
            Ok(updates) => updates.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Presentation for HeadlessSurface {
    fn has_anchor(&self, anchor: Anchor) -> bool {
        self.missing
            .lock()
            .map(|missing| !missing.contains(&anchor))
            .unwrap_or(false)
    }

    fn render(&mut self, update: UiUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_ids() {
        let ids: Vec<&str> = Anchor::REQUIRED.iter().map(Anchor::id).collect();
        assert_eq!(
            ids,
            vec![
                "captchaBox",
                "verifyBtn",
                "btnText",
                "loadingDots",
                "successMessage",
                "errorMessage"
            ]
        );
        assert_eq!(Anchor::SubmitTrigger.to_string(), "#verifyBtn");
    }

    #[test]
    fn test_headless_surface_shares_record() {
        let surface = HeadlessSurface::new().without(Anchor::LoadingIndicator);
        let mut driven = surface.clone();
        driven.render(UiUpdate::Loading);

        assert_eq!(surface.updates(), vec![UiUpdate::Loading]);
        assert!(!surface.has_anchor(Anchor::LoadingIndicator));
        assert!(surface.has_anchor(Anchor::ConsentControl));

        driven.reattach(Anchor::LoadingIndicator);
        assert!(surface.has_anchor(Anchor::LoadingIndicator));
    }

    #[test]
    fn test_terminal_surface_lines() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.render(UiUpdate::Consent { checked: true });
        surface.render(UiUpdate::Failure {
            message: "Verification failed. Please try again.".to_string(),
            retry_label: "Retry Verification".to_string(),
        });

        let out = String::from_utf8(surface.out).unwrap();
        assert!(out.contains("[x]"));
        assert!(out.contains("Retry Verification"));
    }
}
