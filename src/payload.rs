//! The verification payload.
//!
//! Assembled once per verification attempt from the environment snapshot,
//! the rendering signature, the frozen interaction sample and the session
//! identity. Fields are private: once assembled the payload is read-only.

use crate::fingerprint::{EnvironmentSnapshot, RenderingSignature};
use crate::identity::SessionIdentity;
use crate::interaction::{InteractionSample, ObserverError};
use crate::presentation::Anchor;
use crate::probe::NavigationTiming;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use statrs::statistics::Statistics;
use std::time::Duration;

/// Summary of the observed behavior.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSummary {
    pub mouse_movements: u32,
    pub clicks: usize,
    pub scrolls: u32,
    /// Milliseconds since the gate was created, fractional
    pub time_on_page: f64,
    /// Mean gap between consecutive clicks in milliseconds
    pub click_interval_mean_ms: Option<f64>,
    /// Sample standard deviation of click gaps in milliseconds
    pub click_interval_std_ms: Option<f64>,
    /// Page load milestones, `"unavailable"` without a timing API
    #[serde(serialize_with = "timing_or_unavailable")]
    pub navigation_timing: Option<NavigationTiming>,
}

fn timing_or_unavailable<S: Serializer>(
    timing: &Option<NavigationTiming>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match timing {
        Some(timing) => timing.serialize(serializer),
        None => serializer.serialize_str("unavailable"),
    }
}

impl BehaviorSummary {
    pub fn from_sample(
        sample: &InteractionSample,
        on_page: Duration,
        navigation_timing: Option<NavigationTiming>,
    ) -> Self {
        let intervals: Vec<f64> = sample
            .click_pattern
            .windows(2)
            .map(|pair| (pair[1].time - pair[0].time).num_milliseconds() as f64)
            .collect();

        let mean = (!intervals.is_empty()).then(|| intervals.iter().mean());
        let std_dev = (intervals.len() >= 2).then(|| intervals.iter().std_dev());

        Self {
            mouse_movements: sample.mouse_movement,
            clicks: sample.click_pattern.len(),
            scrolls: sample.scroll_behavior,
            time_on_page: on_page.as_secs_f64() * 1000.0,
            click_interval_mean_ms: mean,
            click_interval_std_ms: std_dev,
            navigation_timing,
        }
    }
}

/// Timing of the completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVerification {
    pub verification_time: DateTime<Utc>,
    /// Milliseconds from gate creation to verification
    pub time_to_complete: u64,
    pub user_behavior: BehaviorSummary,
}

/// Everything needed to assemble a payload.
pub struct PayloadParts<'a> {
    pub environment: &'a EnvironmentSnapshot,
    pub signature: &'a RenderingSignature,
    pub identity: &'a SessionIdentity,
    pub interaction: InteractionSample,
    pub correlation_id: Option<i64>,
    /// Time since the gate was created
    pub elapsed: Duration,
    pub navigation_timing: Option<NavigationTiming>,
}

/// The aggregated verification report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    #[serde(flatten)]
    environment: EnvironmentSnapshot,
    session_id: String,
    pseudo_user_id: u32,
    interaction: InteractionSample,
    detailed_fingerprint: RenderingSignature,
    final_verification: FinalVerification,
    #[serde(skip_serializing_if = "Option::is_none")]
    tgid: Option<i64>,
    completed_at: DateTime<Utc>,
}

impl VerificationPayload {
    pub fn assemble(parts: PayloadParts<'_>) -> Self {
        let now = Utc::now();
        let user_behavior = BehaviorSummary::from_sample(
            &parts.interaction,
            parts.elapsed,
            parts.navigation_timing,
        );

        Self {
            environment: parts.environment.clone(),
            session_id: parts.identity.session_id.clone(),
            pseudo_user_id: parts.identity.pseudo_user_id,
            interaction: parts.interaction,
            detailed_fingerprint: parts.signature.clone(),
            final_verification: FinalVerification {
                verification_time: now,
                time_to_complete: parts.elapsed.as_millis() as u64,
                user_behavior,
            },
            tgid: parts.correlation_id,
            completed_at: now,
        }
    }

    pub fn environment(&self) -> &EnvironmentSnapshot {
        &self.environment
    }

    pub fn signature(&self) -> &RenderingSignature {
        &self.detailed_fingerprint
    }

    pub fn interaction(&self) -> &InteractionSample {
        &self.interaction
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn pseudo_user_id(&self) -> u32 {
        self.pseudo_user_id
    }

    /// Correlation id taken from the page URL.
    pub fn tgid(&self) -> Option<i64> {
        self.tgid
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn final_verification(&self) -> &FinalVerification {
        &self.final_verification
    }

    /// Serialize to a JSON value, checking the payload is representable.
    pub fn to_json(&self) -> Result<serde_json::Value, AssemblyError> {
        serde_json::to_value(self).map_err(|e| AssemblyError::Serialization(e.to_string()))
    }
}

/// Local failures while assembling a payload.
#[derive(Debug)]
pub enum AssemblyError {
    /// An anchor needed to show the result disappeared
    MissingAnchor(Anchor),
    /// An observation window was lost before producing its sample
    Interaction(String),
    /// The payload could not be serialized
    Serialization(String),
    /// The attempt task ended abnormally
    Aborted(String),
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyError::MissingAnchor(anchor) => write!(f, "Missing anchor: {anchor}"),
            AssemblyError::Interaction(e) => write!(f, "Interaction error: {e}"),
            AssemblyError::Serialization(e) => write!(f, "Serialization error: {e}"),
            AssemblyError::Aborted(e) => write!(f, "Attempt aborted: {e}"),
        }
    }
}

impl std::error::Error for AssemblyError {}

impl From<ObserverError> for AssemblyError {
    fn from(e: ObserverError) -> Self {
        AssemblyError::Interaction(e.to_string())
    }
}
