//! The verification controller.
//!
//! Owns the state machine and ties the pieces together: consent arms the
//! observation windows and the rendering signature, verify hands the
//! windows to an attempt task that assembles and delivers the payload, and
//! settling the attempt notifies the host bridge or the local fallback.
//!
//! Transitions take `&mut self`, so they are serialized. The attempt itself
//! runs as a spawned task; the controller only keeps its handle.

use crate::bridge::{Bridge, NotificationPath};
use crate::config::{Config, WindowDurations};
use crate::controller::page;
use crate::controller::state::VerificationState;
use crate::delivery::{DeliveryClient, DeliveryReceipt};
use crate::fingerprint::{EnvironmentSnapshot, FingerprintAggregator, RenderingSignature};
use crate::identity::SessionIdentity;
use crate::interaction::{
    InteractionKind, InteractionObserver, InteractionSource, PendingSample, PointerEvent,
};
use crate::payload::{AssemblyError, PayloadParts, VerificationPayload};
use crate::presentation::{Anchor, Presentation, UiUpdate};
use crate::probe::{NavigationTiming, ProbeSet};
use crate::transparency::SharedTransparencyLog;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

pub const FAILURE_MESSAGE: &str = "Verification failed. Please try again.";
pub const RETRY_LABEL: &str = "Retry Verification";
pub const FALLBACK_MESSAGE: &str = "Verification complete! You can now close this window.";

/// Key codes that flip the consent control.
pub const ACTIVATION_KEYS: [&str; 2] = ["Space", "Enter"];

/// Where keyboard focus was when a key went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFocus {
    /// The consent control itself
    ConsentControl,
    /// Nothing focused in particular
    Body,
    /// Any other element
    Other,
}

/// Input that drives a gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateEvent {
    ToggleConsent,
    Verify,
    Pointer(PointerEvent),
    /// A key went down, identified by its key code
    Key { code: String, focus: KeyFocus },
    /// Log the current state and session statistics
    Status,
}

/// Outcome of a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: VerificationState,
        to: VerificationState,
    },
    /// The action is not allowed in this state
    Ignored(VerificationState),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Transition::Ignored(_))
    }
}

/// Errors building a controller.
#[derive(Debug)]
pub enum InitializationError {
    /// The surface lacks a required anchor
    MissingAnchor(Anchor),
}

impl std::fmt::Display for InitializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitializationError::MissingAnchor(anchor) => {
                write!(f, "Required element {anchor} not found")
            }
        }
    }
}

impl std::error::Error for InitializationError {}

/// Timing and page settings of a gate.
#[derive(Debug, Clone)]
pub struct GateOptions {
    pub windows: WindowDurations,
    /// Dwell time before the result is shown
    pub submit_delay: Duration,
    pub bridge_close_delay: Duration,
    pub background_color: String,
    /// URL the gate was loaded from, source of the correlation id
    pub page_url: Option<String>,
}

impl GateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            windows: config.windows,
            submit_delay: config.submit_delay,
            bridge_close_delay: config.bridge_close_delay,
            background_color: config.bridge_background_color.clone(),
            page_url: None,
        }
    }
}

impl Default for GateOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Collaborators of a controller.
pub struct GateParts {
    pub probes: ProbeSet,
    pub delivery: DeliveryClient,
    pub surface: Box<dyn Presentation>,
    pub bridge: Bridge,
    pub source: InteractionSource,
    pub log: SharedTransparencyLog,
    pub options: GateOptions,
}

/// A completed verification.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub payload: VerificationPayload,
    pub receipt: DeliveryReceipt,
    pub notification: NotificationPath,
}

struct AttemptReport {
    payload: VerificationPayload,
    receipt: DeliveryReceipt,
}

type AttemptHandle = JoinHandle<Result<AttemptReport, AssemblyError>>;

/// Everything an attempt task owns.
struct Attempt {
    pending: PendingSample,
    environment: EnvironmentSnapshot,
    signature: RenderingSignature,
    identity: SessionIdentity,
    correlation_id: Option<i64>,
    navigation_timing: Option<NavigationTiming>,
    created: Instant,
    submit_delay: Duration,
    delivery: DeliveryClient,
    log: SharedTransparencyLog,
}

impl Attempt {
    async fn run(self) -> Result<AttemptReport, AssemblyError> {
        let Attempt {
            pending,
            environment,
            signature,
            identity,
            correlation_id,
            navigation_timing,
            created,
            submit_delay,
            delivery,
            log,
        } = self;

        // The dwell delay overlaps the remaining window time.
        let (interaction, ()) = tokio::join!(pending.finish(), tokio::time::sleep(submit_delay));
        let interaction = interaction?;

        let payload = VerificationPayload::assemble(PayloadParts {
            environment: &environment,
            signature: &signature,
            identity: &identity,
            interaction,
            correlation_id,
            elapsed: created.elapsed(),
            navigation_timing,
        });
        payload.to_json()?;
        log.record_payload_assembled();

        let receipt = delivery.submit(&payload).await;
        log.record_submission(receipt.is_accepted());

        Ok(AttemptReport { payload, receipt })
    }
}

/// Drives one gate session from consent to verification.
pub struct VerificationController {
    state: VerificationState,
    aggregator: FingerprintAggregator,
    environment: EnvironmentSnapshot,
    identity: SessionIdentity,
    correlation_id: Option<i64>,
    navigation_timing: Option<NavigationTiming>,
    observer: InteractionObserver,
    delivery: DeliveryClient,
    bridge: Bridge,
    surface: Box<dyn Presentation>,
    log: SharedTransparencyLog,
    options: GateOptions,
    created: Instant,
    attempt: Option<AttemptHandle>,
    attempts: u32,
    outcome: Option<VerificationOutcome>,
}

impl VerificationController {
    /// Build a controller, taking the environment snapshot and identity.
    ///
    /// Fails if the surface lacks any of [`Anchor::REQUIRED`]. A present
    /// bridge is asked to expand, match the background color and confirm
    /// closing.
    pub fn new(parts: GateParts) -> Result<Self, InitializationError> {
        let GateParts {
            probes,
            delivery,
            mut surface,
            bridge,
            source,
            log,
            options,
        } = parts;

        if let Some(anchor) = Anchor::REQUIRED
            .into_iter()
            .find(|anchor| !surface.has_anchor(*anchor))
        {
            return Err(InitializationError::MissingAnchor(anchor));
        }

        let aggregator = FingerprintAggregator::new(probes);
        let environment = aggregator.snapshot();
        let identity = SessionIdentity::derive(&environment, Utc::now());
        let correlation_id = options.page_url.as_deref().and_then(page::correlation_id);
        let navigation_timing = aggregator.navigation_timing().value().copied();

        bridge.prepare(&options.background_color);
        surface.render(UiUpdate::Consent { checked: false });

        tracing::info!(
            session_id = %identity.session_id,
            bridge = bridge.is_present(),
            correlation_id = ?correlation_id,
            "verification gate ready"
        );

        Ok(Self {
            state: VerificationState::Idle,
            aggregator,
            environment,
            identity,
            correlation_id,
            navigation_timing,
            observer: InteractionObserver::new(source, log.clone()),
            delivery,
            bridge,
            surface,
            log,
            options,
            created: Instant::now(),
            attempt: None,
            attempts: 0,
            outcome: None,
        })
    }

    pub fn state(&self) -> VerificationState {
        self.state
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn environment(&self) -> &EnvironmentSnapshot {
        &self.environment
    }

    pub fn correlation_id(&self) -> Option<i64> {
        self.correlation_id
    }

    /// The pointer event stream observed by this gate.
    pub fn source(&self) -> &InteractionSource {
        self.observer.source()
    }

    pub fn log(&self) -> &SharedTransparencyLog {
        &self.log
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.outcome.as_ref()
    }

    /// Whether an attempt task is in flight.
    pub fn is_submitting(&self) -> bool {
        self.attempt.is_some()
    }

    /// Flip the consent control.
    pub fn toggle_consent(&mut self) -> Transition {
        let from = self.state;
        let Some(to) = from.on_toggle() else {
            tracing::debug!(state = %from, "toggle ignored");
            return Transition::Ignored(from);
        };

        if to.is_checked() {
            self.arm();
        } else {
            self.observer.cancel_all();
        }
        self.surface.render(UiUpdate::Consent {
            checked: to.is_checked(),
        });
        self.enter(to)
    }

    /// Keyboard activation of the consent control.
    ///
    /// An activation key toggles consent when focus is on the control or
    /// on the page body; anything else is ignored.
    pub fn press_key(&mut self, code: &str, focus: KeyFocus) -> Transition {
        if !ACTIVATION_KEYS.contains(&code) || focus == KeyFocus::Other {
            tracing::trace!(code, ?focus, "key ignored");
            return Transition::Ignored(self.state);
        }
        self.toggle_consent()
    }

    /// Start a verification attempt.
    ///
    /// Only accepted with consent given and nothing in flight. From
    /// [`VerificationState::Failed`] the gate re-arms first.
    pub fn verify(&mut self) -> Transition {
        let from = self.state;
        if let Some(rearmed) = from.on_retry() {
            self.arm();
            self.surface.render(UiUpdate::Consent { checked: true });
            self.enter(rearmed);
        }

        let Some(to) = self.state.on_verify() else {
            tracing::debug!(state = %self.state, "verify ignored");
            return Transition::Ignored(self.state);
        };
        self.enter(to);

        if let Some(anchor) = self.missing_anchor() {
            self.fail(AssemblyError::MissingAnchor(anchor));
            return Transition::Moved {
                from,
                to: self.state,
            };
        }

        self.surface.render(UiUpdate::Loading);
        self.attempts += 1;

        let attempt = Attempt {
            pending: self.observer.freeze(),
            environment: self.environment.clone(),
            signature: self.aggregator.signature().clone(),
            identity: self.identity.clone(),
            correlation_id: self.correlation_id,
            navigation_timing: self.navigation_timing,
            created: self.created,
            submit_delay: self.options.submit_delay,
            delivery: self.delivery.clone(),
            log: self.log.clone(),
        };
        tracing::info!(attempt = self.attempts, "verification attempt started");
        self.attempt = Some(tokio::spawn(attempt.run()));

        Transition::Moved { from, to }
    }

    /// Wait for the in-flight attempt, if any, and apply its result.
    pub async fn settle(&mut self) -> VerificationState {
        if let Some(handle) = self.attempt.take() {
            let joined = handle.await;
            self.complete(joined);
        }
        self.state
    }

    /// Apply one event.
    pub fn handle(&mut self, event: GateEvent) {
        match event {
            GateEvent::ToggleConsent => {
                self.toggle_consent();
            }
            GateEvent::Verify => {
                self.verify();
            }
            GateEvent::Pointer(event) => {
                self.observer.source().emit(event);
            }
            GateEvent::Key { code, focus } => {
                self.press_key(&code, focus);
            }
            GateEvent::Status => {
                tracing::info!(state = %self.state, "{}", self.log.summary());
            }
        }
    }

    /// Consume events until verified or the channel closes.
    ///
    /// An attempt still in flight when the channel closes is settled first.
    pub async fn run(mut self, mut events: mpsc::Receiver<GateEvent>) -> Self {
        loop {
            tokio::select! {
                joined = join_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.complete(joined);
                    if self.state.is_terminal() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => {
                        self.settle().await;
                        break;
                    }
                },
            }
        }
        self
    }

    fn arm(&mut self) {
        // Computed on first consent only.
        self.aggregator.signature();
        for kind in InteractionKind::ALL {
            self.observer.start_window(kind, self.options.windows.for_kind(kind));
        }
    }

    fn enter(&mut self, to: VerificationState) -> Transition {
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, "state transition");
        Transition::Moved { from, to }
    }

    fn missing_anchor(&self) -> Option<Anchor> {
        Anchor::REQUIRED
            .into_iter()
            .find(|anchor| !self.surface.has_anchor(*anchor))
    }

    fn complete(&mut self, joined: Result<Result<AttemptReport, AssemblyError>, JoinError>) {
        let result = joined
            .map_err(|e| AssemblyError::Aborted(e.to_string()))
            .and_then(|report| report);
        match result {
            Ok(report) => self.succeed(report),
            Err(e) => self.fail(e),
        }
    }

    fn succeed(&mut self, report: AttemptReport) {
        let Some(to) = self.state.on_complete(true) else {
            return;
        };
        self.enter(to);
        self.surface.render(UiUpdate::Success);

        let notification = self.bridge.notify_verified(
            &self.identity.session_id,
            report.payload.completed_at(),
            self.options.bridge_close_delay,
        );
        if notification == NotificationPath::Fallback {
            self.surface
                .render(UiUpdate::FallbackNotice(FALLBACK_MESSAGE.to_string()));
        }
        self.log
            .record_notification(notification == NotificationPath::Bridge);

        tracing::info!(
            session_id = %self.identity.session_id,
            accepted = report.receipt.is_accepted(),
            notification = ?notification,
            "verification complete"
        );
        self.outcome = Some(VerificationOutcome {
            payload: report.payload,
            receipt: report.receipt,
            notification,
        });
    }

    fn fail(&mut self, error: AssemblyError) {
        let Some(to) = self.state.on_complete(false) else {
            return;
        };
        tracing::error!(error = %error, "verification attempt failed");
        self.observer.cancel_all();
        self.enter(to);
        self.surface.render(UiUpdate::Failure {
            message: FAILURE_MESSAGE.to_string(),
            retry_label: RETRY_LABEL.to_string(),
        });
    }
}

/// Join the attempt in `slot`, or never resolve when there is none.
async fn join_attempt(
    slot: &mut Option<AttemptHandle>,
) -> Result<Result<AttemptReport, AssemblyError>, JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeError, HostBridge};
    use crate::delivery::DeliveryConfig;
    use crate::presentation::HeadlessSurface;
    use crate::probe::FixtureEnvironment;
    use crate::transparency::create_shared_log;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingBridge {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingBridge {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) -> Result<(), BridgeError> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl HostBridge for RecordingBridge {
        fn send_data(&self, data: &str) -> Result<(), BridgeError> {
            self.push(format!("sendData:{data}"))
        }

        fn expand(&self) -> Result<(), BridgeError> {
            self.push("expand".to_string())
        }

        fn set_background_color(&self, color: &str) -> Result<(), BridgeError> {
            self.push(format!("setBackgroundColor:{color}"))
        }

        fn enable_closing_confirmation(&self) -> Result<(), BridgeError> {
            self.push("enableClosingConfirmation".to_string())
        }

        fn close(&self) -> Result<(), BridgeError> {
            self.push("close".to_string())
        }
    }

    fn quick_options() -> GateOptions {
        GateOptions {
            windows: WindowDurations::uniform(Duration::from_millis(60)),
            submit_delay: Duration::from_millis(10),
            bridge_close_delay: Duration::from_millis(10),
            background_color: "#ffffff".to_string(),
            page_url: Some("https://gate.example/?tgid=42".to_string()),
        }
    }

    fn parts(surface: HeadlessSurface, bridge: Bridge) -> GateParts {
        // Nothing listens on port 9, so delivery is absorbed quickly.
        let mut delivery = DeliveryConfig::new("http://127.0.0.1:9");
        delivery.timeout = Duration::from_millis(500);

        GateParts {
            probes: ProbeSet::new(Arc::new(FixtureEnvironment::desktop_chrome())),
            delivery: DeliveryClient::new(delivery).unwrap(),
            surface: Box::new(surface),
            bridge,
            source: InteractionSource::new(),
            log: create_shared_log(),
            options: quick_options(),
        }
    }

    /// Let aborted window tasks drop their listeners.
    async fn yield_a_bit() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn gate(surface: &HeadlessSurface) -> VerificationController {
        VerificationController::new(parts(surface.clone(), Bridge::Absent)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_anchor_rejected() {
        let surface = HeadlessSurface::new().without(Anchor::SubmitTrigger);
        let result = VerificationController::new(parts(surface, Bridge::Absent));

        match result {
            Err(InitializationError::MissingAnchor(anchor)) => {
                assert_eq!(anchor, Anchor::SubmitTrigger)
            }
            Ok(_) => panic!("construction should fail"),
        }
    }

    #[tokio::test]
    async fn test_construction_prepares_bridge() {
        let recorder = Arc::new(RecordingBridge::default());
        let controller = VerificationController::new(parts(
            HeadlessSurface::new(),
            Bridge::Present(recorder.clone()),
        ))
        .unwrap();

        assert_eq!(
            recorder.calls(),
            vec!["expand", "setBackgroundColor:#ffffff", "enableClosingConfirmation"]
        );
        assert_eq!(controller.state(), VerificationState::Idle);
        assert_eq!(controller.correlation_id(), Some(42));
    }

    #[tokio::test]
    async fn test_verify_requires_consent() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        assert!(controller.verify().is_ignored());

        controller.toggle_consent();
        controller.toggle_consent();
        assert_eq!(controller.state(), VerificationState::Idle);
        assert!(controller.verify().is_ignored());
        assert!(!controller.is_submitting());
        assert_eq!(controller.attempts(), 0);
    }

    #[tokio::test]
    async fn test_consent_opens_and_closes_windows() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        assert_eq!(controller.source().listener_count(), 3);
        assert!(controller.aggregator.has_signature());

        controller.toggle_consent();
        yield_a_bit().await;
        assert_eq!(controller.source().listener_count(), 0);
        assert_eq!(
            surface.updates().last(),
            Some(&UiUpdate::Consent { checked: false })
        );
    }

    #[tokio::test]
    async fn test_activation_keys_toggle_consent() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        assert_eq!(
            controller.press_key("Space", KeyFocus::ConsentControl),
            Transition::Moved {
                from: VerificationState::Idle,
                to: VerificationState::Checked,
            }
        );
        controller.press_key("Enter", KeyFocus::Body);
        assert_eq!(controller.state(), VerificationState::Idle);

        controller.handle(GateEvent::Key {
            code: "Enter".to_string(),
            focus: KeyFocus::ConsentControl,
        });
        assert_eq!(controller.state(), VerificationState::Checked);
        assert_eq!(controller.source().listener_count(), 3);
    }

    #[tokio::test]
    async fn test_keys_ignored_elsewhere() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        assert!(controller.press_key("Space", KeyFocus::Other).is_ignored());
        assert!(controller.press_key("Enter", KeyFocus::Other).is_ignored());
        assert!(controller
            .press_key("KeyA", KeyFocus::ConsentControl)
            .is_ignored());
        assert!(controller.press_key("Tab", KeyFocus::Body).is_ignored());

        assert_eq!(controller.state(), VerificationState::Idle);
        assert_eq!(controller.source().listener_count(), 0);
        assert_eq!(surface.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_verify_while_submitting_is_noop() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        assert_eq!(
            controller.verify(),
            Transition::Moved {
                from: VerificationState::Checked,
                to: VerificationState::Submitting,
            }
        );
        assert!(controller.verify().is_ignored());
        assert!(controller.toggle_consent().is_ignored());

        assert_eq!(controller.settle().await, VerificationState::Verified);
        assert_eq!(controller.attempts(), 1);
        assert_eq!(controller.log().stats().submissions(), 1);
        assert_eq!(
            surface
                .updates()
                .iter()
                .filter(|u| **u == UiUpdate::Loading)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_network_verifies_with_one_notification() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        controller.verify();
        controller.settle().await;

        let outcome = controller.outcome().unwrap();
        assert!(!outcome.receipt.is_accepted());
        assert_eq!(outcome.notification, NotificationPath::Fallback);
        assert_eq!(outcome.payload.tgid(), Some(42));

        let stats = controller.log().stats();
        assert_eq!(stats.notifications(), 1);
        assert_eq!(stats.fallback_notifications, 1);

        let updates = surface.updates();
        let success = updates.iter().position(|u| *u == UiUpdate::Success);
        let fallback = updates
            .iter()
            .position(|u| matches!(u, UiUpdate::FallbackNotice(_)));
        assert!(success.is_some());
        assert!(fallback > success);
    }

    #[tokio::test]
    async fn test_bridge_notified_instead_of_fallback() {
        let recorder = Arc::new(RecordingBridge::default());
        let surface = HeadlessSurface::new();
        let mut controller = VerificationController::new(parts(
            surface.clone(),
            Bridge::Present(recorder.clone()),
        ))
        .unwrap();

        controller.toggle_consent();
        controller.verify();
        controller.settle().await;

        assert_eq!(
            controller.outcome().map(|o| o.notification),
            Some(NotificationPath::Bridge)
        );
        assert!(!surface
            .updates()
            .iter()
            .any(|u| matches!(u, UiUpdate::FallbackNotice(_))));

        let sent: Vec<String> = recorder
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("sendData:"))
            .collect();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(&controller.identity().session_id));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.calls().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_lost_anchor_fails_then_retry_verifies() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        surface.detach(Anchor::LoadingIndicator);
        controller.verify();

        assert_eq!(controller.state(), VerificationState::Failed);
        assert!(!controller.is_submitting());
        yield_a_bit().await;
        assert_eq!(controller.source().listener_count(), 0);
        assert_eq!(
            surface.updates().last(),
            Some(&UiUpdate::Failure {
                message: FAILURE_MESSAGE.to_string(),
                retry_label: RETRY_LABEL.to_string(),
            })
        );

        surface.reattach(Anchor::LoadingIndicator);
        assert_eq!(
            controller.verify(),
            Transition::Moved {
                from: VerificationState::Failed,
                to: VerificationState::Submitting,
            }
        );
        assert_eq!(controller.settle().await, VerificationState::Verified);
    }

    #[tokio::test]
    async fn test_aborted_attempt_fails() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        controller.verify();
        if let Some(handle) = controller.attempt.as_ref() {
            handle.abort();
        }

        assert_eq!(controller.settle().await, VerificationState::Failed);
        assert!(controller.outcome().is_none());

        // Toggling from Failed clears consent.
        controller.toggle_consent();
        assert_eq!(controller.state(), VerificationState::Idle);
    }

    #[tokio::test]
    async fn test_submission_waits_for_windows() {
        let surface = HeadlessSurface::new();
        let mut controller = gate(&surface);

        controller.toggle_consent();
        let started = Instant::now();
        controller.verify();
        controller.settle().await;

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(controller.log().stats().windows_completed, 3);
    }

    #[tokio::test]
    async fn test_run_loop_collects_interaction() {
        let surface = HeadlessSurface::new();
        let mut gate_parts = parts(surface.clone(), Bridge::Absent);
        gate_parts.options.windows = WindowDurations::uniform(Duration::from_millis(200));
        let controller = VerificationController::new(gate_parts).unwrap();

        let (tx, rx) = mpsc::channel(16);
        let running = tokio::spawn(controller.run(rx));

        tx.send(GateEvent::ToggleConsent).await.unwrap();
        tx.send(GateEvent::Pointer(PointerEvent::Move)).await.unwrap();
        tx.send(GateEvent::Pointer(PointerEvent::Move)).await.unwrap();
        tx.send(GateEvent::Pointer(PointerEvent::Click { x: 3, y: 4 }))
            .await
            .unwrap();
        tx.send(GateEvent::Verify).await.unwrap();
        tx.send(GateEvent::Verify).await.unwrap();

        let controller = running.await.unwrap();
        assert_eq!(controller.state(), VerificationState::Verified);
        assert_eq!(controller.attempts(), 1);

        let interaction = controller.outcome().unwrap().payload.interaction();
        assert_eq!(interaction.mouse_movement, 2);
        assert_eq!(interaction.click_pattern.len(), 1);
        assert_eq!(interaction.scroll_behavior, 0);
    }

    #[tokio::test]
    async fn test_run_loop_ends_when_channel_closes() {
        let surface = HeadlessSurface::new();
        let controller = gate(&surface);

        let (tx, rx) = mpsc::channel(4);
        tx.send(GateEvent::ToggleConsent).await.unwrap();
        drop(tx);

        let controller = controller.run(rx).await;
        assert_eq!(controller.state(), VerificationState::Checked);
        assert!(controller.outcome().is_none());
    }
}
