//! Time-boxed interaction observation.
//!
//! Each window subscribes to the pointer event stream for one
//! [`InteractionKind`] and unsubscribes once its duration has elapsed,
//! whatever the event volume. A [`WindowHandle`] owns the window: dropping
//! it aborts the listener task, so no exit path leaks a subscription.

use crate::interaction::types::{InteractionKind, InteractionSample, PointerEvent};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A pointer event stamped when it was emitted.
#[derive(Debug, Clone, Copy)]
struct Observed {
    event: PointerEvent,
    at: DateTime<Utc>,
}

/// The stream of pointer events windows subscribe to.
///
/// Every listener gets its own unbounded queue, so a burst is never
/// truncated however long a window task waits to be scheduled.
#[derive(Debug, Clone, Default)]
pub struct InteractionSource {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<Observed>>>>,
}

impl InteractionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event stamped now; returns how many listeners received it.
    pub fn emit(&self, event: PointerEvent) -> usize {
        self.emit_at(event, Utc::now())
    }

    /// Deliver an event that happened at `at`.
    pub fn emit_at(&self, event: PointerEvent, at: DateTime<Utc>) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|tx| tx.send(Observed { event, at }).is_ok());
        listeners.len()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Observed> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<Observed>>> {
        // A poisoned list is still a valid list of senders.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Errors finalizing observation windows.
#[derive(Debug)]
pub enum ObserverError {
    /// A window task ended without delivering its sample
    WindowLost(InteractionKind),
}

impl std::fmt::Display for ObserverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObserverError::WindowLost(kind) => {
                write!(f, "{kind} window ended without a sample")
            }
        }
    }
}

impl std::error::Error for ObserverError {}

/// An open observation window.
pub struct WindowHandle {
    kind: InteractionKind,
    deadline: Instant,
    task: JoinHandle<()>,
    done: oneshot::Receiver<InteractionSample>,
}

impl WindowHandle {
    fn open(
        source: &InteractionSource,
        kind: InteractionKind,
        duration: Duration,
        log: SharedTransparencyLog,
    ) -> Self {
        // Subscribe before spawning so the listener is registered on return.
        let mut rx = source.subscribe();
        let deadline = Instant::now() + duration;
        let (done_tx, done) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut sample = InteractionSample::empty(Utc::now());
            let timer = tokio::time::sleep_until(deadline);
            tokio::pin!(timer);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut timer => break,
                    received = rx.recv() => match received {
                        Some(Observed { event, at }) if event.kind() == kind => {
                            log.record_pointer_event(&event);
                            sample.record(event, at);
                        }
                        Some(_) => {}
                        None => {
                            (&mut timer).await;
                            break;
                        }
                    },
                }
            }

            drop(rx);
            log.record_window_completed();
            tracing::debug!(%kind, events = sample.event_count(), "observation window closed");
            let _ = done_tx.send(sample);
        });

        Self {
            kind,
            deadline,
            task,
            done,
        }
    }

    /// Wait for the window to elapse and take its sample.
    pub async fn finish(mut self) -> Result<InteractionSample, ObserverError> {
        let kind = self.kind;
        (&mut self.done)
            .await
            .map_err(|_| ObserverError::WindowLost(kind))
    }
}

impl Drop for WindowHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Windows handed over by [`InteractionObserver::freeze`].
pub struct PendingSample {
    started: DateTime<Utc>,
    windows: Vec<WindowHandle>,
}

impl PendingSample {
    /// Wait for every window to elapse and merge their samples.
    pub async fn finish(self) -> Result<InteractionSample, ObserverError> {
        let mut merged = InteractionSample::empty(self.started);
        for window in self.windows {
            merged.merge(window.finish().await?);
        }
        Ok(merged)
    }
}

/// Manages one window per interaction kind.
pub struct InteractionObserver {
    source: InteractionSource,
    windows: HashMap<InteractionKind, WindowHandle>,
    log: SharedTransparencyLog,
}

impl InteractionObserver {
    pub fn new(source: InteractionSource, log: SharedTransparencyLog) -> Self {
        Self {
            source,
            windows: HashMap::new(),
            log,
        }
    }

    /// Open a window for `kind`. An open window of the same kind is
    /// cancelled and its partial sample discarded.
    pub fn start_window(&mut self, kind: InteractionKind, duration: Duration) {
        let handle = WindowHandle::open(&self.source, kind, duration, self.log.clone());
        if self.windows.insert(kind, handle).is_some() {
            tracing::debug!(%kind, "restarted observation window");
        }
    }

    /// Cancel every open window without producing a sample.
    pub fn cancel_all(&mut self) {
        if !self.windows.is_empty() {
            tracing::debug!(count = self.windows.len(), "cancelling observation windows");
        }
        self.windows.clear();
    }

    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    /// Hand every open window over for finalization. The observer is left
    /// empty; the returned windows can no longer be cancelled from here.
    pub fn freeze(&mut self) -> PendingSample {
        let mut windows: Vec<WindowHandle> = self.windows.drain().map(|(_, w)| w).collect();
        windows.sort_by_key(|w| w.deadline);
        PendingSample {
            started: Utc::now(),
            windows,
        }
    }

    pub fn source(&self) -> &InteractionSource {
        &self.source
    }
}
