//! Host bridge: the embedding application's notification interface.
//!
//! Whether a bridge exists is decided once, when the gate is built
//! ([`Bridge::Present`] or [`Bridge::Absent`]). Every call on it is
//! best-effort; a failing or absent bridge routes the verified result to
//! the local fallback indicator instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operations offered by an embedding host.
pub trait HostBridge: Send + Sync {
    fn send_data(&self, data: &str) -> Result<(), BridgeError>;

    fn expand(&self) -> Result<(), BridgeError>;

    fn set_background_color(&self, color: &str) -> Result<(), BridgeError>;

    fn enable_closing_confirmation(&self) -> Result<(), BridgeError>;

    fn close(&self) -> Result<(), BridgeError>;
}

/// Host bridge errors.
#[derive(Debug)]
pub enum BridgeError {
    /// The host rejected or failed the call
    Call(String),
    /// The message could not be encoded
    Encode(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Call(e) => write!(f, "Bridge call failed: {e}"),
            BridgeError::Encode(e) => write!(f, "Bridge encode error: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Which path reported a verified result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPath {
    Bridge,
    Fallback,
}

/// Message sent to the host on verification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedMessage<'a> {
    pub status: &'static str,
    pub session_id: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// The bridge capability, selected once.
#[derive(Clone)]
pub enum Bridge {
    Present(Arc<dyn HostBridge>),
    Absent,
}

impl Bridge {
    pub fn present(bridge: impl HostBridge + 'static) -> Self {
        Bridge::Present(Arc::new(bridge))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Bridge::Present(_))
    }

    /// Ask the host to expand, match the background and confirm closing.
    pub fn prepare(&self, background_color: &str) {
        let Bridge::Present(bridge) = self else {
            return;
        };
        if let Err(e) = bridge.expand() {
            tracing::debug!(error = %e, "bridge expand failed");
        }
        if let Err(e) = bridge.set_background_color(background_color) {
            tracing::debug!(error = %e, "bridge background color failed");
        }
        if let Err(e) = bridge.enable_closing_confirmation() {
            tracing::debug!(error = %e, "bridge closing confirmation failed");
        }
    }

    /// Report a verified session to the host.
    ///
    /// Returns [`NotificationPath::Bridge`] only if `send_data` succeeded; the
    /// bridge is then closed after `close_after`. Any other outcome means
    /// the caller must show the fallback indicator.
    pub fn notify_verified(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
        close_after: Duration,
    ) -> NotificationPath {
        let Bridge::Present(bridge) = self else {
            tracing::debug!("no host bridge, using fallback indicator");
            return NotificationPath::Fallback;
        };

        let message = VerifiedMessage {
            status: "verified",
            session_id,
            timestamp: at,
        };
        let sent = serde_json::to_string(&message)
            .map_err(|e| BridgeError::Encode(e.to_string()))
            .and_then(|data| bridge.send_data(&data));

        match sent {
            Ok(()) => {
                let bridge = Arc::clone(bridge);
                tokio::spawn(async move {
                    tokio::time::sleep(close_after).await;
                    if let Err(e) = bridge.close() {
                        tracing::debug!(error = %e, "bridge close failed");
                    }
                });
                NotificationPath::Bridge
            }
            Err(e) => {
                tracing::warn!(error = %e, "host bridge notification failed, using fallback");
                NotificationPath::Fallback
            }
        }
    }
}

/// A bridge that writes each call as one JSON line.
///
/// The embedding process reads the lines from the gate's stdout.
pub struct JsonLineBridge<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLineBridge<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLineBridge<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn call(&self, method: &str, params: serde_json::Value) -> Result<(), BridgeError> {
        let line = serde_json::json!({ "method": method, "params": params });
        let mut out = self
            .out
            .lock()
            .map_err(|_| BridgeError::Call("bridge output poisoned".to_string()))?;
        writeln!(out, "{line}")
            .and_then(|_| out.flush())
            .map_err(|e| BridgeError::Call(e.to_string()))
    }
}

impl<W: Write + Send> HostBridge for JsonLineBridge<W> {
    fn send_data(&self, data: &str) -> Result<(), BridgeError> {
        self.call("sendData", serde_json::Value::String(data.to_string()))
    }

    fn expand(&self) -> Result<(), BridgeError> {
        self.call("expand", serde_json::Value::Null)
    }

    fn set_background_color(&self, color: &str) -> Result<(), BridgeError> {
        self.call(
            "setBackgroundColor",
            serde_json::Value::String(color.to_string()),
        )
    }

    fn enable_closing_confirmation(&self) -> Result<(), BridgeError> {
        self.call("enableClosingConfirmation", serde_json::Value::Null)
    }

    fn close(&self) -> Result<(), BridgeError> {
        self.call("close", serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records calls; `send_data` fails when `fail_send` is set.
    #[derive(Default)]
    struct RecordingBridge {
        calls: Mutex<Vec<String>>,
        fail_send: bool,
    }

    impl RecordingBridge {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl HostBridge for RecordingBridge {
        fn send_data(&self, data: &str) -> Result<(), BridgeError> {
            if self.fail_send {
                return Err(BridgeError::Call("host went away".to_string()));
            }
            self.push(&format!("sendData:{data}"));
            Ok(())
        }

        fn expand(&self) -> Result<(), BridgeError> {
            self.push("expand");
            Ok(())
        }

        fn set_background_color(&self, color: &str) -> Result<(), BridgeError> {
            self.push(&format!("setBackgroundColor:{color}"));
            Ok(())
        }

        fn enable_closing_confirmation(&self) -> Result<(), BridgeError> {
            Err(BridgeError::Call("not supported".to_string()))
        }

        fn close(&self) -> Result<(), BridgeError> {
            self.push("close");
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_through_bridge_then_close() {
        let recorder = Arc::new(RecordingBridge::default());
        let bridge = Bridge::Present(recorder.clone());

        let path = bridge.notify_verified("session_abc_1", Utc::now(), Duration::from_secs(2));
        assert_eq!(path, NotificationPath::Bridge);

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("\"status\":\"verified\""));
        assert!(calls[0].contains("\"sessionId\":\"session_abc_1\""));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.calls().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_failing_bridge_falls_back() {
        let bridge = Bridge::present(RecordingBridge {
            fail_send: true,
            ..Default::default()
        });
        let path = bridge.notify_verified("s", Utc::now(), Duration::from_secs(2));
        assert_eq!(path, NotificationPath::Fallback);
    }

    #[test]
    fn test_absent_bridge_falls_back() {
        let path = Bridge::Absent.notify_verified("s", Utc::now(), Duration::ZERO);
        assert_eq!(path, NotificationPath::Fallback);
    }

    #[test]
    fn test_prepare_is_best_effort() {
        let recorder = Arc::new(RecordingBridge::default());
        Bridge::Present(recorder.clone()).prepare("#101010");

        assert_eq!(recorder.calls(), vec!["expand", "setBackgroundColor:#101010"]);
    }

    #[test]
    fn test_json_line_bridge_output() {
        let bridge = JsonLineBridge::new(Vec::new());
        bridge.send_data("{\"status\":\"verified\"}").unwrap();
        bridge.close().unwrap();

        let out = String::from_utf8(bridge.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["method"], "sendData");
        assert_eq!(lines[0]["params"], "{\"status\":\"verified\"}");
        assert_eq!(lines[1]["method"], "close");
    }
}
