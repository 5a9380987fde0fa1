//! Raw signal types and the tagged probe result.
//!
//! A capability provider hands back these raw structures (or a
//! [`ProbeFailure`]); the probe set turns every answer into a [`Probe`] so
//! that a failing signal becomes a sentinel instead of an error.

use serde::{Deserialize, Serialize, Serializer};

/// Tagged result of a single environment probe.
///
/// Serializes as the bare value, or as one of the sentinel strings
/// `"unsupported"`, `"unknown"` and `"error"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// The signal was read successfully
    Value(T),
    /// The runtime does not offer this capability at all
    Unsupported,
    /// The capability exists but did not report a value
    Unknown,
    /// Reading the capability failed
    Error,
}

impl<T> Probe<T> {
    /// Convert a provider answer into a tagged probe, absorbing failures.
    pub fn from_result(probe: &'static str, result: Result<T, ProbeFailure>) -> Self {
        match result {
            Ok(value) => Probe::Value(value),
            Err(failure) => {
                tracing::debug!(probe, %failure, "probe degraded to sentinel");
                failure.sentinel()
            }
        }
    }

    /// Convert an optional property into a probe (`None` is `Unknown`).
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Probe::Unknown, Probe::Value)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Probe::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Probe::Value(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Value(v) => Probe::Value(f(v)),
            Probe::Unsupported => Probe::Unsupported,
            Probe::Unknown => Probe::Unknown,
            Probe::Error => Probe::Error,
        }
    }

    /// Sentinel label, or `None` for a concrete value.
    pub fn sentinel_label(&self) -> Option<&'static str> {
        match self {
            Probe::Value(_) => None,
            Probe::Unsupported => Some("unsupported"),
            Probe::Unknown => Some("unknown"),
            Probe::Error => Some("error"),
        }
    }
}

impl<T: Serialize> Serialize for Probe<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Probe::Value(v) => v.serialize(serializer),
            other => serializer.serialize_str(other.sentinel_label().unwrap_or("unknown")),
        }
    }
}

/// Why a capability could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The capability does not exist in this runtime
    Unsupported,
    /// The capability exists but has nothing to report
    Unavailable(String),
    /// The capability raised an error while being read
    Failed(String),
}

impl ProbeFailure {
    /// The sentinel this failure degrades to.
    pub fn sentinel<T>(&self) -> Probe<T> {
        match self {
            ProbeFailure::Unsupported => Probe::Unsupported,
            ProbeFailure::Unavailable(_) => Probe::Unknown,
            ProbeFailure::Failed(_) => Probe::Error,
        }
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Unsupported => write!(f, "capability unsupported"),
            ProbeFailure::Unavailable(e) => write!(f, "capability unavailable: {e}"),
            ProbeFailure::Failed(e) => write!(f, "capability failed: {e}"),
        }
    }
}

impl std::error::Error for ProbeFailure {}

/// Screen geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMetrics {
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    pub pixel_depth: u32,
    pub avail_width: u32,
    pub avail_height: u32,
}

/// Navigator identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatorInfo {
    pub user_agent: String,
    pub language: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub platform: String,
    #[serde(default)]
    pub cookie_enabled: bool,
    #[serde(default)]
    pub pdf_viewer_enabled: Option<bool>,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub product_sub: String,
    #[serde(default)]
    pub vendor_sub: String,
}

/// Hardware hints. Optional fields are not exposed by every runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareHints {
    #[serde(default)]
    pub hardware_concurrency: Option<u32>,
    #[serde(default)]
    pub device_memory: Option<u32>,
    #[serde(default)]
    pub max_touch_points: u32,
}

/// Network connection hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHints {
    pub effective_type: String,
    pub downlink: f64,
    pub rtt: u32,
}

/// Locale and timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleInfo {
    pub timezone: String,
    /// Minutes to add to local time to reach UTC
    pub timezone_offset: i32,
    pub locale: String,
}

/// Presence of the storage APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSupport {
    pub local_storage: bool,
    pub session_storage: bool,
    #[serde(rename = "indexedDB")]
    pub indexed_db: bool,
}

/// Runtime feature flags not covered elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFeatures {
    pub touch_support: bool,
    pub service_worker: bool,
}

/// Page load milestones, in milliseconds after navigation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub load_time: i64,
    pub dom_ready_time: i64,
    pub ready_start: i64,
}

/// Rendering context kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    TwoD,
    WebGl,
}

/// 3D context vendor/renderer tuple, read through the debug-info extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebGlParameters {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
}

/// RGBA color with straight alpha in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// A single 2D drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Set the fill color for subsequent operations
    FillStyle(Rgba),
    /// Set the font size in pixels
    FontSize(u32),
    FillRect { x: i32, y: i32, w: u32, h: u32 },
    /// Text drawn with a top baseline at (x, y)
    FillText { text: &'static str, x: i32, y: i32 },
}

/// A fixed drawing sequence on a surface of the given size.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasScript {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}
