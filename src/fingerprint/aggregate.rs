//! Fingerprint aggregation.
//!
//! Composes the probe set into an [`EnvironmentSnapshot`] (taken once) and a
//! [`RenderingSignature`] (computed on first use and cached).

use crate::fingerprint::canvas::{signature_script, strip_data_url_header};
use crate::probe::{
    ConnectionHints, ContextKind, LocaleInfo, NavigationTiming, Probe, ProbeSet, ScreenMetrics,
    WebGlParameters,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::OnceLock;

/// Browser identity block of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserIdentity {
    pub user_agent: String,
    pub language: String,
    pub languages: Vec<String>,
    pub platform: String,
    pub cookie_enabled: bool,
    pub pdf_viewer_enabled: Probe<bool>,
}

/// Hardware block of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSnapshot {
    pub hardware_concurrency: Probe<u32>,
    pub device_memory: Probe<u32>,
    pub max_touch_points: u32,
}

/// Network block of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub connection: Probe<ConnectionHints>,
}

/// Boolean feature flags plus the font and plugin lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub touch_support: bool,
    pub service_worker: bool,
    #[serde(rename = "webGL")]
    pub webgl: bool,
    pub canvas: bool,
    pub fonts: Vec<String>,
    pub plugins: Vec<String>,
    pub local_storage: bool,
    pub session_storage: bool,
    #[serde(rename = "indexedDB")]
    pub indexed_db: bool,
}

/// Everything known about the environment without user interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    pub screen: Probe<ScreenMetrics>,
    pub browser: Probe<BrowserIdentity>,
    pub hardware: Probe<HardwareSnapshot>,
    pub network: NetworkSnapshot,
    pub system: Probe<LocaleInfo>,
    pub features: FeatureFlags,
    pub timestamp: DateTime<Utc>,
}

impl EnvironmentSnapshot {
    /// Agent string, or `"unknown"` when the navigator could not be read.
    pub fn agent_string(&self) -> &str {
        self.browser
            .value()
            .map(|b| b.user_agent.as_str())
            .unwrap_or("unknown")
    }

    /// Screen width and height, zero when the screen could not be read.
    pub fn screen_dimensions(&self) -> (u32, u32) {
        self.screen
            .value()
            .map(|s| (s.width, s.height))
            .unwrap_or((0, 0))
    }
}

/// Rendering-derived signals, plus the navigator details collected with them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingSignature {
    pub canvas_fingerprint: Probe<String>,
    #[serde(rename = "webglFingerprint")]
    pub webgl_fingerprint: Probe<WebGlParameters>,
    pub audio_fingerprint: bool,
    pub installed_fonts: Vec<String>,
    pub platform: String,
    pub vendor: String,
    pub product: String,
    pub product_sub: String,
    pub vendor_sub: String,
}

/// Builds snapshots and signatures from a probe set.
pub struct FingerprintAggregator {
    probes: ProbeSet,
    signature: OnceLock<RenderingSignature>,
}

impl FingerprintAggregator {
    pub fn new(probes: ProbeSet) -> Self {
        Self {
            probes,
            signature: OnceLock::new(),
        }
    }

    /// Take an environment snapshot.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        let features = self.probes.runtime_features();
        let storage = self.probes.storage();

        let browser = self.probes.navigator().map(|n| BrowserIdentity {
            user_agent: n.user_agent,
            language: n.language,
            languages: n.languages,
            platform: n.platform,
            cookie_enabled: n.cookie_enabled,
            pdf_viewer_enabled: Probe::from_option(n.pdf_viewer_enabled),
        });

        let hardware = self.probes.hardware().map(|h| HardwareSnapshot {
            hardware_concurrency: Probe::from_option(h.hardware_concurrency),
            device_memory: Probe::from_option(h.device_memory),
            max_touch_points: h.max_touch_points,
        });

        let runtime = features.value().copied().unwrap_or_default();
        let storage = storage.value().copied().unwrap_or_default();

        EnvironmentSnapshot {
            screen: self.probes.screen(),
            browser,
            hardware,
            network: NetworkSnapshot {
                connection: self.probes.connection(),
            },
            system: self.probes.locale(),
            features: FeatureFlags {
                touch_support: runtime.touch_support,
                service_worker: runtime.service_worker,
                webgl: self.probes.supports_context(ContextKind::WebGl),
                canvas: self.probes.supports_context(ContextKind::TwoD),
                fonts: self.probes.installed_fonts(),
                plugins: self.probes.plugins(),
                local_storage: storage.local_storage,
                session_storage: storage.session_storage,
                indexed_db: storage.indexed_db,
            },
            timestamp: Utc::now(),
        }
    }

    /// The rendering signature, computed on first call.
    pub fn signature(&self) -> &RenderingSignature {
        self.signature.get_or_init(|| self.compute_signature())
    }

    /// Whether the signature has been computed yet.
    pub fn has_signature(&self) -> bool {
        self.signature.get().is_some()
    }

    /// Load milestones of the page hosting the gate.
    pub fn navigation_timing(&self) -> Probe<NavigationTiming> {
        self.probes.navigation_timing()
    }

    /// Render the fixed script and keep only the encoded payload.
    pub fn canvas_signature(&self) -> Probe<String> {
        self.probes
            .canvas_data_url(&signature_script())
            .map(|url| strip_data_url_header(&url).to_string())
    }

    fn compute_signature(&self) -> RenderingSignature {
        let navigator = self.probes.navigator();
        let nav = navigator.value();

        let signature = RenderingSignature {
            canvas_fingerprint: self.canvas_signature(),
            webgl_fingerprint: self.probes.webgl(),
            audio_fingerprint: self.probes.audio_context(),
            installed_fonts: self.probes.installed_fonts(),
            platform: nav.map(|n| n.platform.clone()).unwrap_or_default(),
            vendor: nav.map(|n| n.vendor.clone()).unwrap_or_default(),
            product: nav.map(|n| n.product.clone()).unwrap_or_default(),
            product_sub: nav.map(|n| n.product_sub.clone()).unwrap_or_default(),
            vendor_sub: nav.map(|n| n.vendor_sub.clone()).unwrap_or_default(),
        };
        tracing::debug!(
            canvas = signature.canvas_fingerprint.is_value(),
            webgl = signature.webgl_fingerprint.sentinel_label().unwrap_or("ok"),
            "rendering signature computed"
        );
        signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::canvas::GlyphMetrics;
    use crate::probe::FixtureEnvironment;
    use std::sync::Arc;

    fn aggregator(env: FixtureEnvironment) -> FingerprintAggregator {
        FingerprintAggregator::new(ProbeSet::new(Arc::new(env)))
    }

    #[test]
    fn test_canvas_signature_stable_within_session() {
        let agg = aggregator(FixtureEnvironment::desktop_chrome());
        let first = agg.canvas_signature();
        let second = agg.canvas_signature();

        assert!(first.is_value());
        assert_eq!(first, second);
    }

    #[test]
    fn test_canvas_signature_differs_across_stacks() {
        let chrome = aggregator(FixtureEnvironment::desktop_chrome());
        let mut other = FixtureEnvironment::desktop_chrome();
        other.canvas = Some(GlyphMetrics {
            advance: 0.6,
            height: 0.75,
        });
        let other = aggregator(other);

        assert_ne!(chrome.canvas_signature(), other.canvas_signature());
    }

    #[test]
    fn test_canvas_signature_drops_header() {
        let agg = aggregator(FixtureEnvironment::desktop_chrome());
        let signature = agg.canvas_signature();
        let payload = signature.value().unwrap();

        assert!(!payload.starts_with("data:"));
        assert!(!payload.contains(','));
    }

    #[test]
    fn test_signature_is_cached() {
        let agg = aggregator(FixtureEnvironment::desktop_chrome());
        assert!(!agg.has_signature());

        let first = agg.signature() as *const RenderingSignature;
        let second = agg.signature() as *const RenderingSignature;
        assert!(agg.has_signature());
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_contexts_report_sentinels() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.canvas = None;
        env.webgl = None;
        let agg = aggregator(env);
        let signature = agg.signature();

        assert_eq!(signature.canvas_fingerprint, Probe::Unsupported);
        assert_eq!(signature.webgl_fingerprint, Probe::Unsupported);

        let snapshot = agg.snapshot();
        assert!(!snapshot.features.canvas);
        assert!(!snapshot.features.webgl);
    }

    #[test]
    fn test_snapshot_serializes_original_shape() {
        let agg = aggregator(FixtureEnvironment::desktop_chrome());
        let json = serde_json::to_value(agg.snapshot()).unwrap();

        assert_eq!(json["screen"]["width"], 1920);
        assert!(json["browser"]["userAgent"].as_str().unwrap().contains("Chrome"));
        assert_eq!(json["hardware"]["hardwareConcurrency"], 8);
        assert_eq!(json["network"]["connection"]["effectiveType"], "4g");
        assert_eq!(json["features"]["webGL"], true);
        assert_eq!(json["features"]["indexedDB"], true);
    }

    #[test]
    fn test_snapshot_accessors_degrade() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.screen = None;
        env.navigator = None;
        let snapshot = aggregator(env).snapshot();

        assert_eq!(snapshot.agent_string(), "unknown");
        assert_eq!(snapshot.screen_dimensions(), (0, 0));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["screen"], "unsupported");
    }
}
