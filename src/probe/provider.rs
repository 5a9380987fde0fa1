//! The capability interface and the probe set built on it.

use crate::probe::types::{
    CanvasScript, ConnectionHints, ContextKind, HardwareHints, LocaleInfo, NavigationTiming,
    NavigatorInfo, Probe, ProbeFailure, RuntimeFeatures, ScreenMetrics, StorageSupport,
    WebGlParameters,
};
use std::sync::Arc;

/// Font families tested for membership, in reporting order.
pub const REFERENCE_FONTS: [&str; 13] = [
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Courier New",
    "Verdana",
    "Georgia",
    "Palatino",
    "Garamond",
    "Comic Sans MS",
    "Arial Black",
    "Impact",
    "Tahoma",
    "Trebuchet MS",
];

/// Source of raw environment signals.
///
/// Implementations read one signal per method and report failures as
/// [`ProbeFailure`]; they must not panic. Callers go through [`ProbeSet`],
/// which converts failures into sentinels.
pub trait CapabilityProvider: Send + Sync {
    fn screen(&self) -> Result<ScreenMetrics, ProbeFailure>;

    fn navigator(&self) -> Result<NavigatorInfo, ProbeFailure>;

    fn hardware(&self) -> Result<HardwareHints, ProbeFailure>;

    /// `Ok(None)` when the runtime exposes no connection object.
    fn connection(&self) -> Result<Option<ConnectionHints>, ProbeFailure>;

    fn locale(&self) -> Result<LocaleInfo, ProbeFailure>;

    fn storage(&self) -> Result<StorageSupport, ProbeFailure>;

    fn runtime_features(&self) -> Result<RuntimeFeatures, ProbeFailure>;

    fn context_support(&self, kind: ContextKind) -> Result<bool, ProbeFailure>;

    fn font_available(&self, family: &str) -> Result<bool, ProbeFailure>;

    fn plugins(&self) -> Result<Vec<String>, ProbeFailure>;

    fn audio_context(&self) -> Result<bool, ProbeFailure>;

    /// Run the script on an off-screen surface and export it as a data URL.
    fn render_canvas(&self, script: &CanvasScript) -> Result<String, ProbeFailure>;

    /// `Ok(None)` when no 3D context can be created. An error means the
    /// context exists but the debug-info extension could not be read.
    fn webgl_parameters(&self) -> Result<Option<WebGlParameters>, ProbeFailure>;

    /// Load milestones of the page hosting the gate.
    fn navigation_timing(&self) -> Result<NavigationTiming, ProbeFailure>;
}

/// Shared handle to a capability provider.
pub type SharedProvider = Arc<dyn CapabilityProvider>;

/// The probe set: one side-effect-free query per signal, each degrading to
/// a sentinel instead of failing.
#[derive(Clone)]
pub struct ProbeSet {
    provider: SharedProvider,
}

impl ProbeSet {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    pub fn screen(&self) -> Probe<ScreenMetrics> {
        Probe::from_result("screen", self.provider.screen())
    }

    pub fn navigator(&self) -> Probe<NavigatorInfo> {
        Probe::from_result("navigator", self.provider.navigator())
    }

    pub fn hardware(&self) -> Probe<HardwareHints> {
        Probe::from_result("hardware", self.provider.hardware())
    }

    pub fn connection(&self) -> Probe<ConnectionHints> {
        match self.provider.connection() {
            Ok(hints) => Probe::from_option(hints),
            Err(failure) => Probe::from_result("connection", Err(failure)),
        }
    }

    pub fn locale(&self) -> Probe<LocaleInfo> {
        Probe::from_result("locale", self.provider.locale())
    }

    pub fn storage(&self) -> Probe<StorageSupport> {
        Probe::from_result("storage", self.provider.storage())
    }

    pub fn runtime_features(&self) -> Probe<RuntimeFeatures> {
        Probe::from_result("runtime_features", self.provider.runtime_features())
    }

    /// Whether a rendering context of the given kind can be created.
    /// A failing probe counts as no support.
    pub fn supports_context(&self, kind: ContextKind) -> bool {
        match self.provider.context_support(kind) {
            Ok(supported) => supported,
            Err(failure) => {
                tracing::debug!(?kind, %failure, "context probe failed");
                false
            }
        }
    }

    /// The subset of [`REFERENCE_FONTS`] the runtime reports as installed.
    pub fn installed_fonts(&self) -> Vec<String> {
        REFERENCE_FONTS
            .iter()
            .filter(|family| match self.provider.font_available(family) {
                Ok(available) => available,
                Err(failure) => {
                    tracing::debug!(family, %failure, "font probe failed");
                    false
                }
            })
            .map(|family| family.to_string())
            .collect()
    }

    /// Plugin names; empty when the runtime has no plugin list.
    pub fn plugins(&self) -> Vec<String> {
        self.provider.plugins().unwrap_or_else(|failure| {
            tracing::debug!(%failure, "plugin probe failed");
            Vec::new()
        })
    }

    pub fn audio_context(&self) -> bool {
        self.provider.audio_context().unwrap_or(false)
    }

    pub fn canvas_data_url(&self, script: &CanvasScript) -> Probe<String> {
        Probe::from_result("canvas", self.provider.render_canvas(script))
    }

    pub fn navigation_timing(&self) -> Probe<NavigationTiming> {
        Probe::from_result("navigation", self.provider.navigation_timing())
    }

    pub fn webgl(&self) -> Probe<WebGlParameters> {
        match self.provider.webgl_parameters() {
            Ok(Some(params)) => Probe::Value(params),
            Ok(None) => Probe::Unsupported,
            Err(failure) => {
                tracing::debug!(%failure, "webgl debug info unavailable");
                Probe::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fixture::FixtureEnvironment;

    #[test]
    fn test_fonts_keep_reference_order() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.fonts = vec!["Impact".to_string(), "Arial".to_string()];
        let probes = ProbeSet::new(Arc::new(env));

        assert_eq!(probes.installed_fonts(), vec!["Arial", "Impact"]);
    }

    #[test]
    fn test_missing_connection_is_unknown() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.connection = None;
        let probes = ProbeSet::new(Arc::new(env));

        assert_eq!(probes.connection(), Probe::Unknown);
    }

    #[test]
    fn test_failing_probe_degrades() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.failing = vec!["screen".to_string(), "plugins".to_string()];
        let probes = ProbeSet::new(Arc::new(env));

        assert_eq!(probes.screen(), Probe::Error);
        assert!(probes.plugins().is_empty());
    }

    #[test]
    fn test_webgl_sentinels() {
        let mut env = FixtureEnvironment::desktop_chrome();
        env.webgl = None;
        assert_eq!(ProbeSet::new(Arc::new(env.clone())).webgl(), Probe::Unsupported);

        env = FixtureEnvironment::desktop_chrome();
        if let Some(webgl) = env.webgl.as_mut() {
            webgl.debug_extension = false;
        }
        assert_eq!(ProbeSet::new(Arc::new(env)).webgl(), Probe::Error);
    }

    #[test]
    fn test_navigation_timing_probe() {
        let mut env = FixtureEnvironment::desktop_chrome();
        let probes = ProbeSet::new(Arc::new(env.clone()));
        assert!(probes.navigation_timing().is_value());

        env.navigation = None;
        let probes = ProbeSet::new(Arc::new(env));
        assert_eq!(probes.navigation_timing(), Probe::Unsupported);
    }
}
