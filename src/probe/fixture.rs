//! A described environment, loaded from JSON.
//!
//! Used to replay a captured browser environment and to exercise the
//! pipeline in tests. Any signal may be absent (reported as unsupported or
//! unknown) or listed in `failing` to make its probe raise an error.

use crate::fingerprint::canvas::{GlyphMetrics, SoftwareCanvas};
use crate::probe::provider::CapabilityProvider;
use crate::probe::types::{
    CanvasScript, ConnectionHints, ContextKind, HardwareHints, LocaleInfo, NavigationTiming,
    NavigatorInfo, ProbeFailure, RuntimeFeatures, ScreenMetrics, StorageSupport, WebGlParameters,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 3D context description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebGlFixture {
    #[serde(flatten)]
    pub parameters: WebGlParameters,
    /// Whether the debug renderer info extension can be read
    #[serde(default = "default_true")]
    pub debug_extension: bool,
}

fn default_true() -> bool {
    true
}

/// A complete environment description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureEnvironment {
    pub screen: Option<ScreenMetrics>,
    pub navigator: Option<NavigatorInfo>,
    pub hardware: HardwareHints,
    pub connection: Option<ConnectionHints>,
    pub locale: Option<LocaleInfo>,
    pub storage: StorageSupport,
    pub features: RuntimeFeatures,
    pub fonts: Vec<String>,
    pub plugins: Vec<String>,
    pub audio_context: bool,
    /// Glyph metrics of the 2D stack; `None` means no 2D context
    pub canvas: Option<GlyphMetrics>,
    pub webgl: Option<WebGlFixture>,
    /// Page load milestones; `None` when the runtime has no timing API
    pub navigation: Option<NavigationTiming>,
    /// Probe names that raise instead of answering
    pub failing: Vec<String>,
}

impl FixtureEnvironment {
    /// Load a fixture from a JSON file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| FixtureError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| FixtureError::ParseError(e.to_string()))
    }

    /// A typical desktop Chrome on Windows.
    pub fn desktop_chrome() -> Self {
        Self {
            screen: Some(ScreenMetrics {
                width: 1920,
                height: 1080,
                color_depth: 24,
                pixel_depth: 24,
                avail_width: 1920,
                avail_height: 1040,
            }),
            navigator: Some(NavigatorInfo {
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
                language: "en-US".to_string(),
                languages: vec!["en-US".to_string(), "en".to_string()],
                platform: "Win32".to_string(),
                cookie_enabled: true,
                pdf_viewer_enabled: Some(true),
                vendor: "Google Inc.".to_string(),
                product: "Gecko".to_string(),
                product_sub: "20030107".to_string(),
                vendor_sub: String::new(),
            }),
            hardware: HardwareHints {
                hardware_concurrency: Some(8),
                device_memory: Some(8),
                max_touch_points: 0,
            },
            connection: Some(ConnectionHints {
                effective_type: "4g".to_string(),
                downlink: 10.0,
                rtt: 50,
            }),
            locale: Some(LocaleInfo {
                timezone: "Europe/Berlin".to_string(),
                timezone_offset: -60,
                locale: "en-US".to_string(),
            }),
            storage: StorageSupport {
                local_storage: true,
                session_storage: true,
                indexed_db: true,
            },
            features: RuntimeFeatures {
                touch_support: false,
                service_worker: true,
            },
            fonts: ["Arial", "Courier New", "Georgia", "Times New Roman", "Verdana"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            plugins: vec!["PDF Viewer".to_string(), "Chrome PDF Viewer".to_string()],
            audio_context: true,
            canvas: Some(GlyphMetrics::default()),
            webgl: Some(WebGlFixture {
                parameters: WebGlParameters {
                    vendor: "Google Inc. (NVIDIA)".to_string(),
                    renderer: "ANGLE (NVIDIA, NVIDIA GeForce GTX 1060 Direct3D11 vs_5_0 ps_5_0)"
                        .to_string(),
                    version: "WebGL 1.0 (OpenGL ES 2.0 Chromium)".to_string(),
                },
                debug_extension: true,
            }),
            navigation: Some(NavigationTiming {
                load_time: 812,
                dom_ready_time: 430,
                ready_start: 3,
            }),
            failing: Vec::new(),
        }
    }

    fn check(&self, probe: &str) -> Result<(), ProbeFailure> {
        if self.failing.iter().any(|name| name == probe) {
            Err(ProbeFailure::Failed(format!("{probe} probe raised")))
        } else {
            Ok(())
        }
    }
}

impl CapabilityProvider for FixtureEnvironment {
    fn screen(&self) -> Result<ScreenMetrics, ProbeFailure> {
        self.check("screen")?;
        self.screen.ok_or(ProbeFailure::Unsupported)
    }

    fn navigator(&self) -> Result<NavigatorInfo, ProbeFailure> {
        self.check("navigator")?;
        self.navigator.clone().ok_or(ProbeFailure::Unsupported)
    }

    fn hardware(&self) -> Result<HardwareHints, ProbeFailure> {
        self.check("hardware")?;
        Ok(self.hardware)
    }

    fn connection(&self) -> Result<Option<ConnectionHints>, ProbeFailure> {
        self.check("connection")?;
        Ok(self.connection.clone())
    }

    fn locale(&self) -> Result<LocaleInfo, ProbeFailure> {
        self.check("locale")?;
        self.locale
            .clone()
            .ok_or_else(|| ProbeFailure::Unavailable("no resolved locale".to_string()))
    }

    fn storage(&self) -> Result<StorageSupport, ProbeFailure> {
        self.check("storage")?;
        Ok(self.storage)
    }

    fn runtime_features(&self) -> Result<RuntimeFeatures, ProbeFailure> {
        self.check("features")?;
        Ok(self.features)
    }

    fn context_support(&self, kind: ContextKind) -> Result<bool, ProbeFailure> {
        match kind {
            ContextKind::TwoD => {
                self.check("canvas")?;
                Ok(self.canvas.is_some())
            }
            ContextKind::WebGl => {
                self.check("webgl")?;
                Ok(self.webgl.is_some())
            }
        }
    }

    fn font_available(&self, family: &str) -> Result<bool, ProbeFailure> {
        self.check("fonts")?;
        Ok(self.fonts.iter().any(|f| f.eq_ignore_ascii_case(family)))
    }

    fn plugins(&self) -> Result<Vec<String>, ProbeFailure> {
        self.check("plugins")?;
        Ok(self.plugins.clone())
    }

    fn audio_context(&self) -> Result<bool, ProbeFailure> {
        self.check("audio")?;
        Ok(self.audio_context)
    }

    fn render_canvas(&self, script: &CanvasScript) -> Result<String, ProbeFailure> {
        self.check("canvas")?;
        let metrics = self.canvas.ok_or(ProbeFailure::Unsupported)?;
        Ok(SoftwareCanvas::render(script, metrics))
    }

    fn webgl_parameters(&self) -> Result<Option<WebGlParameters>, ProbeFailure> {
        self.check("webgl")?;
        match &self.webgl {
            None => Ok(None),
            Some(webgl) if !webgl.debug_extension => Err(ProbeFailure::Failed(
                "WEBGL_debug_renderer_info not available".to_string(),
            )),
            Some(webgl) => Ok(Some(webgl.parameters.clone())),
        }
    }

    fn navigation_timing(&self) -> Result<NavigationTiming, ProbeFailure> {
        self.check("navigation")?;
        self.navigation.ok_or(ProbeFailure::Unsupported)
    }
}

/// Fixture loading errors.
#[derive(Debug)]
pub enum FixtureError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureError::IoError(e) => write!(f, "IO error: {e}"),
            FixtureError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for FixtureError {}
