//! Host-process capability provider.
//!
//! Answers the probes from what a native process can observe: OS, CPU
//! count, locale environment variables, installed font files. There is no
//! screen, 3D context, audio context or plugin list in this runtime; 2D
//! rendering goes through the in-crate software surface.

use crate::fingerprint::canvas::{GlyphMetrics, SoftwareCanvas};
use crate::probe::provider::CapabilityProvider;
use crate::probe::types::{
    CanvasScript, ConnectionHints, ContextKind, HardwareHints, LocaleInfo, NavigationTiming,
    NavigatorInfo, ProbeFailure, RuntimeFeatures, ScreenMetrics, StorageSupport, WebGlParameters,
};
use chrono::{Offset, Utc};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Maximum directory depth scanned below each font root.
const FONT_SCAN_DEPTH: usize = 4;

/// Style tokens that may follow a family name in a font file name, longest
/// first so the greedy match takes `italic` before `it`.
const STYLE_TOKENS: [&str; 18] = [
    "semibold", "demibold", "regular", "oblique", "italic", "medium", "light", "bold", "book",
    "psmt", "mt", "ps", "it", "bd", "bi", "b", "i", "z",
];

/// Abbreviated file names Windows ships for some reference families.
const SHORT_FILE_NAMES: [(&str, &str); 7] = [
    ("timesnewroman", "times"),
    ("couriernew", "cour"),
    ("arialblack", "ariblk"),
    ("palatino", "pala"),
    ("garamond", "gara"),
    ("comicsansms", "comic"),
    ("trebuchetms", "trebuc"),
];

/// Capability provider backed by the running process.
#[derive(Default)]
pub struct SystemEnvironment {
    font_index: OnceLock<Vec<String>>,
}

impl SystemEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent string identifying this process, analogous to a user agent.
    pub fn agent_string() -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        format!(
            "captcha-gate/{} ({}; {}; {})",
            crate::VERSION,
            std::env::consts::OS,
            std::env::consts::ARCH,
            host
        )
    }

    fn fonts(&self) -> &[String] {
        self.font_index.get_or_init(|| {
            let mut names = Vec::new();
            for root in font_roots() {
                collect_font_names(&root, FONT_SCAN_DEPTH, &mut names);
            }
            names.sort();
            names.dedup();
            names
        })
    }
}

impl CapabilityProvider for SystemEnvironment {
    fn screen(&self) -> Result<ScreenMetrics, ProbeFailure> {
        Err(ProbeFailure::Unsupported)
    }

    fn navigator(&self) -> Result<NavigatorInfo, ProbeFailure> {
        let language = posix_locale()
            .map(|l| bcp47_from_posix(&l))
            .unwrap_or_else(|| "en-US".to_string());

        Ok(NavigatorInfo {
            user_agent: Self::agent_string(),
            languages: vec![language.clone()],
            language,
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            cookie_enabled: false,
            pdf_viewer_enabled: None,
            vendor: String::new(),
            product: "captcha-gate".to_string(),
            product_sub: crate::VERSION.to_string(),
            vendor_sub: String::new(),
        })
    }

    fn hardware(&self) -> Result<HardwareHints, ProbeFailure> {
        let concurrency = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32);
        Ok(HardwareHints {
            hardware_concurrency: concurrency,
            device_memory: None,
            max_touch_points: 0,
        })
    }

    fn connection(&self) -> Result<Option<ConnectionHints>, ProbeFailure> {
        Ok(None)
    }

    fn locale(&self) -> Result<LocaleInfo, ProbeFailure> {
        let tz = match std::env::var("TZ") {
            Ok(name) => name
                .trim_start_matches(':')
                .parse::<chrono_tz::Tz>()
                .map_err(|e| ProbeFailure::Failed(format!("invalid TZ '{name}': {e}")))?,
            Err(_) => chrono_tz::Tz::UTC,
        };

        let local_minus_utc = Utc::now().with_timezone(&tz).offset().fix().local_minus_utc();
        let locale = posix_locale()
            .map(|l| bcp47_from_posix(&l))
            .ok_or_else(|| ProbeFailure::Unavailable("LANG not set".to_string()))?;

        Ok(LocaleInfo {
            timezone: tz.name().to_string(),
            timezone_offset: -local_minus_utc / 60,
            locale,
        })
    }

    fn storage(&self) -> Result<StorageSupport, ProbeFailure> {
        Ok(StorageSupport::default())
    }

    fn runtime_features(&self) -> Result<RuntimeFeatures, ProbeFailure> {
        Ok(RuntimeFeatures::default())
    }

    fn context_support(&self, kind: ContextKind) -> Result<bool, ProbeFailure> {
        Ok(kind == ContextKind::TwoD)
    }

    fn font_available(&self, family: &str) -> Result<bool, ProbeFailure> {
        let wanted = normalize_font_name(family);
        let fonts = self.fonts();
        Ok(fonts.iter().any(|name| file_matches_family(name, &wanted)))
    }

    fn plugins(&self) -> Result<Vec<String>, ProbeFailure> {
        Err(ProbeFailure::Unsupported)
    }

    fn audio_context(&self) -> Result<bool, ProbeFailure> {
        Ok(false)
    }

    fn render_canvas(&self, script: &CanvasScript) -> Result<String, ProbeFailure> {
        Ok(SoftwareCanvas::render(script, GlyphMetrics::default()))
    }

    fn webgl_parameters(&self) -> Result<Option<WebGlParameters>, ProbeFailure> {
        Ok(None)
    }

    fn navigation_timing(&self) -> Result<NavigationTiming, ProbeFailure> {
        Err(ProbeFailure::Unsupported)
    }
}

fn posix_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
}

/// `en_US.UTF-8` -> `en-US`
fn bcp47_from_posix(locale: &str) -> String {
    let base = locale.split(['.', '@']).next().unwrap_or(locale);
    base.replace('_', "-")
}

/// Lowercase with spaces, dashes and underscores removed.
fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a normalized font file stem belongs to a normalized family: the
/// family name (or its Windows short name) followed only by style tokens.
fn file_matches_family(stem: &str, family: &str) -> bool {
    let short = SHORT_FILE_NAMES
        .iter()
        .find(|(name, _)| *name == family)
        .map(|(_, short)| *short);

    [Some(family), short]
        .into_iter()
        .flatten()
        .any(|prefix| stem.strip_prefix(prefix).is_some_and(is_style_suffix))
}

fn is_style_suffix(mut rest: &str) -> bool {
    while !rest.is_empty() {
        match STYLE_TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(token) => rest = &rest[token.len()..],
            None => return false,
        }
    }
    true
}

fn font_roots() -> Vec<PathBuf> {
    let mut roots = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(dir) = dirs::font_dir() {
        roots.push(dir);
    }
    roots
}

fn collect_font_names(dir: &Path, depth: usize, names: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth > 0 {
                collect_font_names(&path, depth - 1, names);
            }
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
        if let (true, Some(stem)) = (is_font, path.file_stem().and_then(|s| s.to_str())) {
            names.push(normalize_font_name(stem));
        }
    }
}
