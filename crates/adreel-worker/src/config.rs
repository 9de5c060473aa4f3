//! Pipeline configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adreel_media::{AlignmentConfig, FitPolicy, SpeechDetectionConfig, DEFAULT_FIT_TOLERANCE};
use adreel_models::{AspectRatio, BackgroundLengthMode, SubtitleMode};
use adreel_overlay::OverlayConfig;
use adreel_spec::{parse_template_list, TemplateKind};

use crate::error::{PipelineError, PipelineResult};
use crate::render::RenderConfig;

pub const DEFAULT_BOOKEND_LENGTH: f64 = 2.5;
const MIN_BOOKEND_LENGTH: f64 = 0.1;

/// An intro or outro clip added to some or all templates.
#[derive(Debug, Clone, PartialEq)]
pub struct BookendConfig {
    pub url: String,
    /// Seconds, at least 0.1
    pub length: f64,
    /// Templates that get the clip; `None` means every selected template
    pub templates: Option<Vec<TemplateKind>>,
}

impl BookendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            length: DEFAULT_BOOKEND_LENGTH,
            templates: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length.max(MIN_BOOKEND_LENGTH);
        self
    }

    pub fn with_templates(mut self, templates: Vec<TemplateKind>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn applies_to(&self, template: TemplateKind) -> bool {
        self.templates
            .as_ref()
            .map_or(true, |templates| templates.contains(&template))
    }
}

/// Everything one run needs besides its inputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub templates: Vec<TemplateKind>,
    pub canvas: AspectRatio,
    pub fit_tolerance: f64,
    /// Fill color used when some clip is letterboxed
    pub background_color: String,
    pub subtitle_mode: SubtitleMode,
    pub subtitle_theme: Option<String>,
    pub background_mode: BackgroundLengthMode,
    pub blocks_config: Option<PathBuf>,
    /// Directory holding the template presets
    pub templates_dir: PathBuf,
    /// Where specs are written; `build/auto_<timestamp>` when unset
    pub output_dir: Option<PathBuf>,
    /// Scratch directory for downloads and overlay output
    pub work_dir: PathBuf,
    pub intro: Option<BookendConfig>,
    pub outro: Option<BookendConfig>,
    pub overlay: OverlayConfig,
    pub speech: SpeechDetectionConfig,
    pub alignment: AlignmentConfig,
    pub render: Option<RenderConfig>,
    pub no_render: bool,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let work_dir = std::env::temp_dir().join("adreel");
        Self {
            templates: TemplateKind::ALL.to_vec(),
            canvas: AspectRatio::PORTRAIT,
            fit_tolerance: DEFAULT_FIT_TOLERANCE,
            background_color: "#000000".to_string(),
            subtitle_mode: SubtitleMode::Auto,
            subtitle_theme: None,
            background_mode: BackgroundLengthMode::Auto,
            blocks_config: None,
            templates_dir: PathBuf::from("templates"),
            output_dir: None,
            overlay: OverlayConfig::default().with_work_dir(work_dir.join("overlays")),
            work_dir,
            intro: None,
            outro: None,
            speech: SpeechDetectionConfig::default(),
            alignment: AlignmentConfig::default(),
            render: None,
            no_render: false,
            metrics_addr: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn bookend_from_env(prefix: &str) -> PipelineResult<Option<BookendConfig>> {
    let Some(url) = env_non_empty(&format!("{prefix}_URL")) else {
        return Ok(None);
    };
    let mut bookend = BookendConfig::new(url)
        .with_length(env_parse(&format!("{prefix}_LENGTH")).unwrap_or(DEFAULT_BOOKEND_LENGTH));
    if let Some(raw) = env_non_empty(&format!("{prefix}_TEMPLATES")) {
        bookend = bookend.with_templates(parse_template_list(&raw)?);
    }
    Ok(Some(bookend))
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Numeric variables that fail to parse keep their default; template
    /// names and mode names must be valid.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        let templates = match env_non_empty("ASSEMBLE_TEMPLATES") {
            Some(raw) => parse_template_list(&raw)?,
            None => defaults.templates,
        };
        let canvas = match env_non_empty("ASSEMBLE_CANVAS") {
            Some(raw) => raw
                .parse()
                .map_err(|e| PipelineError::config(format!("ASSEMBLE_CANVAS: {e}")))?,
            None => defaults.canvas,
        };
        let subtitle_mode = match env_non_empty("SUBTITLES_MODE") {
            Some(raw) => raw.parse().map_err(|e| PipelineError::config(format!("SUBTITLES_MODE: {e}")))?,
            None => defaults.subtitle_mode,
        };
        let background_mode = match env_non_empty("BACKGROUND_LENGTH_MODE") {
            Some(raw) => raw
                .parse()
                .map_err(|e| PipelineError::config(format!("BACKGROUND_LENGTH_MODE: {e}")))?,
            None => defaults.background_mode,
        };

        let work_dir = env_non_empty("WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir);

        let render = env_non_empty("RENDER_API_URL").map(|url| {
            let mut render = RenderConfig::new(url);
            if let Some(key) = env_non_empty("RENDER_API_KEY") {
                render = render.with_api_key(key);
            }
            if let Some(secs) = env_parse::<u64>("RENDER_TIMEOUT_SECS") {
                render = render.with_timeout(Duration::from_secs(secs));
            }
            render
        });

        Ok(Self {
            templates,
            canvas,
            fit_tolerance: env_parse("ASSEMBLE_FIT_TOLERANCE").unwrap_or(defaults.fit_tolerance),
            background_color: env_non_empty("ASSEMBLE_BACKGROUND_COLOR").unwrap_or(defaults.background_color),
            subtitle_mode,
            subtitle_theme: env_non_empty("SUBTITLE_THEME"),
            background_mode,
            blocks_config: env_non_empty("BLOCKS_CONFIG").map(PathBuf::from),
            templates_dir: env_non_empty("TEMPLATES_DIR").map(PathBuf::from).unwrap_or(defaults.templates_dir),
            output_dir: env_non_empty("OUTPUT_DIR").map(PathBuf::from),
            overlay: OverlayConfig::from_env().with_work_dir(work_dir.join("overlays")),
            work_dir,
            intro: bookend_from_env("INTRO")?,
            outro: bookend_from_env("OUTRO")?,
            speech: defaults.speech,
            alignment: defaults.alignment,
            render,
            no_render: env_flag("NO_RENDER"),
            metrics_addr: env_parse("METRICS_ADDR"),
        })
    }

    pub fn fit_policy(&self) -> FitPolicy {
        FitPolicy::new(self.canvas, self.fit_tolerance)
    }

    pub fn with_templates(mut self, templates: Vec<TemplateKind>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Move the scratch directory, overlay output included.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self.overlay = self.overlay.with_work_dir(self.work_dir.join("overlays"));
        self
    }

    pub fn with_subtitle_mode(mut self, mode: SubtitleMode) -> Self {
        self.subtitle_mode = mode;
        self
    }

    pub fn with_background_mode(mut self, mode: BackgroundLengthMode) -> Self {
        self.background_mode = mode;
        self
    }

    pub fn with_blocks_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.blocks_config = Some(path.into());
        self
    }

    pub fn with_intro(mut self, intro: BookendConfig) -> Self {
        self.intro = Some(intro);
        self
    }

    pub fn with_outro(mut self, outro: BookendConfig) -> Self {
        self.outro = Some(outro);
        self
    }

    pub fn with_no_render(mut self, no_render: bool) -> Self {
        self.no_render = no_render;
        self
    }

    /// Render settings, unless rendering is switched off.
    pub fn render_target(&self) -> Option<&RenderConfig> {
        if self.no_render {
            None
        } else {
            self.render.as_ref()
        }
    }

    /// Output directory for a run started at `now`.
    pub fn resolve_output_dir(&self, now: chrono::DateTime<chrono::Local>) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => Path::new("build").join(format!("auto_{}", now.format("%Y%m%d_%H%M%S"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.templates.len(), 5);
        assert_eq!(config.canvas, AspectRatio::PORTRAIT);
        assert_eq!(config.fit_tolerance, 0.02);
        assert_eq!(config.background_color, "#000000");
        assert_eq!(config.subtitle_mode, SubtitleMode::Auto);
        assert_eq!(config.background_mode, BackgroundLengthMode::Auto);
        assert!(config.render_target().is_none());
        assert!(config.overlay.work_dir.starts_with(&config.work_dir));
    }

    #[test]
    fn test_bookend_length_floor() {
        let intro = BookendConfig::new("https://cdn/intro.mp4").with_length(0.0);
        assert_eq!(intro.length, 0.1);
        assert!(intro.applies_to(TemplateKind::Circle));

        let outro = BookendConfig::new("outro.mp4").with_templates(vec![TemplateKind::Basic]);
        assert!(outro.applies_to(TemplateKind::Basic));
        assert!(!outro.applies_to(TemplateKind::Overlay));
    }

    #[test]
    fn test_no_render_disables_target() {
        let mut config = PipelineConfig {
            render: Some(RenderConfig::new("http://render.local")),
            ..Default::default()
        };
        assert!(config.render_target().is_some());
        config = config.with_no_render(true);
        assert!(config.render_target().is_none());
    }

    #[test]
    fn test_output_dir_timestamp() {
        let now = chrono::Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let config = PipelineConfig::default();
        assert_eq!(config.resolve_output_dir(now), PathBuf::from("build/auto_20260304_050607"));
        let explicit = config.with_output_dir("/tmp/out");
        assert_eq!(explicit.resolve_output_dir(now), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_work_dir_moves_overlay_output() {
        let config = PipelineConfig::default().with_work_dir("/scratch");
        assert_eq!(config.overlay.work_dir, PathBuf::from("/scratch/overlays"));
    }
}
