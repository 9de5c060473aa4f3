//! End-to-end assembly of one talking-head run.
//!
//! Probe both inputs, resolve subtitles and produce every required cutout
//! concurrently, then fill, compose and reconcile each selected template
//! and write it out. Specs go to the render service only once every
//! template has been finalized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;

use adreel_media::{
    load_cue_file, resolve_track, FitPolicy, SubtitleInputs, SubtitleSource, SubtitleTrack,
};
use adreel_models::{
    AssetKind, BackgroundLengthMode, BlocksConfig, ClipNode, ClipType, FitMode, OverlayShape, RenderSpec,
    SubtitleMode, TemplateBlocks, Transition,
};
use adreel_overlay::{OverlayAsset, OverlayCoordinator, OverlayRequest};
use adreel_spec::{
    compose, ensure_background_color, get_node, load_blocks_config, merge_blocks, reconcile, required_shapes,
    set_asset_at_path, set_length_at_path, validate_tracks, write_spec, Composition, NativeDurations,
    ReconcileReport, SpecError, TemplateKind, TemplateRegistry,
};

use crate::analyzer::{AnalyzedSource, FfmpegAnalyzer, MediaAnalyzer};
use crate::config::{BookendConfig, PipelineConfig};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::logging::RunLogger;
use crate::metrics;
use crate::render::{RenderClient, RenderOutput};

/// The three loosely specified inputs of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunInputs {
    /// Background URL or local path
    pub background: String,
    /// Talking-head URL or local path
    pub head: String,
    pub transcript: Option<String>,
    pub transcript_file: Option<PathBuf>,
    /// Explicit cue file
    pub subtitles_file: Option<PathBuf>,
}

impl RunInputs {
    pub fn new(background: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            background: background.into(),
            head: head.into(),
            ..Default::default()
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_transcript_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_file = Some(path.into());
        self
    }

    pub fn with_subtitles_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.subtitles_file = Some(path.into());
        self
    }
}

/// A finalized template.
#[derive(Debug, Clone)]
pub struct AssembledSpec {
    pub template: TemplateKind,
    pub path: PathBuf,
    pub spec: RenderSpec,
    pub composition: Composition,
    pub report: ReconcileReport,
    pub render: Option<RenderOutput>,
}

/// Outcome of a run with at least one assembled template.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub subtitles: SubtitleSource,
    /// Per requested shape: the cutout, or why it could not be produced
    pub overlays: BTreeMap<OverlayShape, Result<OverlayAsset, String>>,
    pub assembled: Vec<AssembledSpec>,
    pub failed: Vec<(TemplateKind, PipelineError)>,
}

impl RunSummary {
    pub fn spec_paths(&self) -> impl Iterator<Item = &Path> {
        self.assembled.iter().map(|spec| spec.path.as_path())
    }
}

struct Bookend {
    config: BookendConfig,
    clip: ClipNode,
}

/// Everything shared by the per-template step of one run.
struct RunContext<'a> {
    background: &'a AnalyzedSource,
    head: &'a AnalyzedSource,
    head_duration: f64,
    subtitles: &'a SubtitleTrack,
    overlays: &'a BTreeMap<OverlayShape, Result<OverlayAsset, String>>,
    file_blocks: &'a BlocksConfig,
    intro: Option<&'a Bookend>,
    outro: Option<&'a Bookend>,
    output_dir: &'a Path,
}

pub struct AssemblyPipeline {
    config: PipelineConfig,
    analyzer: Arc<dyn MediaAnalyzer>,
    coordinator: OverlayCoordinator,
    registry: TemplateRegistry,
    render: Option<RenderClient>,
}

impl AssemblyPipeline {
    /// Build a pipeline with the ffmpeg analyzer and the overlay backend
    /// the config selects.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let coordinator = config
            .overlay
            .build_coordinator()
            .map_err(|e| PipelineError::config(format!("overlay backend: {e}")))?;
        let render = config
            .render_target()
            .cloned()
            .map(RenderClient::new)
            .transpose()
            .map_err(|e| PipelineError::config(format!("render client: {e}")))?;
        Ok(Self {
            registry: TemplateRegistry::new(&config.templates_dir),
            analyzer: Arc::new(FfmpegAnalyzer::default()),
            coordinator,
            render,
            config,
        })
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn MediaAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_coordinator(mut self, coordinator: OverlayCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_render_client(mut self, client: RenderClient) -> Self {
        self.render = Some(client);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &OverlayCoordinator {
        &self.coordinator
    }

    /// Run the whole pipeline once.
    pub async fn run(&self, inputs: &RunInputs) -> PipelineResult<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let logger = RunLogger::new(&run_id, "assemble");
        let span = logger.create_span();

        let scratch = self.config.work_dir.join("runs").join(&run_id);
        let result = self.run_inner(inputs, &logger, &scratch).instrument(span).await;
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                logger.log_warning(&format!("could not remove {}: {e}", scratch.display()));
            }
        }

        metrics::record_run(result.is_ok());
        match &result {
            Ok(summary) => logger.log_completion(&format!(
                "{} of {} templates assembled",
                summary.assembled.len(),
                self.config.templates.len()
            )),
            Err(e) => logger.log_error(&format!("{} stage: {e}", e.stage())),
        }
        result
    }

    async fn run_inner(
        &self,
        inputs: &RunInputs,
        logger: &RunLogger,
        scratch: &Path,
    ) -> PipelineResult<RunSummary> {
        let templates = &self.config.templates;
        if templates.is_empty() {
            return Err(PipelineError::config("no templates selected"));
        }
        logger.log_start(&format!(
            "templates={}",
            templates.iter().map(TemplateKind::as_str).collect::<Vec<_>>().join(",")
        ));
        let output_dir = self.config.resolve_output_dir(chrono::Local::now());

        let policy = self.config.fit_policy();
        let (background, head) = logger
            .timed("probe", async {
                tokio::try_join!(
                    self.analyze("background", &inputs.background, scratch, &policy),
                    self.analyze("head", &inputs.head, scratch, &policy),
                )
            })
            .await?;
        let head_duration = match head.asset.native_duration() {
            Some(duration) if head.asset.is_video() => duration,
            _ => {
                return Err(PipelineError::invalid_asset(
                    "head",
                    format!("expected a video with a duration, got {}", head.asset.kind),
                ))
            }
        };
        logger.log_progress(&format!(
            "background {} {}x{} fit={}, head {:.3}s",
            background.asset.kind,
            background.asset.width,
            background.asset.height,
            background.asset.fit_mode,
            head_duration
        ));

        let file_blocks = self.load_blocks(logger).await;
        let intro = self.bookend(self.config.intro.as_ref()).await;
        let outro = self.bookend(self.config.outro.as_ref()).await;

        let (subtitles, overlays) = tokio::join!(
            logger.timed("subtitles", self.resolve_subtitles(inputs, &head, head_duration, logger)),
            logger.timed("overlays", self.produce_overlays(&head, logger)),
        );

        let ctx = RunContext {
            background: &background,
            head: &head,
            head_duration,
            subtitles: &subtitles,
            overlays: &overlays,
            file_blocks: &file_blocks,
            intro: intro.as_ref(),
            outro: outro.as_ref(),
            output_dir: &output_dir,
        };

        let mut assembled = Vec::new();
        let mut failed = Vec::new();
        for &template in templates {
            match logger.timed("template", self.assemble_template(template, &ctx)).await {
                Ok(spec) => {
                    metrics::record_template(template, true);
                    logger.log_progress(&format!(
                        "{template}: {} ({:.3}s)",
                        spec.path.display(),
                        spec.report.max_content_end
                    ));
                    assembled.push(spec);
                }
                Err(e) => {
                    metrics::record_template(template, false);
                    logger.log_error(&format!("{template}: {e}"));
                    failed.push((template, e));
                }
            }
        }

        if assembled.is_empty() {
            let stage = failed.first().map_or(Stage::Template, |(_, e)| e.stage());
            let summary = failed
                .iter()
                .map(|(template, e)| format!("{template}: {e}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PipelineError::NoTemplates { stage, summary });
        }

        if let Some(client) = &self.render {
            for spec in &mut assembled {
                let output = logger.timed("render", client.render(&spec.spec)).await?;
                logger.log_progress(&format!("{} rendered: {:?}", spec.template, output.url));
                spec.render = Some(output);
            }
        }

        Ok(RunSummary {
            run_id: logger.run_id().to_string(),
            output_dir,
            subtitles: subtitles.source,
            overlays,
            assembled,
            failed,
        })
    }

    async fn analyze(
        &self,
        asset: &'static str,
        source: &str,
        scratch: &Path,
        policy: &FitPolicy,
    ) -> PipelineResult<AnalyzedSource> {
        if source.trim().is_empty() {
            return Err(PipelineError::invalid_asset(asset, "no source given"));
        }
        self.analyzer
            .analyze(source, scratch, asset, policy)
            .await
            .map_err(|source| PipelineError::Probe { asset, source })
    }

    async fn load_blocks(&self, logger: &RunLogger) -> BlocksConfig {
        let Some(path) = &self.config.blocks_config else {
            return BlocksConfig::default();
        };
        match load_blocks_config(path).await {
            Ok(config) => config,
            Err(e) => {
                logger.log_warning(&format!("ignoring blocks config: {e}"));
                BlocksConfig::default()
            }
        }
    }

    async fn bookend(&self, config: Option<&BookendConfig>) -> Option<Bookend> {
        let config = config?;
        let kind = self.analyzer.media_kind(&config.url).await;
        let clip = ClipNode::new(ClipType::from(kind))
            .with_src(&config.url)
            .with_length(config.length)
            .with_fit(FitMode::Contain)
            .with_transition(Transition::Named("fade".to_string()));
        Some(Bookend {
            config: config.clone(),
            clip,
        })
    }

    async fn read_transcript(&self, inputs: &RunInputs, logger: &RunLogger) -> Option<String> {
        if let Some(text) = inputs.transcript.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Some(text.to_string());
        }
        let path = inputs.transcript_file.as_ref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                logger.log_warning(&format!("cannot read transcript {}: {e}", path.display()));
                None
            }
        }
    }

    async fn resolve_subtitles(
        &self,
        inputs: &RunInputs,
        head: &AnalyzedSource,
        head_duration: f64,
        logger: &RunLogger,
    ) -> SubtitleTrack {
        let mode = self.config.subtitle_mode;
        if mode == SubtitleMode::None {
            return SubtitleTrack::disabled();
        }

        let explicit = match &inputs.subtitles_file {
            Some(path) => Some(load_cue_file(path).await),
            None => None,
        };
        let transcript = self.read_transcript(inputs, logger).await;

        // speech detection decodes the whole head clip; skip it unless alignment will happen
        let needs_intervals =
            mode == SubtitleMode::Auto && explicit.is_none() && transcript.is_some();
        let intervals = if needs_intervals {
            match self.analyzer.speech_intervals(&head.local_path, &self.config.speech).await {
                Ok(intervals) => intervals,
                Err(e) => {
                    logger.log_warning(&format!("speech detection failed: {e}"));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let track = resolve_track(
            mode,
            SubtitleInputs {
                explicit,
                transcript: transcript.as_deref(),
                intervals: &intervals,
                head_duration,
            },
            &self.config.alignment,
        );
        logger.log_progress(&format!("subtitles: {} cues ({:?})", track.cues.len(), track.source));
        track
    }

    async fn produce_overlays(
        &self,
        head: &AnalyzedSource,
        logger: &RunLogger,
    ) -> BTreeMap<OverlayShape, Result<OverlayAsset, String>> {
        let shapes = required_shapes(&self.config.templates);
        if shapes.is_empty() {
            return BTreeMap::new();
        }

        let fingerprint = match self.analyzer.fingerprint(&head.local_path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                let reason = format!("cannot fingerprint head clip: {e}");
                logger.log_error(&reason);
                return shapes.into_iter().map(|shape| (shape, Err(reason.clone()))).collect();
            }
        };

        let requests: Vec<OverlayRequest> = shapes
            .into_iter()
            .map(|shape| {
                OverlayRequest::new(
                    &head.asset.source,
                    &fingerprint,
                    shape,
                    self.config.overlay.params.clone(),
                )
            })
            .collect();

        self.coordinator
            .produce_all(&requests)
            .await
            .into_iter()
            .map(|(shape, result)| {
                let result = result.map_err(|e| {
                    logger.log_warning(&format!("overlay {shape} failed: {e}"));
                    e.to_string()
                });
                if let Ok(asset) = &result {
                    if let Some(reason) = &asset.fallback_reason {
                        logger.log_warning(&format!("overlay {shape} produced locally after: {reason}"));
                    }
                }
                (shape, result)
            })
            .collect()
    }

    fn blocks_for(&self, template: TemplateKind, ctx: &RunContext<'_>) -> TemplateBlocks {
        let inner = ctx.file_blocks.get(template.as_str()).cloned().unwrap_or_default();
        let mut outer = TemplateBlocks::default();
        if let Some(intro) = ctx.intro.filter(|b| b.config.applies_to(template)) {
            outer.prepend_clips.push(intro.clip.clone());
        }
        if let Some(outro) = ctx.outro.filter(|b| b.config.applies_to(template)) {
            outer.append_clips.push(outro.clip.clone());
        }
        merge_blocks(&inner, &outer)
    }

    /// Fill, compose, reconcile and write one template.
    async fn assemble_template(
        &self,
        template: TemplateKind,
        ctx: &RunContext<'_>,
    ) -> PipelineResult<AssembledSpec> {
        // a template never gets a partial set of cutouts
        let mut cutouts = Vec::new();
        for (shape, path) in template.overlay_nodes() {
            match ctx.overlays.get(&shape) {
                Some(Ok(asset)) => cutouts.push((path, asset.url.clone())),
                Some(Err(reason)) => {
                    return Err(PipelineError::MissingOverlay {
                        template,
                        shape,
                        reason: reason.clone(),
                    })
                }
                None => {
                    return Err(PipelineError::MissingOverlay {
                        template,
                        shape,
                        reason: "not produced".to_string(),
                    })
                }
            }
        }

        let fail = |source: SpecError| PipelineError::Template { template, source };
        let mut spec = self.registry.load(template).await.map_err(fail)?;
        let background = &ctx.background.asset;

        for path in template.head_nodes() {
            set_asset_at_path(&mut spec, &path, &ctx.head.asset.source, None, Some(AssetKind::Video))
                .map_err(fail)?;
        }
        for path in template.background_nodes() {
            set_asset_at_path(
                &mut spec,
                &path,
                &background.source,
                Some(background.fit_mode),
                Some(background.kind),
            )
            .map_err(fail)?;
            if self.config.background_mode == BackgroundLengthMode::Fixed {
                if let Some(native) = background.native_duration() {
                    let trim = get_node(&spec, &path).map_err(fail)?.trim_seconds();
                    set_length_at_path(&mut spec, &path, native - trim).map_err(fail)?;
                }
            }
        }
        for (path, url) in &cutouts {
            set_asset_at_path(&mut spec, path, url, None, Some(AssetKind::Video)).map_err(fail)?;
        }

        spec.subtitles = ctx.subtitles.cues.clone();
        if let Some(theme) = &self.config.subtitle_theme {
            spec.subtitle_theme = Some(theme.clone());
        }

        let blocks = self.blocks_for(template, ctx);
        let composition = compose(&mut spec, &blocks, Some(ctx.head_duration)).map_err(fail)?;
        ensure_background_color(&mut spec, &self.config.background_color);

        let mut natives = NativeDurations::new();
        if let Some(duration) = background.native_duration() {
            natives.insert(background.source.clone(), duration);
        }
        natives.insert(ctx.head.asset.source.clone(), ctx.head_duration);
        for (_, url) in &cutouts {
            natives.insert(url.clone(), ctx.head_duration);
        }

        let report = reconcile(&mut spec, &natives, self.config.background_mode).map_err(fail)?;
        validate_tracks(&spec).map_err(fail)?;

        let path = ctx.output_dir.join(template.file_name());
        write_spec(&spec, &path)
            .await
            .map_err(|source| PipelineError::Output { template, source })?;

        Ok(AssembledSpec {
            template,
            path,
            spec,
            composition,
            report,
            render: None,
        })
    }
}
