//! Talking-head assembly binary.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adreel_spec::parse_template_list;
use adreel_worker::{metrics, AssemblyPipeline, PipelineConfig, RunInputs};

#[derive(Parser, Debug)]
#[command(name = "adreel-assemble", version, about = "Assemble talking-head ad specs")]
struct Cli {
    /// Background image or video (URL or path).
    #[arg(long, env = "ASSEMBLE_BACKGROUND")]
    background: String,

    /// Talking-head video (URL or path).
    #[arg(long, env = "ASSEMBLE_HEAD")]
    head: String,

    /// Text aligned to the detected speech.
    #[arg(long, env = "ASSEMBLE_TRANSCRIPT")]
    transcript: Option<String>,

    /// File holding the transcript.
    #[arg(long, env = "ASSEMBLE_TRANSCRIPT_FILE")]
    transcript_file: Option<PathBuf>,

    /// Explicit subtitle cues (JSON).
    #[arg(long, env = "ASSEMBLE_SUBTITLES_FILE")]
    subtitles: Option<PathBuf>,

    /// Comma-separated template list; overrides ASSEMBLE_TEMPLATES.
    #[arg(long)]
    templates: Option<String>,

    /// Where specs are written; overrides OUTPUT_DIR.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Only write specs.
    #[arg(long, default_value_t = false)]
    no_render: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("adreel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true).with_thread_ids(false))
            .with(env_filter)
            .init();
    }

    let cli = Cli::parse();
    info!("Starting adreel-assemble");

    let mut config = PipelineConfig::from_env().context("invalid configuration")?;
    if let Some(raw) = &cli.templates {
        config = config.with_templates(parse_template_list(raw).context("invalid --templates")?);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir);
    }
    if cli.no_render {
        config = config.with_no_render(true);
    }
    info!("Pipeline config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr).context("failed to start metrics exporter")?;
        info!(%addr, "Serving metrics");
    }

    let pipeline = AssemblyPipeline::new(config)?;
    let inputs = RunInputs {
        background: cli.background,
        head: cli.head,
        transcript: cli.transcript,
        transcript_file: cli.transcript_file,
        subtitles_file: cli.subtitles,
    };

    let summary = match pipeline.run(&inputs).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(stage = %e.stage(), "Assembly failed: {}", e);
            return Err(e.into());
        }
    };

    for spec in &summary.assembled {
        match &spec.render {
            Some(render) => println!(
                "{}\t{}\t{}",
                spec.template,
                spec.path.display(),
                render.url.as_deref().unwrap_or("-")
            ),
            None => println!("{}\t{}", spec.template, spec.path.display()),
        }
    }
    for (template, e) in &summary.failed {
        eprintln!("{template}\tfailed\t{e}");
    }

    info!(run_id = %summary.run_id, output_dir = %summary.output_dir.display(), "Done");
    Ok(())
}
