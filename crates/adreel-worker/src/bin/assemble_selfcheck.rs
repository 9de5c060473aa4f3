use std::path::Path;
use std::process::Command;

use adreel_spec::TemplateRegistry;
use adreel_worker::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env()?;

    println!(
        "assemble-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;
    ensure_templates(&config).await?;
    if config.render_target().is_some() {
        ensure_env_present(&["RENDER_API_KEY"])?;
    }

    println!("assemble-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", name, output.status));
    }
    Ok(())
}

async fn ensure_templates(config: &PipelineConfig) -> anyhow::Result<()> {
    let registry = TemplateRegistry::new(&config.templates_dir);
    for kind in config.templates.iter().copied() {
        registry
            .load(kind)
            .await
            .map_err(|e| anyhow::anyhow!("template {}: {}", kind, e))?;
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
