use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use arquebus::{Config, ReportPipeline};

/// Run the report command with the given arguments
pub async fn run(
    config: &Config,
    report_dir: PathBuf,
    result_log: Option<PathBuf>,
    name: Option<String>,
) -> Result<()> {
    let name = name
        .or_else(|| {
            report_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .context("Cannot derive a test name from the report directory, pass --name")?;

    let outcome = ReportPipeline::new(config)
        .reconcile_run(&report_dir, result_log.as_deref(), &name)
        .with_context(|| format!("Failed to write report for {}", report_dir.display()))?;

    info!(
        path = %outcome.index.display(),
        source = ?outcome.source,
        average_tps = outcome.tps.as_ref().map(|t| t.average_tps),
        "Run report ready"
    );
    println!("{}", outcome.index.display());

    Ok(())
}
