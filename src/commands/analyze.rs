use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use arquebus::utils::find_latest_summary;
use arquebus::{ChatCompletionsClient, Config, ReportPipeline};

/// Run the analyze command with the given arguments
pub async fn run(config: &Config, summary: Option<PathBuf>) -> Result<()> {
    let summary = match summary {
        Some(path) => path,
        None => {
            let dir = &config.platform.reports_dir;
            find_latest_summary(dir)
                .with_context(|| format!("Failed to search {} for summaries", dir.display()))?
                .with_context(|| format!("No *_summary_*.html found under {}", dir.display()))?
        }
    };
    info!(path = %summary.display(), "Analyzing summary");

    let pipeline = ReportPipeline::new(config);
    let outcome = match ChatCompletionsClient::from_config(config) {
        Ok(client) => pipeline.generator(client).analyze_summary(&summary).await,
        Err(e) => {
            warn!(error = %e, "Narrative service unavailable");
            pipeline.analyze_summary(&summary).await
        }
    }
    .with_context(|| format!("Failed to analyze {}", summary.display()))?;

    info!(
        report = %outcome.report.display(),
        runs = outcome.runs,
        placeholder = outcome.placeholder,
        patch = %outcome.patch,
        "Analysis complete"
    );
    println!("{}", outcome.report.display());

    Ok(())
}
