use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use arquebus::utils::get_writer;
use arquebus::{ReportMarkupExtractor, TemplateScraper};

/// Run the dashboard command with the given arguments
pub async fn run(input: PathBuf, output: String) -> Result<()> {
    let dashboard = TemplateScraper
        .extract(&input)
        .with_context(|| format!("Failed to read report {}", input.display()))?;

    let mut writer = get_writer(&output)?;
    serde_json::to_writer_pretty(&mut writer, &dashboard)?;
    writeln!(writer)?;

    Ok(())
}
