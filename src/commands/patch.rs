use anyhow::{Context, Result};
use std::path::PathBuf;

use arquebus::patch::patch_summary_file;

/// Run the patch command with the given arguments
pub async fn run(summary: PathBuf, link: String) -> Result<()> {
    let outcome = patch_summary_file(&summary, &link)
        .with_context(|| format!("Failed to patch {}", summary.display()))?;
    println!("{}: {}", summary.display(), outcome);

    Ok(())
}
