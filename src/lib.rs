//! Arquebus - post-processing for JMeter load-test output
//!
//! Arquebus turns the raw output of a load-test run into reports: it
//! computes metrics from result logs (CSV or XML), scrapes the tool's own
//! HTML dashboard, decides which of the two is authoritative, renders a
//! self-contained analysis report with an optional narrative from a
//! chat-completions service, and links that report from the summary page.
//! It is used both as a command-line tool and as a library.
//!
//! # Example
//!
//! ```rust,no_run
//! use arquebus::{ChatCompletionsClient, Config, ReportPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let client = ChatCompletionsClient::from_config(&config)?;
//!
//!     let outcome = ReportPipeline::new(&config)
//!         .generator(client)
//!         .analyze_summary(Path::new("reports/shop_summary_20260101_080000.html"))
//!         .await?;
//!
//!     println!("Wrote {} ({} runs)", outcome.report.display(), outcome.runs);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod narrative;
pub mod normalize;
pub mod patch;
mod pipeline;
pub mod reconcile;
pub mod render;
pub mod utils;

// Re-export the main types for library users
pub use config::{Config, ConfigOverrides};
pub use dashboard::{ReportMarkupExtractor, TemplateScraper};
pub use error::{Error, Result};
pub use metrics::{LogMetrics, MetricsExtractor};
pub use models::{ReportDashboard, SampleRecord, TpsSummary};
pub use narrative::{ChatCompletionsClient, Narrative, NarrativeGenerator};
pub use patch::PatchOutcome;
pub use pipeline::{AnalysisOutcome, INDEX_FILE, ReportPipeline, RunOutcome, RunSource};
pub use reconcile::Reconciled;
