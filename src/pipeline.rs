use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::dashboard::{ReportMarkupExtractor, TemplateScraper, extract_report_list};
use crate::error::{Error, Result};
use crate::metrics::{LogMetrics, MetricsExtractor};
use crate::models::{ReportDashboard, TpsSummary};
use crate::narrative::{ChatCompletionsClient, Narrative, NarrativeGenerator, build_prompt, narrate};
use crate::patch::{PatchOutcome, inject_tps_section, patch_summary_file, retitle_report};
use crate::reconcile::{Reconciled, reconcile};
use crate::render::{
    AnalysisPage, RunSection, companion_file_name, project_name, render_analysis_report,
    render_placeholder_report, render_run_report,
};
use crate::utils::{read_file, write_file};

/// Name of the report entry page inside a run's report directory
pub const INDEX_FILE: &str = "index.html";

/// Which source a run's `index.html` was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    /// The tool's own report, retitled and given a TPS section
    ToolReport,
    /// A fallback report rendered from the result log
    ResultLog,
    /// Neither was usable; a "no data" page was written
    Placeholder,
}

/// What [`ReportPipeline::reconcile_run`] wrote
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub index: PathBuf,
    pub source: RunSource,
    pub tps: Option<TpsSummary>,
}

/// What [`ReportPipeline::analyze_summary`] wrote
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// The companion analysis report
    pub report: PathBuf,
    pub patch: PatchOutcome,
    /// Number of run reports linked from the summary
    pub runs: usize,
    /// Whether the narrative is the local placeholder
    pub placeholder: bool,
}

/// Builder for post-processing load-test output
pub struct ReportPipeline<'a, E = TemplateScraper, G = ChatCompletionsClient> {
    config: &'a Config,
    metrics: MetricsExtractor,
    extractor: E,
    generator: Option<G>,
}

impl<'a> ReportPipeline<'a> {
    /// Create a pipeline with the stock report scraper and no narrative
    /// service
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            metrics: MetricsExtractor::new(&config.metrics),
            extractor: TemplateScraper,
            generator: None,
        }
    }
}

impl<'a, E, G> ReportPipeline<'a, E, G>
where
    E: ReportMarkupExtractor,
    G: NarrativeGenerator,
{
    /// Use a different report markup extractor
    pub fn extractor<X: ReportMarkupExtractor>(self, extractor: X) -> ReportPipeline<'a, X, G> {
        ReportPipeline {
            config: self.config,
            metrics: self.metrics,
            extractor,
            generator: self.generator,
        }
    }

    /// Set the narrative service
    pub fn generator<N: NarrativeGenerator>(self, generator: N) -> ReportPipeline<'a, E, N> {
        ReportPipeline {
            config: self.config,
            metrics: self.metrics,
            extractor: self.extractor,
            generator: Some(generator),
        }
    }

    /// Make sure `report_dir` holds an `index.html` for the run.
    ///
    /// The tool's report is kept when it has statistics. Otherwise a report
    /// is rendered from `result_log`, and when that yields nothing either a
    /// "no data" page is written, so every run ends up with an artifact.
    pub fn reconcile_run(
        &self,
        report_dir: &Path,
        result_log: Option<&Path>,
        name: &str,
    ) -> Result<RunOutcome> {
        let index = report_dir.join(INDEX_FILE);
        let metrics = result_log.and_then(|log| self.log_metrics(log));
        let dashboard = self.tool_dashboard(&index);

        let reconciled = reconcile(dashboard, metrics);
        info!(run = name, source = %reconciled, "Reconciled run");

        let (html, source, tps) = match reconciled {
            Reconciled::ToolReport { tps, .. } => {
                let html = retitle_report(&read_file(&index)?, name);
                let tps = tps.or_else(|| {
                    TpsSummary::from_rendered_html(&html, self.fallback_duration())
                });
                let html = match &tps {
                    Some(tps) => inject_tps_section(&html, tps),
                    None => html,
                };
                (html, RunSource::ToolReport, tps)
            }
            Reconciled::Computed(metrics) => {
                let log_size = fs::metadata(&metrics.source).ok().map(|m| m.len());
                let html = render_run_report(&metrics, name, log_size, Local::now());
                (html, RunSource::ResultLog, Some(metrics.tps))
            }
            Reconciled::Placeholder => {
                let reason = match result_log {
                    Some(log) => format!(
                        "Neither the tool report nor the result log {} contained usable samples.",
                        log.display()
                    ),
                    None => "The tool report was missing or empty and no result log was given."
                        .to_string(),
                };
                let html = render_placeholder_report(name, &reason, Local::now());
                (html, RunSource::Placeholder, None)
            }
        };

        write_file(&index, &html)?;
        info!(path = %index.display(), ?source, "Wrote run report");

        Ok(RunOutcome { index, source, tps })
    }

    /// Write an analysis report for every run linked from `summary` and
    /// link it from the summary's analysis card.
    pub async fn analyze_summary(&self, summary: &Path) -> Result<AnalysisOutcome> {
        let html = read_file(summary)?;
        let summary_dir = summary.parent().unwrap_or_else(|| Path::new("."));
        let summary_name = summary
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::NoData {
                path: summary.to_path_buf(),
            })?;

        let reports = extract_report_list(&html, summary_dir);
        info!(summary = summary_name, reports = reports.len(), "Analyzing summary");

        let runs: Vec<RunSection> = reports
            .iter()
            .map(|report| {
                let dashboard = self.tool_dashboard(&report.path);
                let metrics = self
                    .result_log_for(&report.name)
                    .and_then(|log| self.log_metrics(&log));
                let mut section = reconcile(dashboard, metrics).into_run_section(&report.name);
                if section.tps.is_none() && section.dashboard.has_statistics() {
                    section.tps = read_file(&report.path)
                        .ok()
                        .and_then(|h| TpsSummary::from_rendered_html(&h, self.fallback_duration()));
                }
                section
            })
            .collect();

        let narrative = if runs.is_empty() {
            warn!(summary = summary_name, "Summary links no run reports, skipping narrative service");
            Narrative::placeholder()
        } else {
            let request = build_prompt(summary_name, &runs, &self.config.ai);
            narrate(
                self.generator.as_ref(),
                &request,
                &self.config.ai.retry,
                Duration::from_secs(self.config.ai.timeout_secs),
            )
            .await
        };

        let project = project_name(summary_name);
        let companion = companion_file_name(summary_name, Local::now());
        let source = self.narrative_source();
        let page = AnalysisPage {
            project: &project,
            summary_name,
            generated_at: Local::now(),
            source: &source,
            narrative: &narrative.text,
            placeholder: narrative.placeholder,
            runs: &runs,
        };
        let rendered = render_analysis_report(&page);

        let report = summary_dir.join(&companion);
        write_file(&report, &rendered)?;
        info!(path = %report.display(), placeholder = narrative.placeholder, "Wrote analysis report");

        let patch = patch_summary_file(summary, &companion)?;

        Ok(AnalysisOutcome {
            report,
            patch,
            runs: runs.len(),
            placeholder: narrative.placeholder,
        })
    }

    fn log_metrics(&self, log: &Path) -> Option<LogMetrics> {
        match self.metrics.extract(log) {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(path = %log.display(), error = %e, "Result log unreadable");
                None
            }
        }
    }

    fn tool_dashboard(&self, index: &Path) -> Option<ReportDashboard> {
        if !index.is_file() {
            info!(path = %index.display(), "No tool report");
            return None;
        }
        match self.extractor.extract(index) {
            Ok(dashboard) => Some(dashboard),
            Err(e) => {
                warn!(path = %index.display(), error = %e, "Tool report unreadable");
                None
            }
        }
    }

    /// The result log a run left in the platform's results directory
    fn result_log_for(&self, run: &str) -> Option<PathBuf> {
        let platform = &self.config.platform;
        let path = platform
            .results_dir
            .join(format!("{run}.{}", platform.result_extension));
        path.is_file().then_some(path)
    }

    fn fallback_duration(&self) -> f64 {
        self.config.report.fallback_duration_secs as f64
    }

    fn narrative_source(&self) -> String {
        if self.generator.is_none() {
            return String::new();
        }
        self.config
            .selected_provider()
            .map(|p| format!("{}/{}", self.config.ai.provider, p.model))
            .unwrap_or_else(|_| self.config.ai.provider.clone())
    }
}
