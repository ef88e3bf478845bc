//! Choosing between the tool's report and our own figures.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::metrics::LogMetrics;
use crate::models::{ReportDashboard, TpsSummary};
use crate::render::RunSection;

const NUMBER: &str = r"(\d{1,3}(?:,\d{3})+|\d+)";

static PAGES_OVERVIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h3>\s*Pages Overview\s*</h3>.*?<table[^>]*>(.*?)</table>")
        .expect("valid regex")
});
static SECOND_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)<tr[^>]*>\s*<td[^>]*>.*?</td>\s*<td[^>]*>\s*{NUMBER}\s*</td>"
    ))
    .expect("valid regex")
});
static SUMMARY_FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)<h3>\s*Summary\s*</h3>.*?<tr[^>]*>.*?<td[^>]*>\s*{NUMBER}\s*</td>"
    ))
    .expect("valid regex")
});
static NUMERIC_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)<td[^>]*>\s*{NUMBER}\s*</td>")).expect("valid regex")
});

/// Cell values outside this range are not taken for request counts when
/// summing loose table cells
const PLAUSIBLE_REQUESTS: std::ops::RangeInclusive<u64> = 1_000..=100_000;

/// The authoritative figures for one run
#[derive(Debug, Clone)]
pub enum Reconciled {
    /// The tool's own report had statistics. `tps` comes from the result
    /// log when it could be read.
    ToolReport {
        dashboard: ReportDashboard,
        tps: Option<TpsSummary>,
    },
    /// Figures computed from the result log
    Computed(LogMetrics),
    /// Nothing usable on either side
    Placeholder,
}

impl Reconciled {
    /// Metrics section for the analysis report
    pub fn into_run_section(self, name: impl Into<String>) -> RunSection {
        let name = name.into();
        match self {
            Reconciled::ToolReport { dashboard, tps } => RunSection {
                name,
                dashboard,
                tps,
            },
            Reconciled::Computed(metrics) => RunSection {
                name,
                dashboard: metrics.to_dashboard(),
                tps: Some(metrics.tps),
            },
            Reconciled::Placeholder => RunSection {
                name,
                ..RunSection::default()
            },
        }
    }
}

impl fmt::Display for Reconciled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciled::ToolReport { .. } => f.write_str("tool report"),
            Reconciled::Computed(_) => f.write_str("result log"),
            Reconciled::Placeholder => f.write_str("placeholder"),
        }
    }
}

/// Pick the authoritative source for a run: the tool's report when it has
/// statistics, else computed metrics, else a placeholder.
pub fn reconcile(dashboard: Option<ReportDashboard>, metrics: Option<LogMetrics>) -> Reconciled {
    let dashboard = dashboard.filter(|d| {
        let usable = d.has_statistics();
        if !usable {
            debug!("Tool report has no statistics table");
        }
        usable
    });

    match (dashboard, metrics) {
        (Some(dashboard), metrics) => {
            info!(
                rows = dashboard.statistics.rows.len(),
                with_log = metrics.is_some(),
                "Using tool report"
            );
            Reconciled::ToolReport {
                dashboard,
                tps: metrics.map(|m| m.tps),
            }
        }
        (None, Some(metrics)) => {
            info!(
                path = %metrics.source.display(),
                samples = metrics.total.sample_count,
                "Using metrics computed from result log"
            );
            Reconciled::Computed(metrics)
        }
        (None, None) => {
            warn!("Neither a tool report nor a result log yielded data");
            Reconciled::Placeholder
        }
    }
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace(',', "").parse().ok()
}

fn total_requests_from_html(html: &str) -> Option<u64> {
    let from_pages: u64 = PAGES_OVERVIEW
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|table| {
            SECOND_COLUMN
                .captures_iter(table.as_str())
                .filter_map(|c| parse_count(&c[1]))
                .sum()
        })
        .unwrap_or(0);
    if from_pages > 0 {
        debug!(total = from_pages, "Request count from Pages Overview");
        return Some(from_pages);
    }

    if let Some(total) = SUMMARY_FIRST_NUMBER
        .captures(html)
        .and_then(|c| parse_count(&c[1]))
        .filter(|&n| n > 0)
    {
        debug!(total, "Request count from Summary table");
        return Some(total);
    }

    let loose: u64 = NUMERIC_CELL
        .captures_iter(html)
        .filter_map(|c| parse_count(&c[1]))
        .filter(|n| PLAUSIBLE_REQUESTS.contains(n))
        .sum();
    if loose > 0 {
        debug!(total = loose, "Request count from loose table cells");
        return Some(loose);
    }

    None
}

impl TpsSummary {
    /// Estimate throughput from an already rendered report.
    ///
    /// Only for when the result log cannot be read: the request count is
    /// scraped from table cells and the duration is supplied by the caller,
    /// so peak and minimum are rough guesses. The result is marked
    /// `estimated`. Returns `None` when no request count can be found.
    pub fn from_rendered_html(html: &str, duration_secs: f64) -> Option<Self> {
        let total_requests = total_requests_from_html(html)?;
        let average_tps = if duration_secs > 0.0 {
            total_requests as f64 / duration_secs
        } else {
            0.0
        };

        warn!(
            total_requests,
            duration_secs, average_tps, "TPS estimated from rendered report"
        );

        Some(Self {
            total_requests,
            test_duration_seconds: duration_secs.max(0.0),
            average_tps,
            peak_tps: average_tps * 1.5,
            min_tps: average_tps * 0.5,
            start_time: "n/a".to_string(),
            end_time: "n/a".to_string(),
            estimated: true,
            ..Self::default()
        })
    }
}
