use chrono::{DateTime, Local};

use super::{data_table, html_escape, key_value_table, markdown_to_html};
use crate::metrics::{LabelAggregate, LogMetrics};
use crate::models::{ReportDashboard, TpsSummary};
use crate::utils::{TIME_FORMAT, format_size};

/// Comment that opens every rendered TPS block
pub const TPS_SECTION_MARKER: &str = "<!-- arquebus:tps -->";

const STYLE: &str = r#"
        body { font-family: Arial, 'Microsoft YaHei', sans-serif; margin: 0; background: #f5f5f5; color: #333; }
        .container { max-width: 1200px; margin: 0 auto; background: #fff; padding: 0 0 30px; box-shadow: 0 0 20px rgba(0,0,0,0.1); }
        .header { background: #333; color: #fff; padding: 32px 40px; }
        .header h1 { margin: 0; font-size: 30px; }
        .info { background: #f8f9fa; padding: 16px 40px; border-bottom: 1px solid #e9ecef; }
        .info span { margin-right: 24px; }
        .section { padding: 10px 40px; }
        .notice { background: #fff3cd; border-left: 4px solid #ffc107; padding: 12px 16px; }
        table { border-collapse: collapse; width: 100%; margin: 12px 0 20px; font-size: 14px; }
        th, td { border: 1px solid #ddd; padding: 6px 8px; text-align: left; }
        th { background: #f2f2f2; }
        table.kv th { width: 30%; }
        tr:nth-child(even) td { background: #fafafa; }
        td.error { color: #dc3545; }
        td.success { color: #28a745; }
        pre { background: #f4f4f4; padding: 12px; overflow-x: auto; }
        blockquote { border-left: 4px solid #ccc; margin: 0; padding-left: 12px; color: #666; }
        .footer { padding: 10px 40px; color: #999; font-size: 13px; }
    "#;

/// Metrics of one run shown beneath the narrative
#[derive(Debug, Clone, Default)]
pub struct RunSection {
    pub name: String,
    pub dashboard: ReportDashboard,
    pub tps: Option<TpsSummary>,
}

/// Everything the companion analysis report displays
#[derive(Debug, Clone)]
pub struct AnalysisPage<'a> {
    pub project: &'a str,
    /// File name of the summary the report accompanies, used for the back link
    pub summary_name: &'a str,
    pub generated_at: DateTime<Local>,
    /// `provider/model`, or empty when no service was asked
    pub source: &'a str,
    /// Markdown-like narrative text
    pub narrative: &'a str,
    pub placeholder: bool,
    pub runs: &'a [RunSection],
}

/// Render the companion analysis report
pub fn render_analysis_report(page: &AnalysisPage<'_>) -> String {
    let title = html_escape(&format!("{} - Performance Analysis", page.project));
    let summary = html_escape(page.summary_name);
    let generated = page.generated_at.format(TIME_FORMAT).to_string();
    let source = if page.placeholder || page.source.is_empty() {
        "local placeholder".to_string()
    } else {
        html_escape(page.source)
    };
    let notice = if page.placeholder {
        r#"<p class="notice">The narrative service was unavailable; the analysis below is a placeholder. The metrics that follow are complete.</p>"#
    } else {
        ""
    };
    let narrative = markdown_to_html(page.narrative);
    let runs: String = page.runs.iter().map(run_section).collect();
    let style = STYLE;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
<div class="container">
    <div class="header"><h1>{title}</h1></div>
    <div class="info">
        <span><strong>Generated:</strong> {generated}</span>
        <span><strong>Summary:</strong> <a href="{summary}">{summary}</a></span>
        <span><strong>Narrative:</strong> {source}</span>
    </div>
    <div class="section">
        <h2>Analysis</h2>
        {notice}
        <div class="analysis">
{narrative}
        </div>
    </div>
    <div class="section">
        <h2>Detailed metrics</h2>
{runs}
    </div>
    <div class="footer"><a href="{summary}">Back to summary</a></div>
</div>
</body>
</html>
"#
    )
}

fn run_section(run: &RunSection) -> String {
    let name = html_escape(&run.name);
    let dashboard = &run.dashboard;
    let mut body = String::new();

    if !dashboard.test_info.is_empty() {
        body.push_str(&key_value_table(&dashboard.test_info));
    }
    if let Some(score) = &dashboard.apdex.score {
        let level = dashboard.apdex.level.as_deref().unwrap_or("n/a");
        body.push_str(&format!(
            "<p><strong>APDEX:</strong> {} ({})</p>",
            html_escape(score),
            html_escape(level)
        ));
    }
    if dashboard.has_statistics() {
        body.push_str("<h4>Statistics</h4>");
        body.push_str(&data_table(&dashboard.statistics));
    } else {
        body.push_str("<p>No statistics were available for this run.</p>");
    }
    if !dashboard.errors.is_empty() {
        body.push_str("<h4>Errors</h4>");
        body.push_str(&data_table(&dashboard.errors));
    }
    if !dashboard.top_errors.is_empty() {
        body.push_str("<h4>Top errors by sampler</h4>");
        body.push_str(&data_table(&dashboard.top_errors));
    }
    if let Some(tps) = &run.tps {
        body.push_str(&render_tps_section(tps));
    }

    format!("        <h3>{name}</h3>\n        {body}\n")
}

/// Render the TPS block, opened by [`TPS_SECTION_MARKER`]
pub fn render_tps_section(tps: &TpsSummary) -> String {
    let total = group_thousands(tps.total_requests);
    let duration = format!("{:.2}", tps.test_duration_seconds);
    let average = format!("{:.2}", tps.average_tps);
    let peak = format!("{:.2}", tps.peak_tps);
    let min = format!("{:.2}", tps.min_tps);
    let start = html_escape(&tps.start_time);
    let end = html_escape(&tps.end_time);
    let estimated = if tps.estimated {
        " (estimated from the rendered report)"
    } else {
        ""
    };
    let cell = "padding: 8px; border-bottom: 1px solid #ddd;";

    format!(
        r#"{TPS_SECTION_MARKER}
<div style="margin: 20px 0; padding: 15px; background-color: #f8f9fa; border-left: 4px solid #007bff;">
    <h3 style="color: #007bff; margin-top: 0;">TPS (Transactions Per Second){estimated}</h3>
    <table style="width: 100%; border-collapse: collapse;">
        <tr><th style="text-align: left; {cell}">Metric</th><th style="text-align: left; {cell}">Value</th></tr>
        <tr><td style="{cell}">Total requests</td><td style="{cell}">{total}</td></tr>
        <tr><td style="{cell}">Test duration</td><td style="{cell}">{duration} s</td></tr>
        <tr><td style="{cell}">Average TPS</td><td style="{cell}">{average}</td></tr>
        <tr><td style="{cell}">Peak TPS</td><td style="{cell}">{peak}</td></tr>
        <tr><td style="{cell}">Minimum TPS</td><td style="{cell}">{min}</td></tr>
    </table>
    <p style="margin-top: 10px; font-size: 0.9em; color: #666;">Time range: {start} - {end}</p>
</div>
"#
    )
}

/// Render a self-contained run report from computed metrics, for runs
/// whose tool report is missing or empty
pub fn render_run_report(
    metrics: &LogMetrics,
    test_name: &str,
    log_size: Option<u64>,
    generated_at: DateTime<Local>,
) -> String {
    let title = html_escape(&format!("{test_name} - Load Test Report"));
    let name = html_escape(test_name);
    let generated = generated_at.format(TIME_FORMAT).to_string();
    let log_name = metrics
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| metrics.source.display().to_string());
    let log_name = html_escape(&log_name);
    let log_size = log_size.map(format_size).unwrap_or_else(|| "n/a".to_string());
    let total = group_thousands(metrics.total.sample_count);
    let overall_tps = format!("{:.2}", metrics.total.tps);
    let excluded = metrics.skipped_records + metrics.bad_timestamps;

    let label_rows: String = metrics.labels.values().map(label_row).collect();
    let total_row = label_row(&metrics.total);
    let code_tables: String = metrics
        .labels
        .values()
        .map(|aggregate| {
            let rows: String = aggregate
                .response_codes
                .iter()
                .map(|(code, counts)| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                        html_escape(code),
                        counts.success,
                        counts.error
                    )
                })
                .collect();
            format!(
                "<h3>{}</h3><table><tr><th>Response code</th><th>Success</th><th>Error</th></tr>{rows}</table>\n",
                html_escape(&aggregate.label)
            )
        })
        .collect();
    let tps = render_tps_section(&metrics.tps);
    let style = STYLE;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
<div class="container">
    <div class="header"><h1>{title}</h1></div>
    <div class="info">
        <p><strong>Test name:</strong> {name}</p>
        <p><strong>Generated:</strong> {generated}</p>
        <p><strong>Result log:</strong> {log_name} ({log_size})</p>
        <p><strong>Transactions:</strong> {total}</p>
        <p><strong>Overall TPS:</strong> {overall_tps} transactions/s</p>
        <p><strong>Excluded records:</strong> {excluded}</p>
    </div>
    <div class="section">
        <h2>Response times</h2>
        <table>
            <tr><th>Label</th><th>Samples</th><th>Errors</th><th>Error %</th><th>Total response time (s)</th><th>Active duration (s)</th><th>Mean (ms)</th><th>Median (ms)</th><th>Min (ms)</th><th>Max (ms)</th><th>90th pct (ms)</th><th>95th pct (ms)</th><th>99th pct (ms)</th><th>TPS</th></tr>
{label_rows}{total_row}
        </table>
{tps}
        <h2>Response codes</h2>
{code_tables}
    </div>
    <div class="footer">Fallback report computed from the result log. TPS is samples divided by the active duration of each label.</div>
</div>
</body>
</html>
"#
    )
}

fn label_row(aggregate: &LabelAggregate) -> String {
    let status = |failing: bool| if failing { "error" } else { "success" };
    let latency = &aggregate.latency;
    format!(
        "            <tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td class=\"{}\">{:.2}%</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>\n",
        html_escape(&aggregate.label),
        aggregate.sample_count,
        status(aggregate.error_count > 0),
        aggregate.error_count,
        status(aggregate.error_count > 0),
        aggregate.error_rate_percent(),
        aggregate.total_elapsed_ms / 1000.0,
        aggregate.active_duration_seconds,
        latency.mean,
        latency.median,
        latency.min,
        latency.max,
        latency.p90,
        latency.p95,
        latency.p99,
        aggregate.tps,
    )
}

/// Render the artifact written when a run produced no usable data at all
pub fn render_placeholder_report(
    test_name: &str,
    reason: &str,
    generated_at: DateTime<Local>,
) -> String {
    let title = html_escape(&format!("{test_name} - Load Test Report"));
    let reason = html_escape(reason);
    let generated = generated_at.format(TIME_FORMAT).to_string();
    let style = STYLE;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
<div class="container">
    <div class="header"><h1>{title}</h1></div>
    <div class="section">
        <p class="notice"><strong>No data available.</strong> {reason}</p>
        <p>Generated: {generated}</p>
    </div>
</div>
</body>
</html>
"#
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
