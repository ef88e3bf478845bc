//! Report markup extraction.
//!
//! JMeter's HTML dashboard is a fixed template: an `index.html` with
//! heading-delimited panels, plus a `content/js/dashboard.js` whose
//! `createTable(...)` calls carry the statistics, errors and APDEX tables as
//! JavaScript object literals. Neither file is parsed properly. Sections are
//! located by heading text and the script is scanned for known keys, which
//! is enough for this one template and degrades section by section when
//! the markup drifts.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{Apdex, DataTable, ReportDashboard, ReportRef};
use crate::utils::read_file;

pub const TEST_INFO_HEADING: &str = "Test and Report information";
pub const APDEX_HEADING: &str = "APDEX";
pub const STATISTICS_HEADING: &str = "Statistics";
pub const ERRORS_HEADING: &str = "Errors";
pub const TOP_ERRORS_HEADING: &str = "Top 5 Errors by sampler";

const APDEX_ANCHOR: &str = "#apdexTable";
const STATISTICS_ANCHOR: &str = "#statisticsTable";
const ERRORS_ANCHOR: &str = "#errorsTable";
const TOP_ERRORS_ANCHOR: &str = "#top5ErrorsBySamplerTable";

/// Link captions a summary page uses for its per-run reports
const REPORT_LINK_CAPTIONS: [&str; 2] = ["查看详细报告", "view detailed report"];

static TR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid regex"));
static TH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<th[^>]*>(.*?)</th>").expect("valid regex"));
static TD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static GENERAL_INFOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table[^>]*id="generalInfos"[^>]*>(.*?)</table>"#).expect("valid regex")
});
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[1-6][^>]*>\s*([^<]*)</h[1-6]>").expect("valid regex"));
static DIV_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</div>").expect("valid regex"));
static DASHBOARD_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script[^>]*\ssrc="([^"]*dashboard\.js)""#).expect("valid regex")
});
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]+)"[^>]*>(.*?)</a>"#).expect("valid regex")
});

/// Recovers a [`ReportDashboard`] from a generated report.
///
/// Implementations must not fail on missing or malformed sections; only an
/// unreadable report file is an error.
pub trait ReportMarkupExtractor {
    fn extract(&self, index_html: &Path) -> Result<ReportDashboard>;
}

/// Best-effort scraper for the JMeter dashboard template
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateScraper;

impl ReportMarkupExtractor for TemplateScraper {
    fn extract(&self, index_html: &Path) -> Result<ReportDashboard> {
        let html = read_file(index_html)?;

        let script = dashboard_script_path(&html, index_html).and_then(|path| {
            match read_file(&path) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Dashboard script unreadable, using HTML only");
                    None
                }
            }
        });

        let dashboard = parse_report(&html, script.as_deref());
        info!(
            path = %index_html.display(),
            statistics_rows = dashboard.statistics.rows.len(),
            error_rows = dashboard.errors.rows.len(),
            apdex = dashboard.apdex.score.as_deref().unwrap_or("-"),
            "Extracted report dashboard"
        );
        Ok(dashboard)
    }
}

fn dashboard_script_path(html: &str, index_html: &Path) -> Option<PathBuf> {
    let src = DASHBOARD_SCRIPT.captures(html)?.get(1)?.as_str();
    let base = index_html.parent().unwrap_or_else(|| Path::new("."));
    Some(base.join(src))
}

/// Build a dashboard from report markup and, when available, the script
/// holding its table data. Script tables win over HTML tables when both
/// are present and non-empty.
pub fn parse_report(html: &str, script: Option<&str>) -> ReportDashboard {
    let mut dashboard = ReportDashboard {
        test_info: test_info(html),
        ..ReportDashboard::default()
    };

    let section_table = |heading: &str| section(html, heading).map(html_table).unwrap_or_default();
    let script_table = |anchor: &str| {
        script
            .and_then(|js| ScriptTable::scan(js, anchor))
            .map(ScriptTable::into_data_table)
            .filter(|table| !table.is_empty())
    };

    dashboard.statistics =
        script_table(STATISTICS_ANCHOR).unwrap_or_else(|| section_table(STATISTICS_HEADING));
    dashboard.errors = script_table(ERRORS_ANCHOR).unwrap_or_else(|| section_table(ERRORS_HEADING));
    dashboard.top_errors =
        script_table(TOP_ERRORS_ANCHOR).unwrap_or_else(|| section_table(TOP_ERRORS_HEADING));

    let score = script
        .and_then(|js| ScriptTable::scan(js, APDEX_ANCHOR))
        .and_then(|table| table.first_value())
        .or_else(|| section(html, APDEX_HEADING).and_then(|s| html_apdex_score(&html_table(s))));

    let level = score
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|s| apdex_level(s).to_string());
    dashboard.apdex = Apdex { score, level };

    dashboard
}

/// Rating band for an APDEX score
pub fn apdex_level(score: f64) -> &'static str {
    if score >= 0.94 {
        "Excellent"
    } else if score >= 0.85 {
        "Good"
    } else if score >= 0.70 {
        "Fair"
    } else if score >= 0.50 {
        "Poor"
    } else {
        "Unacceptable"
    }
}

/// Markup between a heading and the next closing `</div>`
fn section<'a>(html: &'a str, heading: &str) -> Option<&'a str> {
    let wanted = heading.to_lowercase();
    let found = HEADING
        .captures_iter(html)
        .find(|c| c[1].to_lowercase().starts_with(&wanted))
        .and_then(|c| c.get(0))
        .and_then(|m| {
            let rest = &html[m.end()..];
            DIV_CLOSE.find(rest).map(|end| &rest[..end.start()])
        });
    if found.is_none() {
        debug!(heading, "Section not found");
    }
    found
}

fn test_info(html: &str) -> Vec<(String, String)> {
    let Some(body) = section(html, TEST_INFO_HEADING)
        .or_else(|| GENERAL_INFOS.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str()))
    else {
        return Vec::new();
    };

    TR.captures_iter(body)
        .filter_map(|row| {
            let cells: Vec<String> = TD
                .captures_iter(&row[1])
                .map(|cell| cell_text(&cell[1]))
                .collect();
            match cells.as_slice() {
                [key, value, ..] if !key.is_empty() => {
                    Some((key.clone(), value.replace('"', "")))
                }
                _ => None,
            }
        })
        .collect()
}

fn html_table(markup: &str) -> DataTable {
    let headers: Vec<String> = TH
        .captures_iter(markup)
        .map(|cell| cell_text(&cell[1]))
        .collect();
    let mut table = DataTable::with_headers(headers);

    for row in TR.captures_iter(markup) {
        let cells: Vec<String> = TD
            .captures_iter(&row[1])
            .map(|cell| cell_text(&cell[1]))
            .collect();
        if !cells.is_empty() && !table.push_row(cells) {
            debug!("Dropping table row with mismatched cell count");
        }
    }
    table
}

fn html_apdex_score(table: &DataTable) -> Option<String> {
    table
        .get(0, "Apdex")
        .map(str::to_string)
        .or_else(|| {
            table.rows.first()?.iter().find_map(|cell| {
                let value = cell.parse::<f64>().ok()?;
                (0.0..=1.0).contains(&value).then(|| cell.clone())
            })
        })
}

fn cell_text(markup: &str) -> String {
    let text = TAG.replace_all(markup, " ");
    let text = decode_entities(&text);
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Decode the handful of entities the report template emits
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// One `createTable(...)` literal recovered from the dashboard script
#[derive(Debug, Clone, Default, PartialEq)]
struct ScriptTable {
    titles: Vec<String>,
    overall: Option<Vec<String>>,
    items: Vec<Vec<String>>,
}

impl ScriptTable {
    /// Locate the table literal following `anchor`. The scan is bounded by
    /// the next `createTable(` call so keys of neighbouring tables are never
    /// picked up.
    fn scan(js: &str, anchor: &str) -> Option<Self> {
        js.match_indices(anchor).find_map(|(start, _)| {
            let rest = &js[start + anchor.len()..];
            let end = rest.find("createTable(").unwrap_or(rest.len());
            Self::scan_slice(&rest[..end])
        })
    }

    fn scan_slice(slice: &str) -> Option<Self> {
        let (titles, _) = array_after(slice, "titles")?;
        let titles = split_values(titles);

        let overall = slice
            .find("\"overall\"")
            .and_then(|pos| array_after(&slice[pos..], "data"))
            .map(|(inner, _)| split_values(inner));

        let mut items = Vec::new();
        if let Some((mut rest, _)) = array_after(slice, "items") {
            while let Some((inner, close)) = array_after(rest, "data") {
                items.push(split_values(inner));
                rest = &rest[close + 1..];
            }
        }

        Some(Self {
            titles,
            overall,
            items,
        })
    }

    fn first_value(self) -> Option<String> {
        self.overall
            .into_iter()
            .chain(self.items)
            .find_map(|row| row.into_iter().next())
            .filter(|value| !value.is_empty())
    }

    fn into_data_table(self) -> DataTable {
        let mut table = DataTable::with_headers(self.titles);
        let mut dropped = 0usize;
        for row in self.overall.into_iter().chain(self.items) {
            if !table.push_row(row) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, "Dropped script rows with mismatched arity");
        }
        table
    }
}

/// Find `"key"` in `text`, then the bracketed array after it. Returns the
/// array's inner text and the byte offset of its closing bracket.
fn array_after<'a>(text: &'a str, key: &str) -> Option<(&'a str, usize)> {
    let key_pos = text.find(&format!("\"{key}\""))?;
    let open = key_pos + text[key_pos..].find('[')?;
    let close = matching_bracket(text, open)?;
    Some((&text[open + 1..close], close))
}

/// Offset of the `]` closing the `[` at `open`, skipping brackets inside
/// string literals
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split an array body on top-level commas. String entries lose their
/// quotes, `null` becomes an empty cell, numbers keep their text.
fn split_values(inner: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for ch in inner.chars() {
        if in_string {
            current.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => values.push(literal_value(&std::mem::take(&mut current))),
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() || !values.is_empty() {
        values.push(literal_value(&current));
    }
    values
}

fn literal_value(token: &str) -> String {
    let token = token.trim();
    if token == "null" {
        return String::new();
    }
    match token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(body) => unescape_js(body),
        None => token.to_string(),
    }
}

fn unescape_js(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('r') | Some('t') => out.push(' '),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Collect the per-run reports a summary page links to.
///
/// Links are matched by their caption, resolved against `summary_dir`, and
/// kept only when the target exists. Each run is named after the directory
/// holding its report.
pub fn extract_report_list(summary_html: &str, summary_dir: &Path) -> Vec<ReportRef> {
    let mut reports = Vec::new();

    for link in ANCHOR.captures_iter(summary_html) {
        let caption = cell_text(&link[2]).to_lowercase();
        if !REPORT_LINK_CAPTIONS.contains(&caption.as_str()) {
            continue;
        }

        let href = decode_entities(&link[1]);
        let path = summary_dir.join(&href);
        if !path.exists() {
            warn!(path = %path.display(), "Linked report does not exist, skipping");
            continue;
        }

        let name = path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| href.clone());
        reports.push(ReportRef {
            name,
            path,
            link: href,
        });
    }

    info!(count = reports.len(), "Extracted report list from summary");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Apache JMeter Dashboard</title></head>
<body>
<div class="panel">
  <h2>Test and Report information</h2>
  <table class="table" id="generalInfos">
    <tr><td>Source file</td><td>"result.jtl"</td></tr>
    <tr><td>Start Time</td><td>"3/1/24, 10:00 AM"</td></tr>
    <tr><td>End Time</td><td>"3/1/24, 10:05 AM"</td></tr>
    <tr><td>Filter for display</td><td>""</td></tr>
  </table>
</div>
<div class="panel">
  <h2>APDEX (Application Performance Index)</h2>
  <table id="apdexTable"><thead><tr><th>Apdex</th><th>Label</th></tr></thead></table>
</div>
<div class="panel">
  <h2>Statistics</h2>
  <table id="statisticsTable"><thead><tr><th>Label</th><th>#Samples</th></tr></thead></table>
</div>
<div class="panel">
  <h2>Errors</h2>
  <table id="errorsTable"><thead><tr><th>Type of error</th><th>Number of errors</th></tr></thead></table>
</div>
<script src="content/js/dashboard.js"></script>
</body>
</html>"#;

    const DASHBOARD_JS: &str = r##"
$(document).ready(function() {
    // Create statistics table
    createTable($("#apdexTable"), {"supportsControllersDiscrimination": true, "overall": {"data": [0.912, 500, 1500, "Total"], "isController": false}, "titles": ["Apdex", "T (Toleration threshold)", "F (Frustration threshold)", "Label"], "items": [{"data": [0.95, 500, 1500, "login"], "isController": false}]}, function(index, item){ return item; }, [[0, 0]], 3);

    createTable($("#statisticsTable"), {"supportsControllersDiscrimination": true, "overall": {"data": ["Total", 300, 3, 1.0, 120.5, 12, 950, 110.0, 200.0, 250.0, 400.0, 10.0, 55.1, 3.2], "isController": false}, "titles": ["Label", "#Samples", "FAIL", "Error %", "Average", "Min", "Max", "Median", "90th pct", "95th pct", "99th pct", "Transactions/s", "Received", "Sent"], "items": [{"data": ["login", 150, 0, 0.0, 100.1, 12, 500, 90.0, 180.0, 220.0, 300.0, 5.0, 30.2, 1.6], "isController": false}, {"data": ["search, advanced", 150, 3, 2.0, 140.9, 20, 950, 130.0, 210.0, 260.0, 420.0, 5.0, 24.9, 1.6], "isController": false}, {"data": ["broken", 1], "isController": false}]}, function(index, item){
        return item;
    }, [[0, 0]], 0, summaryTableHeader);

    createTable($("#errorsTable"), {"supportsControllersDiscrimination": false, "titles": ["Type of error", "Number of errors", "% in errors", "% in all samples"], "items": [{"data": ["500/Internal Server Error", 2, 66.66666666666667, 0.6666666666666666], "isController": false}, {"data": ["Non HTTP response code: java.net.SocketException/Non HTTP response message: Connection reset \"by peer\"", 1, 33.333333333333336, 0.3333333333333333], "isController": false}]}, function(index, item){ return item; }, [[1, 1]]);

    createTable($("#top5ErrorsBySamplerTable"), {"supportsControllersDiscrimination": false, "overall": {"data": ["Total", 300, 3, "500/Internal Server Error", 2, "Non HTTP response code: java.net.SocketException", 1, null, null, null, null, null, null], "isController": false}, "titles": ["Sample", "#Samples", "#Errors", "Error", "#Errors", "Error", "#Errors", "Error", "#Errors", "Error", "#Errors", "Error", "#Errors"], "items": [{"data": ["search, advanced", 150, 3, "500/Internal Server Error", 2, "Non HTTP response code: java.net.SocketException", 1, null, null, null, null, null, null], "isController": false}]}, function(index, item){ return item; }, [[0, 0]], 0);
});
"##;

    #[test]
    fn test_test_info_in_document_order() {
        let dashboard = parse_report(INDEX_HTML, None);
        let keys: Vec<&str> = dashboard.test_info.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["Source file", "Start Time", "End Time", "Filter for display"]);
        assert_eq!(dashboard.info("Source file"), Some("result.jtl"));
        assert_eq!(dashboard.info("Filter for display"), Some(""));
    }

    #[test]
    fn test_html_only_has_headers_but_no_statistics() {
        let dashboard = parse_report(INDEX_HTML, None);
        assert_eq!(dashboard.statistics.headers, ["Label", "#Samples"]);
        assert!(!dashboard.has_statistics());
        assert_eq!(dashboard.apdex, Apdex::default());
    }

    #[test]
    fn test_script_tables() {
        let dashboard = parse_report(INDEX_HTML, Some(DASHBOARD_JS));

        assert!(dashboard.has_statistics());
        assert_eq!(dashboard.statistics.headers.len(), 14);
        // overall + two items; the short "broken" row is dropped
        assert_eq!(dashboard.statistics.rows.len(), 3);
        assert_eq!(dashboard.statistics.get(0, "Label"), Some("Total"));
        assert_eq!(dashboard.statistics.get(2, "Label"), Some("search, advanced"));
        assert_eq!(dashboard.statistics.get(2, "99th pct"), Some("420.0"));

        assert_eq!(dashboard.errors.rows.len(), 2);
        assert_eq!(
            dashboard.errors.get(1, "Type of error"),
            Some("Non HTTP response code: java.net.SocketException/Non HTTP response message: Connection reset \"by peer\"")
        );

        assert_eq!(dashboard.top_errors.rows.len(), 2);
        assert_eq!(dashboard.top_errors.rows[1][7], "");
    }

    #[test]
    fn test_every_row_matches_header_arity() {
        let dashboard = parse_report(INDEX_HTML, Some(DASHBOARD_JS));
        for table in [&dashboard.statistics, &dashboard.errors, &dashboard.top_errors] {
            for row in &table.rows {
                assert_eq!(row.len(), table.headers.len());
            }
        }
    }

    #[test]
    fn test_apdex_from_script_with_derived_level() {
        let dashboard = parse_report(INDEX_HTML, Some(DASHBOARD_JS));
        assert_eq!(dashboard.apdex.score.as_deref(), Some("0.912"));
        assert_eq!(dashboard.apdex.level.as_deref(), Some("Good"));
    }

    #[test]
    fn test_apdex_levels() {
        assert_eq!(apdex_level(0.97), "Excellent");
        assert_eq!(apdex_level(0.94), "Excellent");
        assert_eq!(apdex_level(0.86), "Good");
        assert_eq!(apdex_level(0.7), "Fair");
        assert_eq!(apdex_level(0.55), "Poor");
        assert_eq!(apdex_level(0.2), "Unacceptable");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first = parse_report(INDEX_HTML, Some(DASHBOARD_JS));
        let second = parse_report(INDEX_HTML, Some(DASHBOARD_JS));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_sections_yield_empty_dashboard() {
        let dashboard = parse_report("<html><body><p>nothing here</p></body></html>", None);
        assert_eq!(dashboard, ReportDashboard::default());

        let dashboard = parse_report("<html>", Some("var x = 1; createTable($(\"#statisticsTable\"), {\"titles\": [\"Label\""));
        assert!(dashboard.statistics.headers.is_empty());
    }

    #[test]
    fn test_html_statistics_rows_when_rendered() {
        let html = r#"<div><h2>Statistics</h2>
<table><tr><th>Label</th><th>#Samples</th></tr>
<tr><td>login</td><td>10</td></tr>
<tr><td>odd</td></tr>
<tr><td><b>Total</b></td><td>10</td></tr></table></div>"#;
        let dashboard = parse_report(html, None);
        assert_eq!(dashboard.statistics.rows.len(), 2);
        assert_eq!(dashboard.statistics.get(1, "Label"), Some("Total"));
    }

    #[test]
    fn test_section_lookup_by_heading_prefix() {
        let html = "<div><h1>Report</h1><h2>STATISTICS (all)</h2><table><tr><td>1</td></tr></table></div>\
                    <div><h2>Errors</h2><table><tr><td>2</td></tr></table></DIV>";
        assert_eq!(
            section(html, "Statistics"),
            Some("<table><tr><td>1</td></tr></table>")
        );
        assert_eq!(
            section(html, "Errors"),
            Some("<table><tr><td>2</td></tr></table>")
        );
        assert_eq!(section(html, "Top 5 Errors"), None);
    }

    #[test]
    fn test_split_values() {
        assert_eq!(
            split_values(r#""a, b", 1.5, null, "q\"x""#),
            vec!["a, b", "1.5", "", "q\"x"]
        );
        assert!(split_values("").is_empty());
        assert_eq!(split_values(r#""été""#), vec!["été"]);
    }

    #[test]
    fn test_scraper_reads_script_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.html");
        fs::write(&index, INDEX_HTML).unwrap();
        fs::create_dir_all(dir.path().join("content/js")).unwrap();
        fs::write(dir.path().join("content/js/dashboard.js"), DASHBOARD_JS).unwrap();

        let dashboard = TemplateScraper.extract(&index).unwrap();
        assert!(dashboard.has_statistics());
        assert_eq!(dashboard.info("Source file"), Some("result.jtl"));
    }

    #[test]
    fn test_scraper_without_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.html");
        fs::write(&index, INDEX_HTML).unwrap();

        let dashboard = TemplateScraper.extract(&index).unwrap();
        assert!(!dashboard.has_statistics());
        assert_eq!(dashboard.test_info.len(), 4);
    }

    #[test]
    fn test_scraper_missing_report_is_error() {
        assert!(TemplateScraper.extract(Path::new("/nonexistent/index.html")).is_err());
    }

    #[test]
    fn test_extract_report_list() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("login_20240301_100000");
        fs::create_dir(&run).unwrap();
        fs::write(run.join("index.html"), "<html></html>").unwrap();

        let summary = r#"<table>
<tr><td>login</td><td><a href="login_20240301_100000/index.html" target="_blank">查看详细报告</a></td></tr>
<tr><td>gone</td><td><a href="gone_20240301_100000/index.html">查看详细报告</a></td></tr>
<tr><td>other</td><td><a href="login_20240301_100000/index.html">Download</a></td></tr>
<tr><td>en</td><td><a class="btn" href="login_20240301_100000/index.html"> View detailed report </a></td></tr>
</table>"#;

        let reports = extract_report_list(summary, dir.path());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "login_20240301_100000");
        assert_eq!(reports[0].link, "login_20240301_100000/index.html");
        assert_eq!(reports[0].path, run.join("index.html"));
    }
}
