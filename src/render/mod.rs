//! HTML document synthesis.
//!
//! Pages are built from raw-string templates with named slots. Every piece
//! of extracted text passes through [`html_escape`] before it is slotted in.

mod markdown;
mod page;

pub use markdown::markdown_to_html;
pub use page::{
    AnalysisPage, RunSection, TPS_SECTION_MARKER, render_analysis_report,
    render_placeholder_report, render_run_report, render_tps_section,
};

use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::LazyLock;

use crate::models::DataTable;

/// Project name used when a summary file name follows no known convention
pub const FALLBACK_PROJECT_NAME: &str = "Performance Test";

const SUMMARY_INFIX: &str = "_summary_";
const COMPANION_INFIX: &str = "_AIReport_";

static STAMPED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)_(\d{8}_\d{6})\.html$").expect("valid regex")
});

/// Escape text for use in element content and double-quoted attributes
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Derive a project name from a summary file name.
///
/// `shop_summary_20240301_100000.html` yields `shop`; a doubled leading
/// segment (`shop_shop_5_users`) collapses to one. Falls back to
/// [`FALLBACK_PROJECT_NAME`].
pub fn project_name(file_name: &str) -> String {
    let prefix = match file_name.split_once(SUMMARY_INFIX) {
        Some((prefix, _)) => Some(prefix),
        None => STAMPED_NAME
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str()),
    };

    let Some(prefix) = prefix.filter(|p| !p.trim().is_empty()) else {
        return FALLBACK_PROJECT_NAME.to_string();
    };

    let parts: Vec<&str> = prefix.split('_').collect();
    match parts.as_slice() {
        [first, second, ..] if first == second && !first.is_empty() => first.to_string(),
        _ => prefix.to_string(),
    }
}

/// File name of the analysis report that accompanies a summary
pub fn companion_file_name(summary_file_name: &str, now: DateTime<Local>) -> String {
    if summary_file_name.contains(SUMMARY_INFIX) {
        let name = summary_file_name.replacen(SUMMARY_INFIX, COMPANION_INFIX, 1);
        return if name.ends_with(".html") {
            name
        } else {
            format!("{name}.html")
        };
    }

    if let Some(c) = STAMPED_NAME.captures(summary_file_name) {
        return format!("{}{}{}.html", &c[1], COMPANION_INFIX, &c[2]);
    }

    format!("AIReport_{}.html", now.format("%Y%m%d_%H%M%S"))
}

/// Render a key/value list as a two-column table
fn key_value_table(pairs: &[(String, String)]) -> String {
    let rows: String = pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "<tr><th>{}</th><td>{}</td></tr>",
                html_escape(key),
                html_escape(value)
            )
        })
        .collect();
    format!(r#"<table class="kv">{rows}</table>"#)
}

/// Render a [`DataTable`] with escaped cells
fn data_table(table: &DataTable) -> String {
    let head: String = table
        .headers
        .iter()
        .map(|h| format!("<th>{}</th>", html_escape(h)))
        .collect();
    let body: String = table
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", html_escape(cell)))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!("<table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("<div>"), "&lt;div&gt;");
        assert_eq!(html_escape("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(html_escape("it's"), "it&#39;s");
        assert_eq!(html_escape("plain text"), "plain text");
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name("shop_summary_20240301_100000.html"), "shop");
        assert_eq!(project_name("入学评测_入学评测_5_list_summary_20260209_101010.html"), "入学评测");
        assert_eq!(project_name("checkout_20240301_100000.html"), "checkout");
        assert_eq!(project_name("index.html"), FALLBACK_PROJECT_NAME);
        assert_eq!(project_name("_summary_20240301_100000.html"), FALLBACK_PROJECT_NAME);
    }

    #[test]
    fn test_companion_file_name() {
        assert_eq!(
            companion_file_name("shop_summary_20240301_100000.html", fixed_now()),
            "shop_AIReport_20240301_100000.html"
        );
        assert_eq!(
            companion_file_name("checkout_20240301_100000.html", fixed_now()),
            "checkout_AIReport_20240301_100000.html"
        );
        assert_eq!(
            companion_file_name("index.html", fixed_now()),
            "AIReport_20260101_083000.html"
        );
    }

    #[test]
    fn test_data_table_escapes_cells() {
        let mut table = DataTable::with_headers(["Type of error"]);
        table.push_row(vec!["<script>alert(1)</script>".into()]);
        let html = data_table(&table);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
