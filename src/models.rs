use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One request observation read from a result log
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Request or transaction name
    pub label: String,
    /// Raw timestamp; its unit is resolved per file, not per record
    pub timestamp: i64,
    /// How long the request took, in milliseconds
    pub elapsed_ms: f64,
    /// Whether the tool marked the sample as successful
    pub success: bool,
    /// Response code as written by the tool (may be non-numeric)
    pub response_code: String,
    /// Bytes received
    pub bytes_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
}

/// Success and error counts for one response code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCounts {
    pub success: u64,
    pub error: u64,
}

/// Latency distribution of one label, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// APDEX figures recovered from a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Apdex {
    /// Score as printed by the tool, e.g. `0.942`
    pub score: Option<String>,
    /// Rating band, e.g. `Excellent`
    pub level: Option<String>,
}

/// A table recovered from a report. Every row has exactly as many cells as
/// there are headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Create an empty table with the given headers
    pub fn with_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row if its arity matches the headers. Returns whether the
    /// row was kept.
    pub fn push_row(&mut self, cells: Vec<String>) -> bool {
        if self.headers.is_empty() || cells.len() != self.headers.len() {
            return false;
        }
        self.rows.push(cells);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a cell by row index and header name
    pub fn get(&self, row: usize, header: &str) -> Option<&str> {
        let column = self.headers.iter().position(|h| h == header)?;
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Rows as header/value pairs, in header order
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }
}

/// Structured content recovered from one generated HTML report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDashboard {
    /// Key/value pairs from the test information table, in document order
    pub test_info: Vec<(String, String)>,
    pub apdex: Apdex,
    pub statistics: DataTable,
    pub errors: DataTable,
    pub top_errors: DataTable,
}

impl ReportDashboard {
    /// Whether the report carries a usable statistics table
    pub fn has_statistics(&self) -> bool {
        !self.statistics.headers.is_empty() && !self.statistics.is_empty()
    }

    /// Look up a test-information value by key
    pub fn info(&self, key: &str) -> Option<&str> {
        self.test_info
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Throughput summary for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TpsSummary {
    pub total_requests: u64,
    pub test_duration_seconds: f64,
    pub average_tps: f64,
    pub peak_tps: f64,
    pub min_tps: f64,
    /// Sample count per epoch second
    pub tps_by_second: BTreeMap<i64, u64>,
    /// Display string, local time
    pub start_time: String,
    /// Display string, local time
    pub end_time: String,
    /// Set when the figures were scraped from rendered HTML rather than
    /// computed from samples
    pub estimated: bool,
}

/// A prompt for the narrative service, built once per analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// One detailed report linked from a summary page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    /// Name of the directory holding the report
    pub name: String,
    /// Resolved path of the report's `index.html`
    pub path: std::path::PathBuf,
    /// The href exactly as written in the summary
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_rejects_mismatched_arity() {
        let mut table = DataTable::with_headers(["Label", "#Samples"]);
        assert!(table.push_row(vec!["login".into(), "10".into()]));
        assert!(!table.push_row(vec!["logout".into()]));
        assert!(!table.push_row(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_push_row_without_headers() {
        let mut table = DataTable::default();
        assert!(!table.push_row(vec!["x".into()]));
    }

    #[test]
    fn test_lookup_by_header() {
        let mut table = DataTable::with_headers(["Label", "#Samples"]);
        table.push_row(vec!["login".into(), "10".into()]);
        assert_eq!(table.get(0, "#Samples"), Some("10"));
        assert_eq!(table.get(0, "Missing"), None);
        assert_eq!(table.get(3, "Label"), None);

        let records: Vec<_> = table.records().collect();
        assert_eq!(records[0], vec![("Label", "login"), ("#Samples", "10")]);
    }

    #[test]
    fn test_has_statistics() {
        let mut dashboard = ReportDashboard::default();
        assert!(!dashboard.has_statistics());
        dashboard.statistics = DataTable::with_headers(["Label"]);
        assert!(!dashboard.has_statistics());
        dashboard.statistics.push_row(vec!["Total".into()]);
        assert!(dashboard.has_statistics());
    }
}
