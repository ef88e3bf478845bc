//! Result-log metrics extraction.
//!
//! A result log is streamed once. Each sample updates its label's aggregate
//! and a global aggregate; raw timestamps stay unresolved until the whole
//! file has been read, because the seconds/milliseconds decision needs the
//! full timestamp range.

use chrono::Local;
use csv::{ReaderBuilder, StringRecord};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{BadTimestampPolicy, MetricsConfig};
use crate::error::{Error, Result};
use crate::models::{CodeCounts, DataTable, LatencyStats, ReportDashboard, SampleRecord, TpsSummary};
use crate::normalize::{self, LogFormat, TimeUnit};
use crate::utils::format_timestamp_ms;

/// Label of the aggregate spanning every sample in a log
pub const TOTAL_LABEL: &str = "Total";

/// Timestamp attributes of an XML sample, highest priority first. Only the
/// first one present is used.
const TIMESTAMP_ATTRIBUTES: [&str; 4] = ["ts", "t", "timeStamp", "timestamp"];

/// Column order of a headerless CSV log: timeStamp, elapsed, label,
/// responseCode, responseMessage, threadName, dataType, success,
/// failureMessage, bytes, sentBytes, ...
const HEADERLESS_COLUMNS: usize = 10;

/// Statistics headers, matching the tool's own dashboard
pub const STATISTICS_HEADERS: [&str; 14] = [
    "Label",
    "#Samples",
    "FAIL",
    "Error %",
    "Average",
    "Min",
    "Max",
    "Median",
    "90th pct",
    "95th pct",
    "99th pct",
    "Transactions/s",
    "Received",
    "Sent",
];

/// Running statistics for one label
#[derive(Debug, Clone, Serialize)]
pub struct LabelAggregate {
    pub label: String,
    pub sample_count: u64,
    pub error_count: u64,
    pub total_elapsed_ms: f64,
    pub latency: LatencyStats,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,
    /// Earliest sample, epoch milliseconds
    pub min_timestamp_ms: i64,
    /// Latest sample, epoch milliseconds
    pub max_timestamp_ms: i64,
    pub active_duration_seconds: f64,
    pub tps: f64,
    pub response_codes: BTreeMap<String, CodeCounts>,
    #[serde(skip)]
    elapsed: Vec<f64>,
    #[serde(skip)]
    min_raw: i64,
    #[serde(skip)]
    max_raw: i64,
    #[serde(skip)]
    finalized: bool,
}

impl LabelAggregate {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sample_count: 0,
            error_count: 0,
            total_elapsed_ms: 0.0,
            latency: LatencyStats::default(),
            bytes_received_total: 0,
            bytes_sent_total: 0,
            min_timestamp_ms: 0,
            max_timestamp_ms: 0,
            active_duration_seconds: 0.0,
            tps: 0.0,
            response_codes: BTreeMap::new(),
            elapsed: Vec::new(),
            min_raw: i64::MAX,
            max_raw: i64::MIN,
            finalized: false,
        }
    }

    /// Fold one sample in. Ignored once the aggregate is finalized.
    pub fn record(&mut self, sample: &SampleRecord) {
        if self.finalized {
            debug!(label = %self.label, "Sample offered to a finalized aggregate, ignoring");
            return;
        }

        self.sample_count += 1;
        self.total_elapsed_ms += sample.elapsed_ms;
        self.elapsed.push(sample.elapsed_ms);
        self.bytes_received_total += sample.bytes_received;
        self.bytes_sent_total += sample.bytes_sent;
        self.min_raw = self.min_raw.min(sample.timestamp);
        self.max_raw = self.max_raw.max(sample.timestamp);

        let counts = self
            .response_codes
            .entry(sample.response_code.clone())
            .or_default();
        if sample.success {
            counts.success += 1;
        } else {
            counts.error += 1;
            self.error_count += 1;
        }
    }

    /// Compute percentiles, duration and TPS. Runs once; later calls are
    /// no-ops.
    pub fn finalize(&mut self, unit: TimeUnit) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if self.sample_count == 0 {
            return;
        }

        let mut sorted = std::mem::take(&mut self.elapsed);
        sorted.sort_by(|a, b| a.total_cmp(b));

        self.latency = LatencyStats {
            mean: self.total_elapsed_ms / self.sample_count as f64,
            median: percentile(&sorted, 0.5),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p90: percentile(&sorted, 0.9),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        };

        self.min_timestamp_ms = unit.to_millis(self.min_raw);
        self.max_timestamp_ms = unit.to_millis(self.max_raw);

        // A run shorter than its longest sample is floored at that sample
        let span_ms = self
            .max_timestamp_ms
            .saturating_sub(self.min_timestamp_ms)
            .max(0) as f64;
        self.active_duration_seconds = span_ms.max(self.latency.max) / 1000.0;

        self.tps = if self.active_duration_seconds > 0.0 {
            self.sample_count as f64 / self.active_duration_seconds
        } else {
            0.0
        };
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn success_count(&self) -> u64 {
        self.sample_count - self.error_count
    }

    pub fn error_rate_percent(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.sample_count as f64 * 100.0
        }
    }

    fn kb_per_second(&self, bytes: u64) -> f64 {
        if self.active_duration_seconds > 0.0 {
            bytes as f64 / 1024.0 / self.active_duration_seconds
        } else {
            0.0
        }
    }

    fn statistics_row(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            self.sample_count.to_string(),
            self.error_count.to_string(),
            format!("{:.2}%", self.error_rate_percent()),
            format!("{:.2}", self.latency.mean),
            format!("{:.0}", self.latency.min),
            format!("{:.0}", self.latency.max),
            format!("{:.2}", self.latency.median),
            format!("{:.2}", self.latency.p90),
            format!("{:.2}", self.latency.p95),
            format!("{:.2}", self.latency.p99),
            format!("{:.2}", self.tps),
            format!("{:.2}", self.kb_per_second(self.bytes_received_total)),
            format!("{:.2}", self.kb_per_second(self.bytes_sent_total)),
        ]
    }
}

/// Value at percentile `p` (0.0..=1.0) of an ascending slice.
///
/// Index is `floor(p * len)`, clamped to the last element.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (p * sorted.len() as f64).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Everything computed from one result log
#[derive(Debug, Clone, Serialize)]
pub struct LogMetrics {
    pub source: PathBuf,
    pub format: LogFormat,
    pub unit: TimeUnit,
    pub labels: BTreeMap<String, LabelAggregate>,
    /// Aggregate across all labels, using the global timestamp span
    pub total: LabelAggregate,
    pub tps: TpsSummary,
    /// Rows dropped for a wrong column count or a missing required field
    pub skipped_records: u64,
    /// Records whose timestamp could not be parsed
    pub bad_timestamps: u64,
}

impl LogMetrics {
    /// Present the computed figures in the shape of a tool dashboard, so the
    /// rest of the pipeline can treat both sources alike.
    pub fn to_dashboard(&self) -> ReportDashboard {
        let mut statistics = DataTable::with_headers(STATISTICS_HEADERS);
        statistics.push_row(self.total.statistics_row());
        for aggregate in self.labels.values() {
            statistics.push_row(aggregate.statistics_row());
        }

        let mut errors = DataTable::with_headers([
            "Type of error",
            "Number of errors",
            "% in errors",
            "% in all samples",
        ]);
        let mut failing: BTreeMap<&str, u64> = BTreeMap::new();
        for aggregate in self.labels.values() {
            for (code, counts) in &aggregate.response_codes {
                if counts.error > 0 {
                    *failing.entry(code.as_str()).or_default() += counts.error;
                }
            }
        }
        for (code, count) in failing {
            errors.push_row(vec![
                code.to_string(),
                count.to_string(),
                format!("{:.2}%", percent(count, self.total.error_count)),
                format!("{:.2}%", percent(count, self.total.sample_count)),
            ]);
        }

        let source = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string());

        let mut test_info = vec![
            ("Source file".to_string(), source),
            ("Start Time".to_string(), self.tps.start_time.clone()),
            ("End Time".to_string(), self.tps.end_time.clone()),
        ];
        if self.skipped_records + self.bad_timestamps > 0 {
            test_info.push((
                "Excluded records".to_string(),
                (self.skipped_records + self.bad_timestamps).to_string(),
            ));
        }

        ReportDashboard {
            test_info,
            statistics,
            errors,
            ..ReportDashboard::default()
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Fields of one sample as they appear in the log, before validation
struct RawSample<'a> {
    timestamp: Option<&'a str>,
    label: Option<&'a str>,
    elapsed: Option<&'a str>,
    response_code: Option<&'a str>,
    success: Option<&'a str>,
    bytes: Option<&'a str>,
    sent_bytes: Option<&'a str>,
}

/// Accumulates samples for one parse attempt
struct Collector {
    policy: BadTimestampPolicy,
    labels: BTreeMap<String, LabelAggregate>,
    total: LabelAggregate,
    raw_timestamps: BTreeMap<i64, u64>,
    /// Samples stamped with the current time, in epoch milliseconds. They
    /// join the aggregates once the file's unit is known.
    substituted: Vec<SampleRecord>,
    skipped: u64,
    bad_timestamps: u64,
}

/// How a sample's timestamp was resolved
enum Stamp {
    Parsed(i64),
    Now,
    Dropped,
}

impl Collector {
    fn new(policy: BadTimestampPolicy) -> Self {
        Self {
            policy,
            labels: BTreeMap::new(),
            total: LabelAggregate::new(TOTAL_LABEL),
            raw_timestamps: BTreeMap::new(),
            substituted: Vec::new(),
            skipped: 0,
            bad_timestamps: 0,
        }
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    fn accept(&mut self, raw: RawSample<'_>) {
        let label = raw.label.map(str::trim).filter(|l| !l.is_empty());
        let elapsed = raw
            .elapsed
            .and_then(|e| e.trim().parse::<f64>().ok())
            .filter(|e| e.is_finite() && *e >= 0.0);

        let (Some(label), Some(elapsed_ms)) = (label, elapsed) else {
            self.skip();
            return;
        };

        let stamp = self.resolve_timestamp(raw.timestamp);
        if matches!(stamp, Stamp::Dropped) {
            return;
        }

        let mut sample = SampleRecord {
            label: label.to_string(),
            timestamp: 0,
            elapsed_ms,
            // Logs saved without the success column count every sample as
            // successful
            success: raw
                .success
                .is_none_or(|s| s.trim().eq_ignore_ascii_case("true")),
            response_code: raw.response_code.unwrap_or("").trim().to_string(),
            bytes_received: parse_count(raw.bytes),
            bytes_sent: parse_count(raw.sent_bytes),
        };

        match stamp {
            Stamp::Parsed(timestamp) => {
                sample.timestamp = timestamp;
                self.push(sample);
            }
            Stamp::Now => {
                sample.timestamp = Local::now().timestamp_millis();
                self.substituted.push(sample);
            }
            Stamp::Dropped => {}
        }
    }

    fn resolve_timestamp(&mut self, token: Option<&str>) -> Stamp {
        if let Some(ts) = token.and_then(normalize::parse_timestamp) {
            return Stamp::Parsed(ts);
        }

        self.bad_timestamps += 1;
        match self.policy {
            BadTimestampPolicy::Drop => {
                debug!(token = token.unwrap_or(""), "Unparsable timestamp, dropping record");
                Stamp::Dropped
            }
            BadTimestampPolicy::SubstituteNow => {
                warn!(
                    token = token.unwrap_or(""),
                    "Unparsable timestamp, substituting current time"
                );
                Stamp::Now
            }
        }
    }

    fn push(&mut self, sample: SampleRecord) {
        *self.raw_timestamps.entry(sample.timestamp).or_default() += 1;
        self.total.record(&sample);
        match self.labels.get_mut(&sample.label) {
            Some(aggregate) => aggregate.record(&sample),
            None => {
                let mut aggregate = LabelAggregate::new(sample.label.clone());
                aggregate.record(&sample);
                self.labels.insert(sample.label.clone(), aggregate);
            }
        }
    }

    fn finish(mut self, source: &Path, format: LogFormat) -> Option<LogMetrics> {
        // The unit comes from the timestamps read from the file; substituted
        // ones are converted into it before they are counted
        let unit = if self.total.sample_count > 0 {
            normalize::detect_unit(self.total.min_raw, self.total.max_raw)
        } else {
            TimeUnit::Milliseconds
        };
        for mut sample in std::mem::take(&mut self.substituted) {
            sample.timestamp = unit.from_millis(sample.timestamp);
            self.push(sample);
        }

        let Collector {
            mut labels,
            mut total,
            raw_timestamps,
            skipped,
            bad_timestamps,
            ..
        } = self;

        if skipped > 0 || bad_timestamps > 0 {
            warn!(
                path = %source.display(),
                skipped,
                bad_timestamps,
                "Records excluded from metrics"
            );
        }

        if total.sample_count == 0 {
            warn!(path = %source.display(), "No usable samples in result log");
            return None;
        }

        total.finalize(unit);
        for aggregate in labels.values_mut() {
            aggregate.finalize(unit);
        }

        let mut tps_by_second: BTreeMap<i64, u64> = BTreeMap::new();
        for (raw, count) in raw_timestamps {
            *tps_by_second
                .entry(unit.to_millis(raw).div_euclid(1000))
                .or_default() += count;
        }

        let tps = TpsSummary {
            total_requests: total.sample_count,
            test_duration_seconds: total.active_duration_seconds,
            average_tps: total.tps,
            peak_tps: tps_by_second.values().copied().max().unwrap_or(0) as f64,
            min_tps: tps_by_second.values().copied().min().unwrap_or(0) as f64,
            tps_by_second,
            start_time: format_timestamp_ms(total.min_timestamp_ms),
            end_time: format_timestamp_ms(total.max_timestamp_ms),
            estimated: false,
        };

        info!(
            path = %source.display(),
            samples = total.sample_count,
            labels = labels.len(),
            unit = ?unit,
            average_tps = tps.average_tps,
            "Computed result-log metrics"
        );

        Some(LogMetrics {
            source: source.to_path_buf(),
            format,
            unit,
            labels,
            total,
            tps,
            skipped_records: skipped,
            bad_timestamps,
        })
    }
}

fn parse_count(field: Option<&str>) -> u64 {
    field.and_then(|f| f.trim().parse().ok()).unwrap_or(0)
}

/// Column positions of a CSV log
struct CsvLayout {
    /// Exact column count required when the log has a header row
    header_len: Option<usize>,
    timestamp: usize,
    elapsed: usize,
    label: usize,
    response_code: Option<usize>,
    success: Option<usize>,
    bytes: Option<usize>,
    sent_bytes: Option<usize>,
}

impl CsvLayout {
    fn headerless() -> Self {
        Self {
            header_len: None,
            timestamp: 0,
            elapsed: 1,
            label: 2,
            response_code: Some(3),
            success: Some(7),
            bytes: Some(9),
            sent_bytes: Some(10),
        }
    }

    fn from_header(header: &StringRecord) -> Option<Self> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        Some(Self {
            header_len: Some(header.len()),
            timestamp: find("timeStamp")?,
            elapsed: find("elapsed")?,
            label: find("label")?,
            response_code: find("responseCode"),
            success: find("success"),
            bytes: find("bytes"),
            sent_bytes: find("sentBytes"),
        })
    }

    fn is_header(record: &StringRecord) -> bool {
        record.iter().any(|field| field.trim() == "timeStamp")
    }

    fn fits(&self, record: &StringRecord) -> bool {
        match self.header_len {
            Some(len) => record.len() == len,
            None => record.len() >= HEADERLESS_COLUMNS,
        }
    }

    fn raw<'a>(&self, record: &'a StringRecord) -> RawSample<'a> {
        let at = |index: Option<usize>| index.and_then(|i| record.get(i));
        RawSample {
            timestamp: record.get(self.timestamp),
            label: record.get(self.label),
            elapsed: record.get(self.elapsed),
            response_code: at(self.response_code),
            success: at(self.success),
            bytes: at(self.bytes),
            sent_bytes: at(self.sent_bytes),
        }
    }
}

fn read_csv<R: io::Read>(source: R, collector: &mut Collector) -> io::Result<()> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let mut layout: Option<CsvLayout> = None;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(io::Error::other(e)),
            Err(e) => {
                debug!(error = %e, "Unreadable CSV row");
                collector.skip();
                continue;
            }
        };

        if layout.is_none() {
            if CsvLayout::is_header(&record) {
                match CsvLayout::from_header(&record) {
                    Some(detected) => layout = Some(detected),
                    None => {
                        warn!("CSV header lacks timeStamp, elapsed or label columns");
                        return Ok(());
                    }
                }
                continue;
            }
            layout = Some(CsvLayout::headerless());
        }

        let Some(layout) = layout.as_ref() else {
            continue;
        };

        if !layout.fits(&record) {
            collector.skip();
            continue;
        }
        collector.accept(layout.raw(&record));
    }

    Ok(())
}

fn is_sample_element(name: &[u8]) -> bool {
    name == b"sample" || name == b"httpSample"
}

fn accept_xml_sample(element: &BytesStart<'_>, collector: &mut Collector) {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for attribute in element.attributes() {
        let Ok(attribute) = attribute else {
            continue;
        };
        let Ok(value) = attribute.unescape_value() else {
            continue;
        };
        attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }

    let get = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    collector.accept(RawSample {
        timestamp: TIMESTAMP_ATTRIBUTES.iter().find_map(|name| get(name)),
        label: get("lb"),
        elapsed: get("t"),
        response_code: get("rc"),
        success: get("s"),
        bytes: get("by"),
        sent_bytes: get("sby"),
    });
}

/// Read samples from an XML log. Only direct children of the root element
/// count; nested sub-samples belong to their parent.
fn read_xml<R: BufRead>(source: R, collector: &mut Collector) -> std::result::Result<(), quick_xml::Error> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => {
                if depth == 1 && is_sample_element(element.name().as_ref()) {
                    accept_xml_sample(&element, collector);
                }
                depth += 1;
            }
            Event::Empty(element) => {
                if depth == 1 && is_sample_element(element.name().as_ref()) {
                    accept_xml_sample(&element, collector);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Streams result logs into [`LogMetrics`]
#[derive(Debug, Clone, Default)]
pub struct MetricsExtractor {
    policy: BadTimestampPolicy,
}

impl MetricsExtractor {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            policy: config.bad_timestamp,
        }
    }

    /// Extract metrics from the log at `path`.
    ///
    /// A file that looks like XML but yields no samples as XML is read again
    /// as CSV. Returns `Ok(None)` when neither reading finds usable samples. Returns an error only
    /// when the file cannot be opened.
    pub fn extract(&self, path: &Path) -> Result<Option<LogMetrics>> {
        let format = normalize::sniff_format(path)?;
        debug!(path = %path.display(), ?format, "Detected result-log format");

        match format {
            LogFormat::Xml => {
                let mut collector = Collector::new(self.policy);
                match read_xml(BufReader::new(open(path)?), &mut collector) {
                    Ok(()) => match collector.finish(path, LogFormat::Xml) {
                        Some(metrics) => Ok(Some(metrics)),
                        None => {
                            debug!(path = %path.display(), "No XML samples, retrying as CSV");
                            self.extract_csv(path)
                        }
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "XML parse failed, retrying as CSV");
                        self.extract_csv(path)
                    }
                }
            }
            LogFormat::Csv => self.extract_csv(path),
        }
    }

    fn extract_csv(&self, path: &Path) -> Result<Option<LogMetrics>> {
        let mut collector = Collector::new(self.policy);
        if let Err(e) = read_csv(BufReader::new(open(path)?), &mut collector) {
            warn!(path = %path.display(), error = %e, "CSV parse failed");
            return Ok(None);
        }
        Ok(collector.finish(path, LogFormat::Csv))
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASE: i64 = 1_700_000_000_000;

    fn write_log(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn sample(label: &str, timestamp: i64, elapsed_ms: f64, success: bool) -> SampleRecord {
        SampleRecord {
            label: label.to_string(),
            timestamp,
            elapsed_ms,
            success,
            response_code: if success { "200" } else { "500" }.to_string(),
            bytes_received: 100,
            bytes_sent: 10,
        }
    }

    fn extract(contents: &str) -> Option<LogMetrics> {
        let file = write_log(contents);
        MetricsExtractor::default().extract(file.path()).unwrap()
    }

    #[test]
    fn test_percentile_index_is_floor() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.5), 30.0);
        assert_eq!(percentile(&sorted, 0.9), 40.0);
        assert_eq!(percentile(&sorted, 1.0), 40.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_aggregate_ordering_and_counts() {
        let mut aggregate = LabelAggregate::new("login");
        for (i, elapsed) in [120.0, 80.0, 300.0, 95.0, 101.0, 2000.0, 87.0].iter().enumerate() {
            aggregate.record(&sample("login", BASE + i as i64 * 1000, *elapsed, i % 3 != 0));
        }
        aggregate.finalize(TimeUnit::Milliseconds);

        let l = aggregate.latency;
        assert!(l.min <= l.median);
        assert!(l.median <= l.p90);
        assert!(l.p90 <= l.p95);
        assert!(l.p95 <= l.p99);
        assert!(l.p99 <= l.max);
        assert_eq!(l.min, 80.0);
        assert_eq!(l.max, 2000.0);

        assert!(aggregate.error_count <= aggregate.sample_count);
        assert_eq!(aggregate.error_count, 3);
        let rate = aggregate.error_rate_percent();
        assert!((0.0..=100.0).contains(&rate));
        assert_eq!(aggregate.response_codes["500"].error, 3);
        assert_eq!(aggregate.response_codes["200"].success, 4);
    }

    #[test]
    fn test_finalize_runs_once() {
        let mut aggregate = LabelAggregate::new("a");
        aggregate.record(&sample("a", 1, 5.0, true));
        aggregate.record(&sample("a", 3, 5.0, true));
        aggregate.finalize(TimeUnit::Seconds);
        let first = aggregate.clone();

        aggregate.finalize(TimeUnit::Milliseconds);
        aggregate.record(&sample("a", 10, 50.0, false));

        assert!(aggregate.is_finalized());
        assert_eq!(aggregate.sample_count, first.sample_count);
        assert_eq!(aggregate.max_timestamp_ms, 3000);
        assert_eq!(aggregate.tps, first.tps);
    }

    #[test]
    fn test_zero_duration_gives_zero_tps() {
        let mut aggregate = LabelAggregate::new("instant");
        aggregate.record(&sample("instant", BASE, 0.0, true));
        aggregate.record(&sample("instant", BASE, 0.0, true));
        aggregate.finalize(TimeUnit::Milliseconds);

        assert_eq!(aggregate.active_duration_seconds, 0.0);
        assert_eq!(aggregate.tps, 0.0);
        assert!(!aggregate.tps.is_nan());
    }

    #[test]
    fn test_zero_span_floored_at_sample_duration() {
        let mut aggregate = LabelAggregate::new("single");
        aggregate.record(&sample("single", BASE, 500.0, true));
        aggregate.finalize(TimeUnit::Milliseconds);

        assert_eq!(aggregate.active_duration_seconds, 0.5);
        assert_eq!(aggregate.tps, 2.0);
    }

    #[test]
    fn test_csv_with_header_two_labels() {
        let mut log = String::from(
            "timeStamp,elapsed,label,responseCode,responseMessage,threadName,dataType,success,failureMessage,bytes,sentBytes,grpThreads,allThreads,URL,Latency,IdleTime,Connect\n",
        );
        let login_offsets = [0, 1000, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 10000];
        for offset in login_offsets {
            log.push_str(&format!(
                "{},42,login,200,OK,Group 1-1,text,true,,512,128,1,1,http://h/login,40,0,3\n",
                BASE + offset
            ));
        }
        for offset in [0, 5000, 10000] {
            log.push_str(&format!(
                "{},80,search,500,Server Error,Group 1-2,text,false,boom,256,64,1,1,http://h/search,75,0,2\n",
                BASE + offset
            ));
        }

        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.format, LogFormat::Csv);
        assert_eq!(metrics.unit, TimeUnit::Milliseconds);
        assert_eq!(metrics.labels.len(), 2);

        let login = &metrics.labels["login"];
        assert_eq!(login.sample_count, 10);
        assert!((login.tps - 1.0).abs() < 1e-9);
        assert_eq!(login.bytes_received_total, 5120);

        let search = &metrics.labels["search"];
        assert_eq!(search.error_count, 3);
        assert_eq!(search.error_rate_percent(), 100.0);

        assert_eq!(metrics.total.sample_count, 13);
        assert!((metrics.total.active_duration_seconds - 10.0).abs() < 1e-9);
        assert!((metrics.tps.average_tps - 1.3).abs() < 1e-9);
        assert_eq!(metrics.tps.total_requests, 13);
        assert_eq!(metrics.tps.peak_tps, 2.0);
        assert_eq!(metrics.tps.min_tps, 1.0);
        assert!(!metrics.tps.estimated);
    }

    #[test]
    fn test_csv_header_rows_with_wrong_arity_skipped() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode,success\n{},10,a,200,true\n{},10,a,200\n{},oops,a,200,true\n",
            BASE,
            BASE + 1000,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.sample_count, 1);
        assert_eq!(metrics.skipped_records, 2);
    }

    #[test]
    fn test_headerless_csv() {
        let log = format!(
            "{},12,home,200,OK,T1,text,true,,1000,200\n{},15,home,404,Not Found,T1,text,false,,300,200\nshort,row\n{},9,home,200,OK,T1,text,true,,1000,200\n",
            BASE,
            BASE + 1500,
            BASE + 3000
        );
        let metrics = extract(&log).unwrap();
        let home = &metrics.labels["home"];
        assert_eq!(home.sample_count, 3);
        assert_eq!(home.error_count, 1);
        assert_eq!(home.bytes_sent_total, 600);
        assert_eq!(home.response_codes["404"].error, 1);
        assert_eq!(metrics.skipped_records, 1);
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode,responseMessage,success\n{},10,\"search, advanced\",200,\"OK, fine\",true\n{},20,\"search, advanced\",200,OK,true\n",
            BASE,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.labels["search, advanced"].sample_count, 2);
    }

    #[test]
    fn test_xml_small_millisecond_timestamps() {
        let log = r#"<?xml version="1.0" encoding="UTF-8"?>
<testResults version="1.2">
<httpSample t="10" ts="1000" s="true" lb="a" rc="200" by="10" sby="1"/>
<httpSample t="12" ts="2000" s="true" lb="a" rc="200" by="10" sby="1"/>
<httpSample t="14" ts="3000" s="false" lb="b" rc="500" by="10" sby="1"/>
</testResults>"#;
        let metrics = extract(log).unwrap();
        assert_eq!(metrics.format, LogFormat::Xml);
        assert_eq!(metrics.unit, TimeUnit::Milliseconds);
        assert_eq!(metrics.total.sample_count, 3);
        assert!((metrics.total.active_duration_seconds - 2.0).abs() < 1e-9);
        assert!((metrics.total.tps - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_xml_uses_first_timestamp_attribute_only() {
        let log = r#"<?xml version="1.0"?>
<testResults>
<sample t="5" ts="1700000000000" timeStamp="1700000000" lb="x" s="true" rc="200"/>
<sample t="5" ts="1700000004000" timeStamp="1700000004" lb="x" s="true" rc="200"/>
</testResults>"#;
        let metrics = extract(log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.unit, TimeUnit::Milliseconds);
        assert!((metrics.total.active_duration_seconds - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_xml_nested_subsamples_not_counted() {
        let log = r#"<?xml version="1.0"?>
<testResults>
<httpSample t="30" ts="1700000000000" lb="page" s="true" rc="200">
  <httpSample t="10" ts="1700000000000" lb="page-0" s="true" rc="200"/>
  <responseData class="java.lang.String">ok</responseData>
</httpSample>
<httpSample t="30" ts="1700000002000" lb="page" s="true" rc="200"/>
</testResults>"#;
        let metrics = extract(log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert!(!metrics.labels.contains_key("page-0"));
    }

    #[test]
    fn test_xml_epoch_seconds() {
        let log = r#"<?xml version="1.0"?>
<testResults>
<sample t="100" ts="1700000000" lb="x" s="true" rc="200"/>
<sample t="100" ts="1700000005" lb="x" s="true" rc="200"/>
<sample t="100" ts="1700000010" lb="x" s="true" rc="200"/>
</testResults>"#;
        let metrics = extract(log).unwrap();
        assert_eq!(metrics.unit, TimeUnit::Seconds);
        assert!((metrics.total.active_duration_seconds - 10.0).abs() < 1e-9);
        assert_eq!(metrics.tps.tps_by_second.len(), 3);
    }

    #[test]
    fn test_broken_xml_falls_back_to_csv_then_no_data() {
        let log = r#"<?xml version="1.0"?>
<testResults>
<httpSample t="1" ts="1000" lb="a" s="true">
</wrongClose>
</testResults>"#;
        assert!(extract(log).is_none());
    }

    #[test]
    fn test_bad_timestamps_dropped_and_counted() {
        let log = format!(
            "timeStamp,elapsed,label,success\n{},10,a,true\nnot-a-time,10,a,true\n{},10,a,true\n",
            BASE,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.bad_timestamps, 1);
        assert_eq!(metrics.skipped_records, 0);
    }

    #[test]
    fn test_bad_timestamps_substituted_when_configured() {
        let file = write_log(&format!(
            "timeStamp,elapsed,label,success\n{},10,a,true\nnot-a-time,10,a,true\n",
            BASE
        ));
        let extractor = MetricsExtractor::new(&MetricsConfig {
            bad_timestamp: BadTimestampPolicy::SubstituteNow,
        });
        let metrics = extractor.extract(file.path()).unwrap().unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.bad_timestamps, 1);
    }

    #[test]
    fn test_missing_success_column_counts_as_success() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode\n{},10,a,200\n{},12,a,200\n",
            BASE,
            BASE + 1000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.total.error_count, 0);
        assert_eq!(metrics.labels["a"].response_codes["200"].success, 2);
    }

    #[test]
    fn test_success_column_still_strict_when_present() {
        let log = format!(
            "timeStamp,elapsed,label,success\n{},10,a,true\n{},10,a,false\n{},10,a,\n",
            BASE,
            BASE + 1000,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.error_count, 2);
    }

    #[test]
    fn test_header_without_optional_columns() {
        let log = format!(
            "timeStamp,elapsed,label\n{},10,a\n{},30,b\n",
            BASE,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.total.error_count, 0);
        assert_eq!(metrics.total.bytes_received_total, 0);
        assert_eq!(metrics.labels["b"].response_codes[""].success, 1);
    }

    #[test]
    fn test_extreme_integer_timestamps_are_bad_timestamps() {
        let log = format!(
            "timeStamp,elapsed,label,success\n-9223372036854775808,10,a,true\n9223372036854775807,10,a,true\n0,10,a,true\n{},10,a,true\n{},10,a,true\n",
            BASE,
            BASE + 3000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.bad_timestamps, 3);
        assert!((metrics.total.active_duration_seconds - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_span_saturates() {
        let mut aggregate = LabelAggregate::new("edge");
        aggregate.record(&sample("edge", i64::MIN, 10.0, true));
        aggregate.record(&sample("edge", i64::MAX, 10.0, true));
        aggregate.finalize(TimeUnit::Milliseconds);

        assert!(aggregate.active_duration_seconds.is_finite());
        assert!(aggregate.tps >= 0.0);
    }

    #[test]
    fn test_substituted_timestamps_follow_detected_unit() {
        let seconds = BASE / 1000;
        let file = write_log(&format!(
            "timeStamp,elapsed,label,success\n{},10,a,true\n{},10,a,true\nnot-a-time,10,a,true\n",
            seconds,
            seconds + 10
        ));
        let extractor = MetricsExtractor::new(&MetricsConfig {
            bad_timestamp: BadTimestampPolicy::SubstituteNow,
        });
        let metrics = extractor.extract(file.path()).unwrap().unwrap();

        assert_eq!(metrics.unit, TimeUnit::Seconds);
        assert_eq!(metrics.total.sample_count, 3);
        let now_ms = Local::now().timestamp_millis();
        let max = metrics.total.max_timestamp_ms;
        assert!(max <= now_ms && now_ms - max < 60_000);
        assert!(metrics.tps.tps_by_second.keys().all(|second| *second <= now_ms / 1000));
    }

    #[test]
    fn test_xml_looking_csv_falls_back_to_csv() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode,success\n{},10,<testResults> page,200,true\n{},20,<testResults> page,200,true\n",
            BASE,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.format, LogFormat::Csv);
        assert_eq!(metrics.labels["<testResults> page"].sample_count, 2);
    }

    #[test]
    fn test_broken_xml_with_csv_rows_falls_back_to_csv() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode,success\n{},10,<testResults>,200,true\n{},20,</page>,500,false\n",
            BASE,
            BASE + 2000
        );
        let metrics = extract(&log).unwrap();
        assert_eq!(metrics.format, LogFormat::Csv);
        assert_eq!(metrics.total.sample_count, 2);
        assert_eq!(metrics.labels["</page>"].error_count, 1);
    }

    #[test]
    fn test_empty_log_is_no_data() {
        assert!(extract("").is_none());
        assert!(extract("timeStamp,elapsed,label\n").is_none());
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = MetricsExtractor::default().extract(Path::new("/nonexistent/result.jtl"));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_dashboard_has_statistics() {
        let log = format!(
            "timeStamp,elapsed,label,responseCode,success\n{},10,a,200,true\n{},30,b,503,false\n",
            BASE,
            BASE + 2000
        );
        let dashboard = extract(&log).unwrap().to_dashboard();
        assert!(dashboard.has_statistics());
        assert_eq!(dashboard.statistics.rows.len(), 3);
        assert_eq!(dashboard.statistics.get(0, "Label"), Some(TOTAL_LABEL));
        assert_eq!(dashboard.statistics.get(0, "#Samples"), Some("2"));
        assert_eq!(dashboard.errors.rows.len(), 1);
        assert_eq!(dashboard.errors.get(0, "Type of error"), Some("503"));
        assert!(dashboard.info("Source file").is_some());
    }
}
