use std::io::Write;

use arquebus::config::{BadTimestampPolicy, MetricsConfig};
use arquebus::metrics::TOTAL_LABEL;
use arquebus::normalize::{LogFormat, TimeUnit};
use arquebus::MetricsExtractor;
use tempfile::NamedTempFile;

fn log_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_ten_samples_over_ten_seconds_is_one_tps() {
    let mut log = String::from("timeStamp,elapsed,label,responseCode,success\n");
    for i in 0..10 {
        let offset = if i == 9 { 10_000 } else { i * 1000 };
        log.push_str(&format!("{},30,checkout,200,true\n", 1_700_000_000_000i64 + offset));
    }
    for offset in [0, 5_000, 10_000] {
        log.push_str(&format!("{},30,browse,200,true\n", 1_700_000_000_000i64 + offset));
    }
    let file = log_file(&log);

    let metrics = MetricsExtractor::default().extract(file.path()).unwrap().unwrap();
    assert_eq!(metrics.format, LogFormat::Csv);
    assert!((metrics.labels["checkout"].tps - 1.0).abs() < 1e-9);
    assert!((metrics.labels["browse"].tps - 0.3).abs() < 1e-9);
    assert!(metrics.tps.average_tps >= 0.0);

    let dashboard = metrics.to_dashboard();
    assert_eq!(dashboard.statistics.get(0, "Label"), Some(TOTAL_LABEL));
    assert_eq!(dashboard.statistics.get(0, "#Samples"), Some("13"));
}

#[test]
fn test_small_millisecond_timestamps_in_xml() {
    let file = log_file(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<testResults version="1.2">
<httpSample t="20" ts="1000" s="true" lb="home" rc="200"/>
<httpSample t="25" ts="2000" s="true" lb="home" rc="200"/>
<httpSample t="30" ts="3000" s="true" lb="home" rc="200"/>
</testResults>"#,
    );

    let metrics = MetricsExtractor::default().extract(file.path()).unwrap().unwrap();
    assert_eq!(metrics.format, LogFormat::Xml);
    assert_eq!(metrics.unit, TimeUnit::Milliseconds);
    assert!((metrics.total.active_duration_seconds - 2.0).abs() < 1e-9);
    assert!((metrics.total.tps - 1.5).abs() < 1e-9);
}

#[test]
fn test_bad_timestamp_policy_is_configurable() {
    let file = log_file(
        "timeStamp,elapsed,label,responseCode,success\n\
         1700000000000,30,home,200,true\n\
         not-a-time,30,home,200,true\n\
         1700000002000,30,home,200,true\n",
    );

    let dropped = MetricsExtractor::default().extract(file.path()).unwrap().unwrap();
    assert_eq!(dropped.total.sample_count, 2);
    assert_eq!(dropped.bad_timestamps, 1);

    let substituting = MetricsExtractor::new(&MetricsConfig {
        bad_timestamp: BadTimestampPolicy::SubstituteNow,
    });
    let kept = substituting.extract(file.path()).unwrap().unwrap();
    assert_eq!(kept.total.sample_count, 3);
}

#[test]
fn test_garbage_is_no_data() {
    let file = log_file("<?xml version=\"1.0\"?>\n<testResults><httpSample ts=");
    assert!(MetricsExtractor::default().extract(file.path()).unwrap().is_none());
}
