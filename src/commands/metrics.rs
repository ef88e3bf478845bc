use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use arquebus::Config;
use arquebus::metrics::{LabelAggregate, LogMetrics, MetricsExtractor};
use arquebus::utils::{format_duration, format_size, get_writer};

/// Run the metrics command with the given arguments
pub async fn run(config: &Config, input: PathBuf, output: String, report_type: String) -> Result<()> {
    let metrics = MetricsExtractor::new(&config.metrics)
        .extract(&input)
        .with_context(|| format!("Failed to read result log {}", input.display()))?;
    let mut writer = get_writer(&output)?;

    let Some(metrics) = metrics else {
        writeln!(writer, "No usable samples in {}", input.display())?;
        return Ok(());
    };

    match report_type.as_str() {
        "text" => generate_text_report(&metrics, &mut writer)?,
        "json" => generate_json_report(&metrics, &mut writer)?,
        _ => anyhow::bail!("Unsupported report type: {}", report_type),
    }

    Ok(())
}

fn write_aggregate<W: Write>(writer: &mut W, aggregate: &LabelAggregate) -> Result<()> {
    let latency = &aggregate.latency;
    writeln!(writer, "[{}]", aggregate.label)?;
    writeln!(writer, "Requests:\t{}", aggregate.sample_count)?;
    writeln!(
        writer,
        "Errors:\t\t{} ({:.2}%)",
        aggregate.error_count,
        aggregate.error_rate_percent()
    )?;
    writeln!(
        writer,
        "Duration:\t{}",
        format_duration(Duration::from_secs_f64(aggregate.active_duration_seconds))
    )?;
    writeln!(writer, "TPS:\t\t{:.2} req/s", aggregate.tps)?;
    writeln!(writer, "Min:\t\t{:.2}ms", latency.min)?;
    writeln!(writer, "Mean:\t\t{:.2}ms", latency.mean)?;
    writeln!(writer, "50th percentile:\t{:.2}ms", latency.median)?;
    writeln!(writer, "90th percentile:\t{:.2}ms", latency.p90)?;
    writeln!(writer, "95th percentile:\t{:.2}ms", latency.p95)?;
    writeln!(writer, "99th percentile:\t{:.2}ms", latency.p99)?;
    writeln!(writer, "Max:\t\t{:.2}ms", latency.max)?;
    writeln!(writer, "Bytes in:\t{}", format_size(aggregate.bytes_received_total))?;
    writeln!(writer, "Bytes out:\t{}", format_size(aggregate.bytes_sent_total))?;
    writeln!(writer)?;
    Ok(())
}

/// Per-label blocks, then the overall block and the TPS summary
fn generate_text_report<W: Write>(metrics: &LogMetrics, writer: &mut W) -> Result<()> {
    for aggregate in metrics.labels.values() {
        write_aggregate(writer, aggregate)?;
    }
    write_aggregate(writer, &metrics.total)?;

    let tps = &metrics.tps;
    writeln!(writer, "Time range:\t{} - {}", tps.start_time, tps.end_time)?;
    writeln!(writer, "Peak TPS:\t{:.2}", tps.peak_tps)?;
    writeln!(writer, "Min TPS:\t{:.2}", tps.min_tps)?;
    if metrics.skipped_records + metrics.bad_timestamps > 0 {
        writeln!(
            writer,
            "Excluded:\t{} malformed, {} bad timestamps",
            metrics.skipped_records, metrics.bad_timestamps
        )?;
    }

    Ok(())
}

fn aggregate_json(aggregate: &LabelAggregate) -> Value {
    json!({
        "label": aggregate.label,
        "samples": aggregate.sample_count,
        "errors": aggregate.error_count,
        "error_rate_percent": aggregate.error_rate_percent(),
        "active_duration_seconds": aggregate.active_duration_seconds,
        "tps": aggregate.tps,
        "latency_ms": aggregate.latency,
        "bytes_received": aggregate.bytes_received_total,
        "bytes_sent": aggregate.bytes_sent_total,
        "response_codes": aggregate.response_codes,
    })
}

fn generate_json_report<W: Write>(metrics: &LogMetrics, writer: &mut W) -> Result<()> {
    let labels: Vec<Value> = metrics.labels.values().map(aggregate_json).collect();
    let report = json!({
        "source": metrics.source,
        "format": metrics.format,
        "unit": metrics.unit,
        "labels": labels,
        "total": aggregate_json(&metrics.total),
        "tps": metrics.tps,
        "skipped_records": metrics.skipped_records,
        "bad_timestamps": metrics.bad_timestamps,
    });

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
