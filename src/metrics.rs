// ABOUTME: Process-wide execution metrics for graph runs
// ABOUTME: One latency histogram labelled by graph name and run outcome

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metric name for the run-latency histogram.
pub const EXECUTION_LATENCY_NAME: &str = "keyflow_execution_latency_millis";

/// Upper bounds (inclusive, in milliseconds) of the latency buckets.
pub const EXECUTION_LATENCY_BUCKETS_MS: [f64; 9] = [
    200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 12800.0, 25600.0, 51200.0,
];

#[derive(Debug, Clone, Default)]
struct Series {
    buckets: [u64; 9],
    count: u64,
    sum_millis: f64,
}

/// One exported histogram series, identified by its label pair.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySample {
    pub graph: String,
    /// `"ok"` or `"error"`.
    pub result: String,
    /// Cumulative counts per bucket of [`EXECUTION_LATENCY_BUCKETS_MS`].
    pub buckets: [u64; 9],
    pub count: u64,
    pub sum_millis: f64,
    pub captured_at: DateTime<Utc>,
}

/// Histogram of graph run latencies, labelled `(graph, result)`.
#[derive(Debug, Default)]
pub struct LatencyHistogram {
    series: RwLock<HashMap<(String, &'static str), Series>>,
}

impl LatencyHistogram {
    pub fn record(&self, graph: &str, ok: bool, millis: f64) {
        let result = if ok { "ok" } else { "error" };
        let mut series = self.series.write().expect("metrics lock poisoned");
        let entry = series.entry((graph.to_string(), result)).or_default();
        entry.count += 1;
        entry.sum_millis += millis;
        for (i, bound) in EXECUTION_LATENCY_BUCKETS_MS.iter().enumerate() {
            if millis <= *bound {
                entry.buckets[i] += 1;
            }
        }
    }

    /// A snapshot of every series, sorted by label for stable export.
    pub fn snapshot(&self) -> Vec<LatencySample> {
        let captured_at = Utc::now();
        let series = self.series.read().expect("metrics lock poisoned");
        let mut samples: Vec<LatencySample> = series
            .iter()
            .map(|((graph, result), series)| LatencySample {
                graph: graph.clone(),
                result: (*result).to_string(),
                buckets: series.buckets,
                count: series.count,
                sum_millis: series.sum_millis,
                captured_at,
            })
            .collect();
        samples.sort_by(|a, b| (&a.graph, &a.result).cmp(&(&b.graph, &b.result)));
        samples
    }
}

/// The process-wide run-latency histogram. Embedding applications export it
/// from here; the scheduler records into it on every run.
pub fn execution_latency() -> &'static LatencyHistogram {
    static EXECUTION_LATENCY: OnceLock<LatencyHistogram> = OnceLock::new();
    EXECUTION_LATENCY.get_or_init(LatencyHistogram::default)
}

pub(crate) fn record_execution(graph: &str, ok: bool, millis: f64) {
    execution_latency().record(graph, ok, millis);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_counts_are_cumulative() {
        let histogram = LatencyHistogram::default();
        histogram.record("g", true, 150.0);
        histogram.record("g", true, 1000.0);
        histogram.record("g", true, 99999.0);

        let samples = histogram.snapshot();
        assert_eq!(samples.len(), 1);
        let sample = &samples[0];
        assert_eq!(sample.count, 3);
        // 150ms lands in every bucket, 1000ms from 1600ms upward, 99999ms in none.
        assert_eq!(sample.buckets, [1, 1, 1, 2, 2, 2, 2, 2, 2]);
        assert_eq!(sample.sum_millis, 150.0 + 1000.0 + 99999.0);
    }

    #[test]
    fn test_series_split_by_labels() {
        let histogram = LatencyHistogram::default();
        histogram.record("a", true, 10.0);
        histogram.record("a", false, 10.0);
        histogram.record("b", true, 10.0);

        let samples = histogram.snapshot();
        let labels: Vec<(String, String)> = samples
            .iter()
            .map(|s| (s.graph.clone(), s.result.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("a".to_string(), "error".to_string()),
                ("a".to_string(), "ok".to_string()),
                ("b".to_string(), "ok".to_string()),
            ]
        );
    }
}
