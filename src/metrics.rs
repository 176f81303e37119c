//! Request statistics for the scoring worker.

use crate::types::{DataQuality, RiskAssessment, RiskBand};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and latency samples for scored requests
pub struct ScoringMetrics {
    pub requests_scored: AtomicU64,
    pub requests_failed: AtomicU64,
    by_band: RwLock<HashMap<RiskBand, u64>>,
    by_quality: RwLock<HashMap<&'static str, u64>>,
    /// How often each schema field had to be synthesized
    missing_fields: RwLock<HashMap<String, u64>>,
    /// Processing times in microseconds
    processing_times: RwLock<Vec<u64>>,
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            requests_scored: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            by_band: RwLock::new(HashMap::new()),
            by_quality: RwLock::new(HashMap::new()),
            missing_fields: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored request
    pub fn record_assessment(&self, assessment: &RiskAssessment, processing_time: Duration) {
        self.requests_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // keep the most recent samples only
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (assessment.default_probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_band) = self.by_band.write() {
            *by_band.entry(assessment.risk_band).or_insert(0) += 1;
        }

        let quality = match assessment.data_quality {
            DataQuality::High => "high",
            DataQuality::Medium => "medium",
            DataQuality::Low => "low",
        };
        if let Ok(mut by_quality) = self.by_quality.write() {
            *by_quality.entry(quality).or_insert(0) += 1;
        }

        if let Ok(mut missing) = self.missing_fields.write() {
            for field in &assessment.missing_features {
                *missing.entry(field.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    pub fn get_band_counts(&self) -> HashMap<RiskBand, u64> {
        self.by_band.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// Most frequently synthesized fields, descending
    pub fn top_missing_fields(&self, n: usize) -> Vec<(String, u64)> {
        let mut fields: Vec<(String, u64)> = self
            .missing_fields
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        fields.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        fields.truncate(n);
        fields
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let scored = self.requests_scored.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            scored,
            failed,
            throughput = %format!("{:.1} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Scoring summary"
        );

        let bands = self.get_band_counts();
        for band in [RiskBand::Low, RiskBand::Medium, RiskBand::High] {
            let count = bands.get(&band).copied().unwrap_or(0);
            let pct = if scored > 0 {
                count as f64 / scored as f64 * 100.0
            } else {
                0.0
            };
            info!(band = band.as_str(), count, pct = %format!("{:.1}%", pct), "Risk band");
        }

        if let Ok(quality) = self.by_quality.read() {
            info!(quality = %format!("{:?}", *quality), "Data quality");
        }

        for (field, count) in self.top_missing_fields(5) {
            info!(field = %field, count, "Frequently missing feature");
        }

        let dist = self.get_probability_distribution();
        info!(buckets = ?dist, "Probability distribution (deciles)");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
