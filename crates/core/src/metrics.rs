//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Processing runs (results, durations, failing stages)
//! - Capability probing (probe results, codec fallbacks)
//! - Background jobs

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Processing runs total by backend and result.
pub static PROCESSING_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidingest_processing_runs_total",
            "Total video processing runs",
        ),
        &["backend", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Processing duration in seconds.
pub static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidingest_processing_duration_seconds",
            "Duration of a full processing run",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["backend"],
    )
    .unwrap()
});

/// Failed runs by the stage that failed.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidingest_stage_failures_total",
            "Processing failures by pipeline stage",
        ),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Capability Metrics
// =============================================================================

/// Codec selections that fell through to the hard-coded last resort.
pub static CODEC_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidingest_codec_fallbacks_total",
            "Codec selections that used the last-resort default",
        ),
        &["kind"], // "video", "audio"
    )
    .unwrap()
});

/// Encoder list probes by result.
pub static CAPABILITY_PROBES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidingest_capability_probes_total",
            "Encoder capability probes",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs currently running.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("vidingest_jobs_running", "Number of jobs currently processing").unwrap()
});

/// Jobs finished by final status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidingest_jobs_finished_total", "Jobs finished by status"),
        &["status"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Returns all core metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(PROCESSING_RUNS.clone()),
        Box::new(PROCESSING_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        // Capabilities
        Box::new(CODEC_FALLBACKS.clone()),
        Box::new(CAPABILITY_PROBES.clone()),
        // Jobs
        Box::new(JOBS_RUNNING.clone()),
        Box::new(JOBS_FINISHED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        PROCESSING_RUNS
            .with_label_values(&["direct_process", "success"])
            .inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"vidingest_processing_runs_total".to_string()));
    }
}
