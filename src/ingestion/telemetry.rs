//! Ingestion telemetry recording helpers.

use metrics::{counter, histogram};

pub fn record_ingest(written: usize, success: bool, duration_seconds: f64) {
    let outcome = if success { "success" } else { "failure" };
    counter!("pulse_ingest_batches_total", "outcome" => outcome).increment(1);
    counter!("pulse_ingest_records_total").increment(written as u64);
    histogram!("pulse_ingest_duration_seconds", "outcome" => outcome).record(duration_seconds);
}

pub fn record_rule_added(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("pulse_validation_rules_added_total", "outcome" => outcome).increment(1);
}

pub fn record_validation(outcome: &'static str) {
    counter!("pulse_validation_requests_total", "outcome" => outcome).increment(1);
}
