use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{global, KeyValue};
use std::sync::OnceLock;
use std::time::Instant;

/// OpenTelemetry metrics for inspector observability.
///
/// Tracks top-level operations, individual store commands, scanned keys and
/// errors. Singleton instance accessed via `Metrics::get()`.
pub struct Metrics {
    // Operation-level metrics
    pub operations_total: Counter<u64>,
    pub operation_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,

    // Store driver metrics
    pub store_commands_total: Counter<u64>,
    pub store_command_duration: Histogram<f64>,
    pub store_errors_total: Counter<u64>,

    pub keys_scanned_total: Counter<u64>,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| {
            let meter = global::meter("coral-inspect");

            Metrics {
                operations_total: meter
                    .u64_counter("coral_inspect_operations_total")
                    .with_description("Total number of inspector operations")
                    .init(),

                operation_duration: meter
                    .f64_histogram("coral_inspect_operation_duration_seconds")
                    .with_description("Operation duration in seconds")
                    .init(),

                errors_total: meter
                    .u64_counter("coral_inspect_errors_total")
                    .with_description("Total number of failed operations")
                    .init(),

                store_commands_total: meter
                    .u64_counter("coral_inspect_store_commands_total")
                    .with_description("Total number of commands sent to the store")
                    .init(),

                store_command_duration: meter
                    .f64_histogram("coral_inspect_store_command_duration_seconds")
                    .with_description("Store command round-trip duration in seconds")
                    .init(),

                store_errors_total: meter
                    .u64_counter("coral_inspect_store_errors_total")
                    .with_description("Total number of store command failures")
                    .init(),

                keys_scanned_total: meter
                    .u64_counter("coral_inspect_keys_scanned_total")
                    .with_description("Total number of keys returned by scans")
                    .init(),
            }
        })
    }

    pub fn get() -> &'static Self {
        METRICS.get().unwrap_or_else(|| Self::init())
    }

    pub fn record_operation(&self, operation: &'static str, duration: f64) {
        let labels = &[KeyValue::new("operation", operation)];
        self.operations_total.add(1, labels);
        self.operation_duration.record(duration, labels);
    }

    pub fn record_error(&self, error_kind: &'static str, operation: &'static str) {
        let labels = &[
            KeyValue::new("error_kind", error_kind),
            KeyValue::new("operation", operation),
        ];
        self.errors_total.add(1, labels);
    }

    pub fn record_store_command(&self, command: &str, duration: f64) {
        let labels = &[KeyValue::new("command", command.to_string())];
        self.store_commands_total.add(1, labels);
        self.store_command_duration.record(duration, labels);
    }

    pub fn record_store_error(&self, command: &str, error_kind: &'static str) {
        let labels = &[
            KeyValue::new("command", command.to_string()),
            KeyValue::new("error_kind", error_kind),
        ];
        self.store_errors_total.add(1, labels);
    }

    pub fn record_keys_scanned(&self, count: u64) {
        self.keys_scanned_total.add(count, &[]);
    }
}

// Timer utility for measuring durations
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_singleton() {
        let first = Metrics::get() as *const Metrics;
        let second = Metrics::init() as *const Metrics;
        assert_eq!(first, second);
    }

    #[test]
    fn test_recording_without_provider_is_noop() {
        let metrics = Metrics::get();
        metrics.record_operation("inspect", 0.01);
        metrics.record_store_command("get", 0.001);
        metrics.record_store_error("get", "connection");
        metrics.record_error("store", "import");
        metrics.record_keys_scanned(3);
    }

    #[test]
    fn test_timer_elapsed() {
        let timer = Timer::new();
        assert!(timer.elapsed_seconds() >= 0.0);
    }
}
