//! Statement metrics and tracing spans.
//!
//! With the `metrics` feature, [`METRICS`] records statement counts, errors,
//! durations and soft-deleted rows through the global OpenTelemetry meter.
//! With `tracing`, statements and cascades run inside spans from
//! [`tracing_helpers`]. Both are no-ops when their feature is off.

use std::time::Instant;

use crate::error::Result;

#[cfg(feature = "metrics")]
pub use otel::{FastgearMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
        KeyValue,
    };
    use std::time::Duration;

    pub static METRICS: Lazy<FastgearMetrics> = Lazy::new(FastgearMetrics::init);

    pub struct FastgearMetrics {
        pub statements_total: Counter<u64>,
        pub statement_errors_total: Counter<u64>,
        pub statement_duration: Histogram<f64>,
        pub soft_deleted_rows_total: Counter<u64>,
    }

    impl FastgearMetrics {
        pub fn init() -> Self {
            let meter = global::meter("fastgear");

            let statements_total = meter
                .u64_counter("fastgear_statements_total")
                .with_description("Total statements executed")
                .build();

            let statement_errors_total = meter
                .u64_counter("fastgear_statement_errors_total")
                .with_description("Statements that failed")
                .build();

            let statement_duration = meter
                .f64_histogram("fastgear_statement_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let soft_deleted_rows_total = meter
                .u64_counter("fastgear_soft_deleted_rows_total")
                .with_description("Rows marked deleted by cascades")
                .build();

            Self {
                statements_total,
                statement_errors_total,
                statement_duration,
                soft_deleted_rows_total,
            }
        }

        pub fn record_statement(&self, kind: &'static str, elapsed: Duration) {
            let attrs = [KeyValue::new("kind", kind)];
            self.statements_total.add(1, &attrs);
            self.statement_duration.record(elapsed.as_secs_f64(), &attrs);
        }

        pub fn record_statement_error(&self, kind: &'static str) {
            self.statement_errors_total
                .add(1, &[KeyValue::new("kind", kind)]);
        }

        pub fn record_soft_deleted(&self, table: &str, rows: u64) {
            self.soft_deleted_rows_total
                .add(rows, &[KeyValue::new("table", table.to_string())]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn statement_span(kind: &'static str, table: &str) -> Span {
        tracing::info_span!("fastgear.statement", kind, table)
    }

    pub fn cascade_span(root: &str, marker: &str) -> Span {
        tracing::info_span!("fastgear.soft_delete_cascade", root, marker)
    }
}

/// Runs one statement with its span, duration and error accounting.
pub(crate) fn instrument<T>(
    kind: &'static str,
    table: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::statement_span(kind, table).entered();

    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    {
        if result.is_err() {
            METRICS.record_statement_error(kind);
        }
        METRICS.record_statement(kind, elapsed);
    }

    match &result {
        Ok(_) => log::trace!("{kind} on {table} took {elapsed:?}"),
        Err(e) => log::debug!("{kind} on {table} failed after {elapsed:?}: {e}"),
    }
    result
}

/// Counts rows a cascade marked deleted.
pub(crate) fn record_soft_deleted(table: &str, rows: u64) {
    #[cfg(feature = "metrics")]
    METRICS.record_soft_deleted(table, rows);
    log::debug!("soft-deleted {rows} row(s) in {table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FastgearError;

    #[test]
    fn instrument_passes_results_through() {
        assert_eq!(instrument("select", "parent", || Ok(3)).unwrap(), 3);
        let err = instrument::<()>("update", "parent", || {
            Err(FastgearError::Database("boom".into()))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Database error: boom");
    }
}
