//! Span helpers for database operations.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a span for an operation against one data source.
pub fn datasource_span(name: &str, operation: &str) -> Span {
    info_span!("datasource", name = %name, op = %operation, error = tracing::field::Empty)
}

/// Create a span for a transaction on the primary.
pub fn transaction_span() -> Span {
    info_span!("transaction", outcome = tracing::field::Empty)
}

/// Create a span for one pass of health checks.
pub fn health_check_span(sources: usize) -> Span {
    info_span!("health_check", sources = sources)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer, record duration and return it.
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
        duration
    }
}

/// Macro for timing a block of code.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}

/// Re-export of tracing::instrument for convenience.
pub use tracing::instrument;
