//! Query logging facade.
//!
//! Components log through the [`Logger`] trait and never see the sink.
//! [`DefaultLogger`] forwards to `tracing`; [`SlowQueryLogger`] wraps a base
//! logger and adds slow statement records.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strata_common_config::{LogOptions, SlowQueryOptions};

const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(200);

/// Severity gate. A logger at level `L` emits only messages at or below `L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Some(Self::Silent),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Level selected by options. Disabled logging is silent; unknown names mean `Info`.
    pub fn from_options(options: &LogOptions) -> Self {
        if !options.enabled {
            return Self::Silent;
        }
        Self::parse(&options.level).unwrap_or(Self::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured key/value pair attached to a log message.
pub type Field<'a> = (&'a str, &'a dyn fmt::Display);

/// Lazily produces the statement text and affected row count of a traced query.
pub type TraceResult<'a> = &'a dyn Fn() -> (String, u64);

pub trait Logger: Send + Sync {
    /// A logger identical to this one except for its level.
    fn with_level(&self, level: LogLevel) -> Arc<dyn Logger>;

    fn info(&self, message: &str, fields: &[Field<'_>]);

    fn warn(&self, message: &str, fields: &[Field<'_>]);

    fn error(&self, message: &str, fields: &[Field<'_>]);

    /// Record one executed statement. `begin` is when it started.
    fn trace(&self, begin: Instant, result: TraceResult<'_>, err: Option<&(dyn StdError + 'static)>);
}

fn render_fields(fields: &[Field<'_>]) -> String {
    let mut rendered = String::new();
    for (key, value) in fields {
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(key);
        rendered.push('=');
        rendered.push_str(&value.to_string());
    }
    rendered
}

fn is_row_not_found(err: &(dyn StdError + 'static)) -> bool {
    matches!(err.downcast_ref::<sqlx::Error>(), Some(sqlx::Error::RowNotFound))
}

/// Decides which level, if any, a traced statement is reported at.
#[derive(Debug, Clone, Copy)]
struct TracePolicy {
    level: LogLevel,
    slow_threshold: Duration,
    ignore_record_not_found: bool,
}

impl TracePolicy {
    fn new(log: &LogOptions, slow_query: &SlowQueryOptions) -> Self {
        let slow_threshold = if slow_query.enabled && !slow_query.threshold.is_zero() {
            slow_query.threshold
        } else {
            DEFAULT_SLOW_THRESHOLD
        };

        Self {
            level: LogLevel::from_options(log),
            slow_threshold,
            ignore_record_not_found: log.ignore_record_not_found_error,
        }
    }

    fn classify(&self, elapsed: Duration, err: Option<&(dyn StdError + 'static)>) -> Option<LogLevel> {
        if self.level == LogLevel::Silent {
            return None;
        }

        let reportable_error = err.filter(|e| !(self.ignore_record_not_found && is_row_not_found(*e)));

        if reportable_error.is_some() && self.level >= LogLevel::Error {
            Some(LogLevel::Error)
        } else if elapsed > self.slow_threshold && self.level >= LogLevel::Warn {
            Some(LogLevel::Warn)
        } else if self.level >= LogLevel::Info {
            Some(LogLevel::Info)
        } else {
            None
        }
    }
}

/// Logger backed by `tracing`, target `strata::database`.
#[derive(Debug, Clone)]
pub struct DefaultLogger {
    policy: TracePolicy,
}

impl DefaultLogger {
    pub fn new(log: &LogOptions, slow_query: &SlowQueryOptions) -> Self {
        Self {
            policy: TracePolicy::new(log, slow_query),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.policy.level
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new(&LogOptions::default(), &SlowQueryOptions::default())
    }
}

impl Logger for DefaultLogger {
    fn with_level(&self, level: LogLevel) -> Arc<dyn Logger> {
        let mut logger = self.clone();
        logger.policy.level = level;
        Arc::new(logger)
    }

    fn info(&self, message: &str, fields: &[Field<'_>]) {
        if self.policy.level >= LogLevel::Info {
            tracing::info!(target: "strata::database", fields = %render_fields(fields), "{message}");
        }
    }

    fn warn(&self, message: &str, fields: &[Field<'_>]) {
        if self.policy.level >= LogLevel::Warn {
            tracing::warn!(target: "strata::database", fields = %render_fields(fields), "{message}");
        }
    }

    fn error(&self, message: &str, fields: &[Field<'_>]) {
        if self.policy.level >= LogLevel::Error {
            tracing::error!(target: "strata::database", fields = %render_fields(fields), "{message}");
        }
    }

    fn trace(&self, begin: Instant, result: TraceResult<'_>, err: Option<&(dyn StdError + 'static)>) {
        let elapsed = begin.elapsed();
        let Some(level) = self.policy.classify(elapsed, err) else {
            return;
        };

        let (sql, rows) = result();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        match (level, err) {
            (LogLevel::Error, Some(e)) => {
                tracing::error!(target: "strata::database", elapsed_ms, rows, sql = %sql, error = %e, "query failed");
            }
            (LogLevel::Warn, _) => {
                tracing::warn!(
                    target: "strata::database",
                    elapsed_ms,
                    rows,
                    sql = %sql,
                    threshold_ms = self.policy.slow_threshold.as_millis() as u64,
                    "slow query"
                );
            }
            _ => {
                tracing::info!(target: "strata::database", elapsed_ms, rows, sql = %sql, "query executed");
            }
        }
    }
}

/// Logger that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardLogger;

impl Logger for DiscardLogger {
    fn with_level(&self, _level: LogLevel) -> Arc<dyn Logger> {
        Arc::new(DiscardLogger)
    }

    fn info(&self, _message: &str, _fields: &[Field<'_>]) {}

    fn warn(&self, _message: &str, _fields: &[Field<'_>]) {}

    fn error(&self, _message: &str, _fields: &[Field<'_>]) {}

    fn trace(&self, _begin: Instant, _result: TraceResult<'_>, _err: Option<&(dyn StdError + 'static)>) {}
}

/// Wraps a base logger and reports statements at or over the threshold.
///
/// Plain messages forward to the base unchanged.
#[derive(Clone)]
pub struct SlowQueryLogger {
    options: SlowQueryOptions,
    base: Option<Arc<dyn Logger>>,
}

impl SlowQueryLogger {
    pub fn new(options: SlowQueryOptions, base: Option<Arc<dyn Logger>>) -> Self {
        Self { options, base }
    }

    pub fn options(&self) -> &SlowQueryOptions {
        &self.options
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        self.options.enabled && elapsed >= self.options.threshold
    }
}

impl fmt::Debug for SlowQueryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlowQueryLogger")
            .field("options", &self.options)
            .field("has_base", &self.base.is_some())
            .finish()
    }
}

impl Logger for SlowQueryLogger {
    /// Returns this logger unchanged.
    fn with_level(&self, _level: LogLevel) -> Arc<dyn Logger> {
        Arc::new(self.clone())
    }

    fn info(&self, message: &str, fields: &[Field<'_>]) {
        if let Some(base) = &self.base {
            base.info(message, fields);
        }
    }

    fn warn(&self, message: &str, fields: &[Field<'_>]) {
        if let Some(base) = &self.base {
            base.warn(message, fields);
        }
    }

    fn error(&self, message: &str, fields: &[Field<'_>]) {
        if let Some(base) = &self.base {
            base.error(message, fields);
        }
    }

    fn trace(&self, begin: Instant, result: TraceResult<'_>, err: Option<&(dyn StdError + 'static)>) {
        let elapsed = begin.elapsed();
        if !self.is_slow(elapsed) {
            return;
        }

        let (sql, rows) = result();
        let sql = if self.options.log_params { sql } else { String::new() };
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let error = err.map(ToString::to_string).unwrap_or_default();

        tracing::warn!(
            target: "strata::slow_query",
            elapsed_ms,
            rows,
            sql = %sql,
            error = %error,
            "slow query detected"
        );

        if let Some(base) = &self.base {
            let duration = format!("{elapsed:?}");
            if self.options.log_params {
                base.warn(
                    "slow query detected",
                    &[("duration", &duration), ("rows", &rows), ("sql", &sql)],
                );
            } else {
                base.warn("slow query detected", &[("duration", &duration), ("rows", &rows)]);
            }
        }
    }
}

/// One message captured by a [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Logger that buffers records in memory, for embedding and inspection.
#[derive(Debug, Clone)]
pub struct MemoryLogger {
    policy: TracePolicy,
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogger {
    pub fn new(log: &LogOptions, slow_query: &SlowQueryOptions) -> Self {
        Self {
            policy: TracePolicy::new(log, slow_query),
            records: Arc::default(),
        }
    }

    /// Logger at `level` with default slow query options.
    pub fn with_threshold(level: LogLevel) -> Self {
        let mut logger = Self::new(&LogOptions::default(), &SlowQueryOptions::default());
        logger.policy.level = level;
        logger
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.level == level).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    fn push(&self, level: LogLevel, message: &str, fields: &[Field<'_>]) {
        if level > self.policy.level || level == LogLevel::Silent {
            return;
        }
        let record = LogRecord {
            level,
            message: message.to_string(),
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        };
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

impl Logger for MemoryLogger {
    /// Shares the record buffer with the original.
    fn with_level(&self, level: LogLevel) -> Arc<dyn Logger> {
        let mut logger = self.clone();
        logger.policy.level = level;
        Arc::new(logger)
    }

    fn info(&self, message: &str, fields: &[Field<'_>]) {
        self.push(LogLevel::Info, message, fields);
    }

    fn warn(&self, message: &str, fields: &[Field<'_>]) {
        self.push(LogLevel::Warn, message, fields);
    }

    fn error(&self, message: &str, fields: &[Field<'_>]) {
        self.push(LogLevel::Error, message, fields);
    }

    fn trace(&self, begin: Instant, result: TraceResult<'_>, err: Option<&(dyn StdError + 'static)>) {
        let elapsed = begin.elapsed();
        let Some(level) = self.policy.classify(elapsed, err) else {
            return;
        };

        let (sql, rows) = result();
        let message = match level {
            LogLevel::Error => "query failed",
            LogLevel::Warn => "slow query",
            _ => "query executed",
        };
        let elapsed = format!("{elapsed:?}");
        let error = err.map(ToString::to_string).unwrap_or_default();
        self.push(
            level,
            message,
            &[("sql", &sql), ("rows", &rows), ("elapsed", &elapsed), ("error", &error)],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture<F: FnOnce()>(f: F) -> String {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.contents()
    }

    fn options(level: &str) -> LogOptions {
        LogOptions {
            level: level.to_string(),
            ..Default::default()
        }
    }

    fn dyn_err(e: &sqlx::Error) -> Option<&(dyn StdError + 'static)> {
        Some(e)
    }

    fn stmt() -> (String, u64) {
        ("SELECT * FROM users".to_string(), 3)
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Silent < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
    }

    #[test]
    fn test_level_from_options() {
        assert_eq!(LogLevel::from_options(&options("error")), LogLevel::Error);
        assert_eq!(LogLevel::from_options(&options("WARN")), LogLevel::Warn);
        assert_eq!(LogLevel::from_options(&options("verbose")), LogLevel::Info);

        let disabled = LogOptions {
            enabled: false,
            ..options("info")
        };
        assert_eq!(LogLevel::from_options(&disabled), LogLevel::Silent);
    }

    #[test]
    fn test_error_level_suppresses_info() {
        let logger = MemoryLogger::with_threshold(LogLevel::Error);
        logger.info("pool opened", &[]);
        logger.warn("slow", &[]);
        logger.error("boom", &[("database", &"primary")]);

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "boom");
        assert_eq!(records[0].field("database"), Some("primary"));
    }

    #[test]
    fn test_with_level_leaves_original_unchanged() {
        let logger = MemoryLogger::with_threshold(LogLevel::Error);
        let verbose = logger.with_level(LogLevel::Info);

        verbose.info("from verbose", &[]);
        logger.info("from original", &[]);

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "from verbose");
    }

    #[test]
    fn test_trace_policy() {
        let policy = TracePolicy::new(&options("warn"), &SlowQueryOptions::default());
        let err = sqlx::Error::Protocol("bad".into());
        let not_found = sqlx::Error::RowNotFound;

        assert_eq!(policy.classify(Duration::from_millis(1), dyn_err(&err)), Some(LogLevel::Error));
        assert_eq!(policy.classify(Duration::from_millis(1), dyn_err(&not_found)), None);
        assert_eq!(policy.classify(Duration::from_millis(250), None), Some(LogLevel::Warn));
        assert_eq!(policy.classify(Duration::from_millis(1), None), None);

        let keep_not_found = LogOptions {
            ignore_record_not_found_error: false,
            ..options("warn")
        };
        let policy = TracePolicy::new(&keep_not_found, &SlowQueryOptions::default());
        assert_eq!(policy.classify(Duration::from_millis(1), dyn_err(&not_found)), Some(LogLevel::Error));
    }

    #[test]
    fn test_silent_policy_reports_nothing() {
        let policy = TracePolicy::new(&options("silent"), &SlowQueryOptions::default());
        let err = sqlx::Error::PoolClosed;
        assert_eq!(policy.classify(Duration::from_secs(5), dyn_err(&err)), None);
    }

    #[test]
    fn test_default_logger_emits_through_tracing() {
        let logger = DefaultLogger::new(&options("info"), &SlowQueryOptions::default());
        let output = capture(|| {
            logger.warn("database health check failed", &[("database", &"replica_0")]);
            logger.trace(Instant::now(), &stmt, None);
        });

        assert!(output.contains("WARN"));
        assert!(output.contains("database health check failed"));
        assert!(output.contains("database=replica_0"));
        assert!(output.contains("query executed"));
        assert!(output.contains("SELECT * FROM users"));
    }

    #[test]
    fn test_default_logger_respects_level() {
        let logger = DefaultLogger::new(&options("error"), &SlowQueryOptions::default());
        let output = capture(|| {
            logger.info("hidden", &[]);
            logger.warn("hidden too", &[]);
        });
        assert!(output.is_empty());
    }

    #[test]
    fn test_slow_query_logger_forwards_to_base() {
        let base = MemoryLogger::with_threshold(LogLevel::Info);
        let slow = SlowQueryLogger::new(
            SlowQueryOptions {
                enabled: true,
                threshold: Duration::from_millis(5),
                log_params: true,
            },
            Some(Arc::new(base.clone())),
        );

        let begin = Instant::now() - Duration::from_millis(20);
        let output = capture(|| slow.trace(begin, &stmt, None));
        assert!(output.contains("slow query detected"));
        assert!(output.contains("SELECT * FROM users"));

        let warnings = base.records_at(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field("sql"), Some("SELECT * FROM users"));
        assert_eq!(warnings[0].field("rows"), Some("3"));
    }

    #[test]
    fn test_slow_query_logger_ignores_fast_statements() {
        let base = MemoryLogger::with_threshold(LogLevel::Info);
        let slow = SlowQueryLogger::new(
            SlowQueryOptions {
                enabled: true,
                threshold: Duration::from_secs(10),
                log_params: false,
            },
            Some(Arc::new(base.clone())),
        );

        slow.trace(Instant::now(), &stmt, None);
        assert!(base.records().is_empty());
    }

    #[test]
    fn test_slow_query_logger_hides_sql_without_log_params() {
        let base = MemoryLogger::with_threshold(LogLevel::Info);
        let slow = SlowQueryLogger::new(
            SlowQueryOptions {
                enabled: true,
                threshold: Duration::ZERO,
                log_params: false,
            },
            Some(Arc::new(base.clone())),
        );

        let output = capture(|| slow.trace(Instant::now(), &stmt, None));
        assert!(!output.contains("SELECT * FROM users"));
        assert_eq!(base.records_at(LogLevel::Warn)[0].field("sql"), None);
    }

    #[test]
    fn test_disabled_slow_query_logger_is_inert() {
        let base = MemoryLogger::with_threshold(LogLevel::Info);
        let slow = SlowQueryLogger::new(SlowQueryOptions::default(), Some(Arc::new(base.clone())));

        slow.trace(Instant::now() - Duration::from_secs(1), &stmt, None);
        assert!(base.records().is_empty());

        slow.info("forwarded", &[]);
        assert_eq!(base.records().len(), 1);
    }

    #[test]
    fn test_slow_query_logger_without_base() {
        let slow = SlowQueryLogger::new(
            SlowQueryOptions {
                enabled: true,
                threshold: Duration::ZERO,
                log_params: true,
            },
            None,
        );
        slow.warn("nowhere", &[]);
        slow.with_level(LogLevel::Silent).trace(Instant::now(), &stmt, None);
    }
}
