use super::logger::Logger;
use super::pool::DbHandle;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{Any, Execute, Executor};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

/// Whether a statement may be served by a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// Classify a statement by its leading keyword.
///
/// Locking reads and data-modifying CTEs count as writes. Anything
/// unrecognised is a write so it lands on the primary.
pub fn classify(sql: &str) -> StatementKind {
    let tokens = keywords(sql);
    let Some(first) = tokens.first() else {
        return StatementKind::Write;
    };

    let has = |word: &str| tokens.iter().any(|t| t == word);
    let has_pair = |a: &str, b: &str| tokens.windows(2).any(|w| w[0] == a && w[1] == b);

    match first.as_str() {
        "SELECT" if has_pair("FOR", "UPDATE") || has_pair("FOR", "SHARE") || has_pair("SHARE", "MODE") => {
            StatementKind::Write
        }
        "SELECT" | "SHOW" | "EXPLAIN" | "DESCRIBE" | "DESC" | "VALUES" => StatementKind::Read,
        "WITH" if ["INSERT", "UPDATE", "DELETE", "MERGE"].iter().any(|w| has(w)) => StatementKind::Write,
        "WITH" if has_pair("FOR", "UPDATE") || has_pair("FOR", "SHARE") => StatementKind::Write,
        "WITH" => StatementKind::Read,
        _ => StatementKind::Write,
    }
}

/// Uppercased words of `sql` with comments removed.
fn keywords(sql: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(sql.len());
    let mut rest = sql;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            cleaned.push(' ');
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                cleaned.push(c);
            }
            rest = chars.as_str();
        }
    }

    cleaned
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Chooses the data source for each statement.
///
/// Writes always go to the primary. Reads pick a replica with probability
/// `weight / sum(weights)`; with no selectable replica they go to the primary.
#[derive(Debug)]
pub struct ConnectionRouter {
    primary: DbHandle,
    replicas: Vec<DbHandle>,
    selector: Option<WeightedIndex<u32>>,
}

impl ConnectionRouter {
    pub fn new(primary: DbHandle, replicas: Vec<(DbHandle, u32)>) -> Self {
        let selector = WeightedIndex::new(replicas.iter().map(|(_, weight)| *weight)).ok();
        let replicas = replicas.into_iter().map(|(handle, _)| handle).collect();

        Self {
            primary,
            replicas,
            selector,
        }
    }

    pub fn route_for_write(&self) -> &DbHandle {
        &self.primary
    }

    pub fn route_for_read(&self) -> &DbHandle {
        self.select_replica(&mut rand::thread_rng())
    }

    /// Weighted replica pick using the caller's random source.
    pub fn select_replica<R: Rng + ?Sized>(&self, rng: &mut R) -> &DbHandle {
        match &self.selector {
            Some(selector) => &self.replicas[selector.sample(rng)],
            None => &self.primary,
        }
    }

    pub fn route(&self, sql: &str) -> &DbHandle {
        match classify(sql) {
            StatementKind::Read => self.route_for_read(),
            StatementKind::Write => self.route_for_write(),
        }
    }

    pub fn replicas(&self) -> &[DbHandle] {
        &self.replicas
    }

    /// The primary followed by every replica, in configuration order.
    pub fn data_sources(&self) -> impl Iterator<Item = &DbHandle> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }
}

/// Query entry point that routes each statement by its kind.
#[derive(Clone)]
pub struct RoutedHandle {
    router: Arc<ConnectionRouter>,
    logger: Arc<dyn Logger>,
    slow_query_logger: Arc<dyn Logger>,
}

impl RoutedHandle {
    pub(crate) fn new(
        router: Arc<ConnectionRouter>,
        logger: Arc<dyn Logger>,
        slow_query_logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            router,
            logger,
            slow_query_logger,
        }
    }

    pub fn router(&self) -> &ConnectionRouter {
        &self.router
    }

    /// Data source `sql` would run on.
    pub fn target_for(&self, sql: &str) -> &DbHandle {
        self.router.route(sql)
    }

    pub async fn execute<'q, E>(&self, query: E) -> Result<AnyQueryResult, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = match self.target_for(sql).acquire().await {
            Ok(mut conn) => (&mut *conn).execute(query).await,
            Err(e) => Err(e),
        };
        let rows = result.as_ref().map_or(0, AnyQueryResult::rows_affected);
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_all<'q, E>(&self, query: E) -> Result<Vec<AnyRow>, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = match self.target_for(sql).acquire().await {
            Ok(mut conn) => (&mut *conn).fetch_all(query).await,
            Err(e) => Err(e),
        };
        let rows = result.as_ref().map_or(0, |rows| rows.len() as u64);
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_one<'q, E>(&self, query: E) -> Result<AnyRow, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = match self.target_for(sql).acquire().await {
            Ok(mut conn) => (&mut *conn).fetch_one(query).await,
            Err(e) => Err(e),
        };
        let rows = u64::from(result.is_ok());
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_optional<'q, E>(&self, query: E) -> Result<Option<AnyRow>, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = match self.target_for(sql).acquire().await {
            Ok(mut conn) => (&mut *conn).fetch_optional(query).await,
            Err(e) => Err(e),
        };
        let rows = result.as_ref().map_or(0, |row| u64::from(row.is_some()));
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    fn trace(&self, begin: Instant, sql: &str, rows: u64, err: Option<&sqlx::Error>) {
        trace_statement(
            [self.logger.as_ref(), self.slow_query_logger.as_ref()],
            begin,
            sql,
            rows,
            err,
        );
    }
}

/// Report one finished statement to each logger.
pub(crate) fn trace_statement(
    loggers: [&dyn Logger; 2],
    begin: Instant,
    sql: &str,
    rows: u64,
    err: Option<&sqlx::Error>,
) {
    let err = err.map(|e| e as &(dyn StdError + 'static));
    let result = || (sql.to_string(), rows);
    for logger in loggers {
        logger.trace(begin, &result, err);
    }
}
